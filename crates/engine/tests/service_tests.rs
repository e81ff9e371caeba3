use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use stepper_common::{
    PipelineRef, StepLocation, StepRequest, StepType, SteppingFilterSettings, TextRange,
};
use stepper_engine::{
    ElementDefinition, ErrorReceiver, MemoryPipelineStore, MemoryStore, Pipeline,
    PipelineDefinition, PipelineFactory, PipelineInstance, ProcessingError,
    RecordBoundaryCallback, SegmentInputStream, StepperConfig, SteppingError, SteppingService,
    StoredStream, TextPipelineFactory,
};
use tracing::info;

/// Text pipeline that takes a while over every record.
struct SlowFactory {
    delay: Duration,
}

struct SlowPipeline {
    inner: Box<dyn Pipeline>,
    delay: Duration,
}

struct SlowCallback<'a> {
    inner: &'a mut dyn RecordBoundaryCallback,
    delay: Duration,
}

impl RecordBoundaryCallback for SlowCallback<'_> {
    fn end_record(&mut self, record_index: i64, highlight: Option<TextRange>) -> bool {
        thread::sleep(self.delay);
        self.inner.end_record(record_index, highlight)
    }
}

impl Pipeline for SlowPipeline {
    fn start_processing(&mut self) -> Result<(), ProcessingError> {
        self.inner.start_processing()
    }

    fn process(
        &mut self,
        input: &SegmentInputStream,
        encoding: &str,
        callback: &mut dyn RecordBoundaryCallback,
    ) -> Result<(), ProcessingError> {
        let mut slow = SlowCallback { inner: callback, delay: self.delay };
        self.inner.process(input, encoding, &mut slow)
    }

    fn end_processing(&mut self) -> Result<(), ProcessingError> {
        self.inner.end_processing()
    }
}

impl PipelineFactory for SlowFactory {
    fn create(
        &self,
        definition: &PipelineDefinition,
        errors: Arc<dyn ErrorReceiver>,
    ) -> Result<PipelineInstance, SteppingError> {
        let instance = TextPipelineFactory.create(definition, errors)?;
        Ok(PipelineInstance {
            pipeline: Box::new(SlowPipeline { inner: instance.pipeline, delay: self.delay }),
            ..instance
        })
    }
}

fn service(factory: Arc<dyn PipelineFactory>, config: &StepperConfig) -> (SteppingService, PipelineRef) {
    let records: Vec<String> = (1..=200).map(|n| format!("record {n}")).collect();
    let store = MemoryStore::with_streams([
        StoredStream::new(1, "FEED", "Raw Events").with_text(records.join("\n")),
        StoredStream::new(2, "FEED", "Raw Events").with_text("last"),
    ]);
    let pipelines = MemoryPipelineStore::new();
    let pipeline = pipelines.add(
        PipelineDefinition::new("echo")
            .with_element(ElementDefinition::new("split", "splitter"))
            .with_element(ElementDefinition::new("out", "writer")),
    );
    let service = SteppingService::new(Arc::new(store), Arc::new(pipelines), factory, config);
    (service, pipeline)
}

#[tokio::test]
async fn test_sessions_keep_their_cache() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (service, pipeline) = service(Arc::new(TextPipelineFactory), &StepperConfig::default());

    let first = service.step(StepRequest::new("a", StepType::First, pipeline.clone())).await.unwrap();
    assert!(first.found_record);
    let next = StepRequest::new("a", StepType::Forward, pipeline.clone()).at(first.step_location.unwrap());
    let second = service.step(next).await.unwrap();
    assert_eq!(second.step_location, Some(StepLocation::new(1, 1, 2)));

    service.step(StepRequest::new("b", StepType::Last, pipeline)).await.unwrap();

    assert_eq!(service.session_count(), 2);
    assert_eq!(service.cached_steps("a"), Some(2));
    assert_eq!(service.cached_steps("b"), Some(1));
    assert_eq!(service.cached_steps("c"), None);

    assert!(service.remove("a"));
    assert!(!service.remove("a"));
    assert_eq!(service.session_count(), 1);
}

#[tokio::test]
async fn test_cache_size_comes_from_config() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = StepperConfig::default().with_cache_entries(2);
    let (service, pipeline) = service(Arc::new(TextPipelineFactory), &config);

    let mut request = StepRequest::new("s", StepType::First, pipeline);
    for _ in 0..5 {
        let result = service.step(request.clone()).await.unwrap();
        request = request.next(StepType::Forward, result.step_location);
    }
    assert_eq!(service.cached_steps("s"), Some(2));
}

#[tokio::test]
async fn test_timeout_returns_incomplete_result() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let factory = Arc::new(SlowFactory { delay: Duration::from_millis(20) });
    let (service, pipeline) = service(factory, &StepperConfig::default());

    // Only the last stream matches, so the whole of stream 1 has to be scanned.
    let request = StepRequest::new("s", StepType::First, pipeline.clone())
        .with_filter(
            "out",
            SteppingFilterSettings::default().with_filter(
                stepper_common::OutputFilter::new(stepper_common::MatchType::Equals).with_value("last"),
            ),
        )
        .with_timeout_ms(200);
    let result = service.step(request.clone()).await.unwrap();

    assert!(!result.complete);
    assert!(!result.found_record);
    assert_eq!(result.step_location, None);
    let progress = result.progress_location.unwrap();
    assert_eq!(progress.container_id, 1);
    assert!(progress.record_index < 200);

    // The abandoned step is terminated, so the session is usable again.
    let refresh = StepRequest::new("s", StepType::Refresh, pipeline).at(StepLocation::new(2, 1, 1));
    let result = service.step(refresh).await.unwrap();
    assert!(result.complete);
    assert!(result.found_record);
}

#[tokio::test]
async fn test_terminate_without_running_step() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (service, pipeline) = service(Arc::new(TextPipelineFactory), &StepperConfig::default());

    assert!(!service.terminate("nobody"));
    service.step(StepRequest::new("s", StepType::First, pipeline)).await.unwrap();
    assert!(!service.terminate("s"));
}

#[tokio::test]
async fn test_idle_sessions_are_evicted() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = StepperConfig::default();
    let (service, pipeline) = service(Arc::new(TextPipelineFactory), &config);

    service.step(StepRequest::new("s", StepType::First, pipeline)).await.unwrap();
    assert_eq!(service.evict_idle(Instant::now()), 0);
    assert_eq!(service.session_count(), 1);

    let later = Instant::now() + config.session.idle_timeout() + Duration::from_secs(1);
    assert_eq!(service.evict_idle(later), 1);
    assert_eq!(service.session_count(), 0);
}

#[tokio::test]
async fn test_step_errors_reach_the_caller() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (service, _) = service(Arc::new(TextPipelineFactory), &StepperConfig::default());

    let request = StepRequest::new("s", StepType::First, PipelineRef::new("missing"));
    let error = service.step(request).await.unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SteppingError>(),
        Some(SteppingError::PipelineConstruction { .. })
    ));
}
