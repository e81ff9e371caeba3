// Stepper - Pipeline Stepping Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Execution of a single step request.
//!
//! The handler resolves the candidate streams, seeds the current location
//! from the step type, and walks streams and parts in the step's direction.
//! Each part is fed through the pipeline with a [`SteppingController`] as the
//! record callback until the controller accepts a record, the candidates run
//! out, or the task is terminated.
//!
//! One pipeline instance is reused across consecutive streams of the same
//! feed and rebuilt when the feed changes.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use stepper_common::{ContainerId, Indicators, StepLocation, StepRequest, StepResult, StepType};
use tracing::{debug, info, trace, warn};

use super::{cache::SteppingResponseCache, controller::SteppingController};
use crate::{
    diagnostics::{ErrorReceiver, LoggingErrorReceiver},
    error::{ProcessingError, SteppingError},
    pipeline::{Pipeline, PipelineFactory, PipelineStore},
    store::{FeedProperties, Source, StreamStore},
    task::TaskContext,
};

/// Message reported when a step is cancelled before it completes.
pub const TERMINATED_MESSAGE: &str = "Stepping was terminated";

/// Runs step requests against a stream store.
///
/// The handler itself is stateless; everything that survives between the
/// steps of a session lives in the session's [`SteppingResponseCache`] and in
/// the filter settings handed back with each result.
#[derive(Clone)]
pub struct SteppingRequestHandler {
    store: Arc<dyn StreamStore>,
    pipelines: Arc<dyn PipelineStore>,
    factory: Arc<dyn PipelineFactory>,
    feed_properties: FeedProperties,
}

impl std::fmt::Debug for SteppingRequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteppingRequestHandler")
            .field("feed_properties", &self.feed_properties)
            .finish_non_exhaustive()
    }
}

/// Mutable state of one request.
struct RequestState {
    candidates: Option<Vec<ContainerId>>,
    current_index: isize,
    current_location: Option<StepLocation>,
    last_container_id: Option<ContainerId>,
    last_feed_name: Option<String>,
    pipeline: Option<Box<dyn Pipeline>>,
    pipeline_ok: bool,
    start_indicators: BTreeMap<String, Indicators>,
    general_errors: BTreeSet<String>,
    stream_offset: usize,
    segmented: bool,
}

impl RequestState {
    fn new(location: Option<StepLocation>) -> Self {
        Self {
            candidates: None,
            current_index: -1,
            current_location: location,
            last_container_id: None,
            last_feed_name: None,
            pipeline: None,
            pipeline_ok: false,
            start_indicators: BTreeMap::new(),
            general_errors: BTreeSet::new(),
            stream_offset: 0,
            segmented: false,
        }
    }

    fn error(&mut self, error: impl Display) {
        let message = error.to_string();
        warn!("stepping error: {message}");
        self.general_errors.insert(message);
    }

    fn candidate(&self, index: isize) -> Option<ContainerId> {
        let index = usize::try_from(index).ok()?;
        self.candidates.as_ref()?.get(index).copied()
    }

    fn end_pipeline(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.end_processing() {
                if !e.is_logged() {
                    self.error(e);
                }
            }
        }
        self.pipeline_ok = false;
    }
}

impl SteppingRequestHandler {
    /// A handler reading streams from `store` and building pipelines with `factory`.
    pub fn new(
        store: Arc<dyn StreamStore>,
        pipelines: Arc<dyn PipelineStore>,
        factory: Arc<dyn PipelineFactory>,
        feed_properties: FeedProperties,
    ) -> Self {
        Self { store, pipelines, factory, feed_properties }
    }

    /// Execute `request`, caching accepted records in `cache`.
    ///
    /// Per-stream failures end up in the result's general errors; only a
    /// failure to find the candidate streams or to build a steppable pipeline
    /// aborts the request.
    pub fn handle(
        &self,
        request: &StepRequest,
        cache: &mut SteppingResponseCache,
        task: &TaskContext,
    ) -> Result<StepResult, SteppingError> {
        info!(
            session = %request.session_id,
            step_type = %request.step_type,
            location = ?request.step_location,
            "handling step request"
        );
        task.info("Started stepping");

        let errors: Arc<dyn ErrorReceiver> = Arc::new(LoggingErrorReceiver::new());
        let mut controller = SteppingController::new(request, cache, task.clone(), errors.clone());
        let mut state = RequestState::new(request.step_location);

        if request.step_type != StepType::Refresh {
            self.initialise(request, &mut state)?;
        }

        if let Err(e) = self.walk(request, &mut state, &mut controller, &errors, task) {
            state.end_pipeline();
            return Err(e);
        }
        state.end_pipeline();

        let mut step_data = match controller.found_location() {
            Some(found) => {
                state.current_location = Some(found);
                state.stream_offset = self.offset_of(request, &mut state, found.container_id);
                controller.found_step_data().unwrap_or_else(|| controller.create_step_data(None))
            }
            None => {
                controller.mark_exhausted();
                controller.create_step_data(None)
            }
        };
        step_data.merge_indicators(&state.start_indicators);

        task.info("Finished stepping");
        if task.is_terminated() {
            state.general_errors.insert(TERMINATED_MESSAGE.to_string());
        }

        debug!(
            found = ?controller.found_location(),
            state = ?controller.state(),
            errors = state.general_errors.len(),
            "step finished"
        );

        Ok(StepResult {
            session_id: request.session_id.clone(),
            step_filter_map: controller.filter_settings(),
            progress_location: controller.progress_location(),
            step_location: state.current_location,
            step_data: Some(step_data.convert_to_shared()),
            current_stream_offset: state.stream_offset,
            found_record: controller.is_found(),
            general_errors: state.general_errors,
            segmented_data: state.segmented,
            complete: true,
        })
    }

    fn candidates<'s>(
        &self,
        request: &StepRequest,
        state: &'s mut RequestState,
    ) -> Result<&'s [ContainerId], SteppingError> {
        if state.candidates.is_none() {
            let ids = self.store.find(&request.criteria)?.into_iter().map(|meta| meta.id).collect();
            state.candidates = Some(ids);
        }
        Ok(state.candidates.as_deref().unwrap_or_default())
    }

    /// Pick the first stream to look at and where to start within it.
    fn initialise(
        &self,
        request: &StepRequest,
        state: &mut RequestState,
    ) -> Result<(), SteppingError> {
        let candidates = self.candidates(request, state)?.to_vec();
        trace!(count = candidates.len(), "resolved candidate streams");
        let (Some(&first), Some(&last)) = (candidates.first(), candidates.last()) else {
            return Ok(());
        };

        match request.step_type {
            StepType::First => {
                state.current_index = 0;
                state.current_location = Some(StepLocation::first(first));
            }
            StepType::Last => {
                state.current_index = candidates.len() as isize - 1;
                state.current_location = Some(StepLocation::last(last));
            }
            StepType::Forward | StepType::Backward => {
                if let Some(location) = state.current_location {
                    state.current_index = candidates
                        .iter()
                        .position(|id| *id == location.container_id)
                        .map_or(-1, |index| index as isize);

                    // Nothing precedes the start of a stream within it.
                    if request.step_type == StepType::Backward
                        && state.current_index != -1
                        && location.is_at_stream_start()
                    {
                        state.current_index -= 1;
                        if let Some(previous) = state.candidate(state.current_index) {
                            state.current_location = Some(StepLocation::last(previous));
                        }
                    }
                }

                if request.step_type == StepType::Forward && state.current_index == -1 {
                    state.current_index = 0;
                    state.current_location = Some(StepLocation::first(first));
                }
            }
            StepType::Refresh => {}
        }
        Ok(())
    }

    fn container_id(
        &self,
        request: &StepRequest,
        state: &RequestState,
        task: &TaskContext,
    ) -> Option<ContainerId> {
        if task.is_terminated() {
            return None;
        }
        match request.step_type {
            StepType::Refresh => state.current_location.map(|location| location.container_id),
            _ => state.candidate(state.current_index),
        }
    }

    /// Visit streams in the step's direction until a record is found.
    fn walk(
        &self,
        request: &StepRequest,
        state: &mut RequestState,
        controller: &mut SteppingController<'_>,
        errors: &Arc<dyn ErrorReceiver>,
        task: &TaskContext,
    ) -> Result<(), SteppingError> {
        loop {
            let container_id = self
                .container_id(request, state, task)
                .filter(|id| state.last_container_id != Some(*id));
            let Some(container_id) = container_id else {
                state.current_location = request.step_location;
                return Ok(());
            };
            state.last_container_id = Some(container_id);

            if let Some(location) = state.current_location {
                if location.container_id != container_id {
                    state.current_location = Some(if request.step_type.is_backwards() {
                        StepLocation::last(container_id)
                    } else {
                        StepLocation::first(container_id)
                    });
                }
            }

            self.process_container(container_id, request, state, controller, errors, task)?;

            if controller.is_found() {
                return Ok(());
            }
            if task.is_terminated() {
                // A cancelled step found nothing.
                state.current_location = request.step_location;
                return Ok(());
            }

            state.current_index += match request.step_type {
                StepType::First | StepType::Forward => 1,
                StepType::Last | StepType::Backward => -1,
                StepType::Refresh => 0,
            };
        }
    }

    fn process_container(
        &self,
        container_id: ContainerId,
        request: &StepRequest,
        state: &mut RequestState,
        controller: &mut SteppingController<'_>,
        errors: &Arc<dyn ErrorReceiver>,
        task: &TaskContext,
    ) -> Result<(), SteppingError> {
        task.info(format!("Opening source. stream_id={container_id}"));
        let source = match self.store.open_source(container_id) {
            Ok(source) => source,
            Err(e) => {
                state.error(e);
                return Ok(());
            }
        };
        let feed_name = source.meta().feed_name.clone();

        if state.last_feed_name.as_ref().is_some_and(|last| *last != feed_name) {
            debug!(from = ?state.last_feed_name, to = %feed_name, "feed changed, rebuilding pipeline");
            state.end_pipeline();
            state.last_feed_name = None;
        }

        if task.is_terminated() {
            return Ok(());
        }

        if state.last_feed_name.is_none() {
            state.last_feed_name = Some(feed_name.clone());
            self.build_pipeline(request, state, controller, errors)?;
        }

        if !state.pipeline_ok {
            debug!(container_id, "pipeline reported errors on start, skipping stream");
            return Ok(());
        }

        let Some(mut pipeline) = state.pipeline.take() else {
            return Ok(());
        };
        self.process_parts(&source, &feed_name, pipeline.as_mut(), request, state, controller, task);
        state.pipeline = Some(pipeline);
        Ok(())
    }

    fn build_pipeline(
        &self,
        request: &StepRequest,
        state: &mut RequestState,
        controller: &mut SteppingController<'_>,
        errors: &Arc<dyn ErrorReceiver>,
    ) -> Result<(), SteppingError> {
        let definition = self.pipelines.read(&request.pipeline)?;
        let instance = self.factory.create(&definition, errors.clone())?;
        if !instance.is_steppable() {
            return Err(SteppingError::NotSteppable);
        }
        debug!(pipeline = %definition.name, elements = instance.monitors.len(), "built pipeline");
        controller.install_monitors(instance.monitors);

        let mut pipeline = instance.pipeline;
        if let Err(e) = pipeline.start_processing() {
            if !e.is_logged() {
                state.error(e);
            }
        }

        // Diagnostics raised while starting are merged into every result.
        state.start_indicators = errors.indicators_map();
        state.pipeline_ok = errors.is_all_ok();
        errors.clear();
        state.pipeline = Some(pipeline);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_parts(
        &self,
        source: &Source,
        feed_name: &str,
        pipeline: &mut dyn Pipeline,
        request: &StepRequest,
        state: &mut RequestState,
        controller: &mut SteppingController<'_>,
        task: &TaskContext,
    ) {
        let meta = source.meta();
        let received = DateTime::<Utc>::from_timestamp_millis(meta.create_ms)
            .map(|time| time.to_rfc3339())
            .unwrap_or_default();
        controller.set_stream_info(format!("id={}, feed={}, received={received}", meta.id, meta.feed_name));

        let count = source.count();
        let mut part_index = 1;
        if let Some(location) = state.current_location {
            part_index = location.part_index.clamp(1, count.max(1));
            state.current_location = Some(StepLocation::new(meta.id, part_index, location.record_index));
        }

        let child_type = request.child_stream_type.as_deref();
        let encoding = self.feed_properties.encoding(feed_name, child_type);

        let mut done = controller.is_found();
        while !done && part_index >= 1 && part_index <= count && !task.is_terminated() {
            controller.clear_all_filters();

            let input = match source.get(part_index).and_then(|provider| provider.get(child_type)) {
                Ok(input) => input,
                Err(e) => {
                    state.error(e);
                    break;
                }
            };
            state.segmented = input.count() > 1;

            if input.size() > 0 {
                controller.set_step_location(state.current_location);
                trace!(container_id = meta.id, part_index, "processing part");

                match pipeline.process(&input, &encoding, controller) {
                    Ok(()) => {}
                    Err(ProcessingError::Logged(message)) => {
                        debug!("processing stopped: {message}");
                        done = true;
                    }
                    Err(e) => {
                        state.error(e);
                        done = true;
                    }
                }
            }

            done |= request.step_type == StepType::Refresh || controller.is_found();
            if !done {
                if request.step_type.is_backwards() {
                    part_index -= 1;
                    state.current_location = Some(StepLocation::last_in_part(meta.id, part_index));
                } else {
                    part_index += 1;
                    state.current_location = Some(StepLocation::first_in_part(meta.id, part_index));
                }
            }
        }
    }

    fn offset_of(
        &self,
        request: &StepRequest,
        state: &mut RequestState,
        container_id: ContainerId,
    ) -> usize {
        match self.candidates(request, state) {
            Ok(candidates) => candidates.iter().position(|id| *id == container_id).unwrap_or(0),
            Err(e) => {
                warn!("unable to resolve stream offset: {e}");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use stepper_common::{FindMetaCriteria, PipelineRef};
    use tracing::info;

    use super::*;
    use crate::{
        pipeline::{ElementDefinition, MemoryPipelineStore, PipelineDefinition, TextPipelineFactory},
        store::{MemoryStore, StoredStream},
    };

    fn handler() -> (SteppingRequestHandler, PipelineRef) {
        let store = MemoryStore::with_streams([
            StoredStream::new(10, "FEED", "Raw Events").with_text("a\nb"),
            StoredStream::new(20, "FEED", "Raw Events").with_text("c\nd"),
            StoredStream::new(30, "FEED", "Raw Events").with_text("e\nf"),
        ]);
        let pipelines = MemoryPipelineStore::new();
        let pipeline = pipelines.add(
            PipelineDefinition::new("echo")
                .with_element(ElementDefinition::new("split", "splitter"))
                .with_element(ElementDefinition::new("out", "writer")),
        );
        let handler = SteppingRequestHandler::new(
            Arc::new(store),
            Arc::new(pipelines),
            Arc::new(TextPipelineFactory),
            FeedProperties::default(),
        );
        (handler, pipeline)
    }

    fn seeded(request: &StepRequest) -> (isize, Option<StepLocation>) {
        let (handler, _) = handler();
        let mut state = RequestState::new(request.step_location);
        handler.initialise(request, &mut state).unwrap();
        (state.current_index, state.current_location)
    }

    #[test]
    fn test_seeding_by_step_type() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing initial location seeding");

        let (_, pipeline) = handler();
        let request = StepRequest::new("s", StepType::First, pipeline.clone());
        assert_eq!(seeded(&request), (0, Some(StepLocation::first(10))));

        let request = StepRequest::new("s", StepType::Last, pipeline.clone());
        assert_eq!(seeded(&request), (2, Some(StepLocation::last(30))));

        // Unknown reference stream: forward starts over, backward has nowhere to go.
        let request = StepRequest::new("s", StepType::Forward, pipeline.clone())
            .at(StepLocation::new(99, 1, 1));
        assert_eq!(seeded(&request), (0, Some(StepLocation::first(10))));
        let request = StepRequest::new("s", StepType::Backward, pipeline.clone())
            .at(StepLocation::new(99, 1, 1));
        assert_eq!(seeded(&request).0, -1);

        let request = StepRequest::new("s", StepType::Forward, pipeline)
            .at(StepLocation::new(20, 1, 1));
        assert_eq!(seeded(&request), (1, Some(StepLocation::new(20, 1, 1))));
    }

    #[test]
    fn test_backward_from_stream_start_seeds_previous_stream() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing backward seeding at a stream boundary");

        let (_, pipeline) = handler();
        let request = StepRequest::new("s", StepType::Backward, pipeline.clone())
            .at(StepLocation::new(20, 1, 0));
        assert_eq!(seeded(&request), (0, Some(StepLocation::last(10))));

        let request = StepRequest::new("s", StepType::Backward, pipeline.clone())
            .at(StepLocation::new(20, 1, 1));
        assert_eq!(seeded(&request), (0, Some(StepLocation::last(10))));

        // Mid-stream locations stay put.
        let request = StepRequest::new("s", StepType::Backward, pipeline.clone())
            .at(StepLocation::new(20, 1, 2));
        assert_eq!(seeded(&request), (1, Some(StepLocation::new(20, 1, 2))));

        // Nothing precedes the first stream.
        let request = StepRequest::new("s", StepType::Backward, pipeline)
            .at(StepLocation::new(10, 1, 1));
        assert_eq!(seeded(&request), (-1, Some(StepLocation::new(10, 1, 1))));
    }

    #[test]
    fn test_no_candidates() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing a step over no streams");

        let (handler, pipeline) = handler();
        let request = StepRequest::new("s", StepType::First, pipeline)
            .with_criteria(FindMetaCriteria::for_feed("NOTHING"));
        let mut cache = SteppingResponseCache::default();
        let result = handler.handle(&request, &mut cache, &TaskContext::new()).unwrap();

        assert!(!result.found_record);
        assert!(result.complete);
        assert_eq!(result.step_location, None);
        assert!(result.general_errors.is_empty());
        assert!(result.step_data.unwrap().element_map.is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_walks_across_streams() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing forward stepping across stream boundaries");

        let (handler, pipeline) = handler();
        let mut cache = SteppingResponseCache::default();
        let task = TaskContext::new();

        let mut request = StepRequest::new("s", StepType::First, pipeline);
        let mut outputs = Vec::new();
        loop {
            let result = handler.handle(&request, &mut cache, &task).unwrap();
            if !result.found_record {
                // Stepping past the end keeps the caller where they were.
                assert_eq!(result.step_location, request.step_location);
                break;
            }
            let data = result.step_data.unwrap();
            outputs.push((result.current_stream_offset, data.element("out").unwrap().output.clone()));
            request = request.next(StepType::Forward, result.step_location);
        }

        let expected: Vec<_> = [(0, "a"), (0, "b"), (1, "c"), (1, "d"), (2, "e"), (2, "f")]
            .into_iter()
            .map(|(offset, text)| (offset, Some(text.to_string())))
            .collect();
        assert_eq!(outputs, expected);
        assert_eq!(cache.len(), 6);
    }
}
