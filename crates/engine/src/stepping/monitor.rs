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

//! Per-element monitors.

use std::sync::Arc;

use stepper_common::{Severity, StepLocation, SteppingFilterSettings, TextRange};
use tracing::debug;

use super::{data::ElementData, filter::SteppingFilter, recorder::Recorder};
use crate::diagnostics::ErrorReceiver;

/// Watches one pipeline element: what it read, what it wrote, and whether the
/// current record passes the element's filter.
#[derive(Debug)]
pub struct ElementMonitor {
    element_id: String,
    element_type: String,
    input: Option<Arc<dyn Recorder>>,
    output: Option<Arc<dyn Recorder>>,
    filter: Option<Box<dyn SteppingFilter>>,
    format_input: bool,
    format_output: bool,
}

impl ElementMonitor {
    /// A monitor with no recorders or filter.
    pub fn new(element_id: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            element_type: element_type.into(),
            input: None,
            output: None,
            filter: None,
            format_input: false,
            format_output: false,
        }
    }

    /// Ask the client to pretty-print input and/or output.
    pub fn with_formatting(mut self, format_input: bool, format_output: bool) -> Self {
        self.format_input = format_input;
        self.format_output = format_output;
        self
    }

    /// Id of the monitored element.
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    /// Type of the monitored element.
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    /// Capture what the element reads.
    pub fn register_input_recorder(&mut self, recorder: Arc<dyn Recorder>) {
        self.input = Some(recorder);
    }

    /// Capture what the element writes.
    pub fn register_output_recorder(&mut self, recorder: Arc<dyn Recorder>) {
        self.output = Some(recorder);
    }

    /// The output recorder, for filters that look at the output.
    pub fn output_recorder(&self) -> Option<Arc<dyn Recorder>> {
        self.output.clone()
    }

    /// Attach a filter, replacing any previous one.
    pub fn set_filter(&mut self, filter: Box<dyn SteppingFilter>) {
        self.filter = Some(filter);
    }

    /// Whether a filter is attached and has something to evaluate.
    pub fn is_filter_applied(&self) -> bool {
        self.filter.as_ref().is_some_and(|filter| filter.is_filter_applied())
    }

    /// Whether the current record passes the filter; `false` without a filter.
    pub fn filter_matches(&mut self, record_index: i64) -> bool {
        self.filter.as_mut().is_some_and(|filter| filter.filter_matches(record_index))
    }

    /// The current record was accepted at `location`.
    pub fn accept(&mut self, location: StepLocation) {
        if let Some(filter) = self.filter.as_mut() {
            filter.accept(location);
        }
    }

    /// Filter settings to hand back to the client.
    pub fn filter_settings(&self) -> Option<SteppingFilterSettings> {
        self.filter.as_ref().map(|filter| filter.settings())
    }

    /// Snapshot the element for the current record.
    ///
    /// A recorder that cannot be read leaves its side empty and raises a FATAL
    /// diagnostic against the element.
    pub fn capture_snapshot(
        &self,
        errors: &dyn ErrorReceiver,
        highlight: Option<&TextRange>,
    ) -> ElementData {
        let read = |recorder: Option<&Arc<dyn Recorder>>| {
            let recorder = recorder?;
            match recorder.data(highlight) {
                Ok(data) => data,
                Err(e) => {
                    debug!(element_id = %self.element_id, "unable to read recorder: {e}");
                    errors.log(
                        Severity::Fatal,
                        highlight.map(|range| range.from),
                        &self.element_id,
                        &e.to_string(),
                    );
                    None
                }
            }
        };

        let input = read(self.input.as_ref());
        let output = read(self.output.as_ref());

        ElementData {
            element_id: self.element_id.clone(),
            element_type: self.element_type.clone(),
            input,
            output,
            format_input: self.format_input,
            format_output: self.format_output,
            indicators: errors.indicators(&self.element_id),
        }
    }

    /// Clear both recorders ahead of the next record.
    pub fn reset_for_next_record(&self, highlight: Option<&TextRange>) {
        if let Some(input) = &self.input {
            input.clear(highlight);
        }
        if let Some(output) = &self.output {
            output.clear(highlight);
        }
    }
}

#[cfg(test)]
mod tests {
    use stepper_common::Location;
    use tracing::info;

    use super::*;
    use crate::{
        diagnostics::LoggingErrorReceiver,
        stepping::recorder::{BufferRecorder, RecordMode},
    };

    fn monitor() -> (ElementMonitor, Arc<BufferRecorder>, Arc<BufferRecorder>) {
        let input = Arc::new(BufferRecorder::new(RecordMode::Record));
        let output = Arc::new(BufferRecorder::new(RecordMode::Record));
        let mut monitor = ElementMonitor::new("upper", "uppercase").with_formatting(false, true);
        monitor.register_input_recorder(input.clone());
        monitor.register_output_recorder(output.clone());
        (monitor, input, output)
    }

    #[test]
    fn test_snapshot_and_reset() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing monitor snapshot");

        let errors = LoggingErrorReceiver::new();
        let (monitor, input, output) = monitor();
        input.write(b"abc");
        output.write(b"ABC");
        errors.log(Severity::Warning, None, "upper", "shouting");

        let data = monitor.capture_snapshot(&errors, None);
        assert_eq!(data.element_id, "upper");
        assert_eq!(data.element_type, "uppercase");
        assert_eq!(data.input.as_deref(), Some("abc"));
        assert_eq!(data.output.as_deref(), Some("ABC"));
        assert!(data.format_output && !data.format_input);
        assert_eq!(data.indicators.unwrap().count(Severity::Warning), 1);

        monitor.reset_for_next_record(None);
        let data = monitor.capture_snapshot(&errors, None);
        assert_eq!(data.input, None);
        assert_eq!(data.output, None);
    }

    #[test]
    fn test_unreadable_recorder_raises_fatal() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing monitor capture failure");

        let errors = LoggingErrorReceiver::new();
        let (monitor, input, output) = monitor();
        input.write(b"fine");
        output.write(&[0xc3, 0x28]);

        let highlight = TextRange::new(Location::new(4, 2), Location::new(4, 9));
        let data = monitor.capture_snapshot(&errors, Some(&highlight));
        assert_eq!(data.input.as_deref(), Some("fine"));
        assert_eq!(data.output, None);

        let indicators = data.indicators.unwrap();
        assert_eq!(indicators.count(Severity::Fatal), 1);
        assert_eq!(indicators.error_list[0].location, Some(Location::new(4, 2)));
    }

    #[test]
    fn test_without_filter() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing monitor without filter");

        let (mut monitor, _, _) = monitor();
        assert!(!monitor.is_filter_applied());
        assert!(!monitor.filter_matches(1));
        assert!(monitor.filter_settings().is_none());
        monitor.accept(StepLocation::new(1, 1, 1));
    }
}
