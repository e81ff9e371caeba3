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

//! Record-by-record decisions of a step.
//!
//! The pipeline calls [`SteppingController::end_record`] after every record.
//! The controller checks the record's position against the step location the
//! handler set for the current part, evaluates the element filters, and on
//! acceptance captures every monitor into the session's response cache.
//!
//! Forward-looking steps (`FIRST`, `FORWARD`, `REFRESH`) stop at the first
//! accepted record. Backward-looking steps (`LAST`, `BACKWARD`) keep scanning
//! the part so that the last accepted record wins.

use std::{collections::BTreeMap, sync::Arc};

use stepper_common::{
    SourceLocation, StepLocation, StepRequest, StepType, SteppingFilterSettings, TextRange,
};
use tracing::{debug, trace};

use super::{
    cache::SteppingResponseCache,
    data::StepData,
    filter::ElementFilter,
    monitor::ElementMonitor,
};
use crate::{diagnostics::ErrorReceiver, pipeline::RecordBoundaryCallback, task::TaskContext};

/// Where the controller is in its search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No record has been seen yet
    AwaitingFirstCallback,
    /// Looking for the next matching record
    SearchingForward,
    /// Looking for the previous matching record
    SearchingBackward,
    /// Looking for the first or last matching record
    SearchingBoundary,
    /// Looking for the record at the reference location
    Refreshing,
    /// A record has been accepted
    Found,
    /// The candidate streams ran out without a match
    Exhausted,
}

/// Per-request state machine driven by the pipeline's record callbacks.
#[derive(Debug)]
pub struct SteppingController<'a> {
    request: &'a StepRequest,
    cache: &'a mut SteppingResponseCache,
    task: TaskContext,
    errors: Arc<dyn ErrorReceiver>,
    monitors: Vec<ElementMonitor>,
    filter_settings: BTreeMap<String, SteppingFilterSettings>,
    step_location: Option<StepLocation>,
    stream_info: String,
    progress: Option<StepLocation>,
    found: Option<StepLocation>,
    state: ControllerState,
}

impl<'a> SteppingController<'a> {
    /// A controller for `request`, caching accepted records in `cache`.
    pub fn new(
        request: &'a StepRequest,
        cache: &'a mut SteppingResponseCache,
        task: TaskContext,
        errors: Arc<dyn ErrorReceiver>,
    ) -> Self {
        Self {
            request,
            cache,
            task,
            errors,
            monitors: Vec::new(),
            filter_settings: request.step_filter_map.clone(),
            step_location: None,
            stream_info: String::new(),
            progress: None,
            found: None,
            state: ControllerState::AwaitingFirstCallback,
        }
    }

    /// Monitor the elements of a newly built pipeline.
    ///
    /// Filter settings, including unique values accepted so far, carry over
    /// from the monitors being replaced.
    pub fn install_monitors(&mut self, monitors: Vec<ElementMonitor>) {
        self.filter_settings = self.filter_settings();
        self.monitors = monitors;

        for monitor in &mut self.monitors {
            if let Some(settings) = self.filter_settings.get(monitor.element_id()) {
                let filter = ElementFilter::new(
                    monitor.element_id(),
                    settings.clone(),
                    monitor.output_recorder(),
                    self.errors.clone(),
                );
                monitor.set_filter(Box::new(filter));
            }
        }
    }

    /// The monitors of the current pipeline.
    pub fn monitors(&self) -> &[ElementMonitor] {
        &self.monitors
    }

    /// Reference location for the part about to be processed.
    pub fn set_step_location(&mut self, location: Option<StepLocation>) {
        self.step_location = location;
    }

    /// Human-readable description of the stream being processed.
    pub fn set_stream_info(&mut self, info: impl Into<String>) {
        self.stream_info = info.into();
    }

    /// Reset every monitor and forget leftover diagnostics ahead of a new part.
    pub fn clear_all_filters(&mut self) {
        for monitor in &self.monitors {
            monitor.reset_for_next_record(None);
        }
        self.errors.clear();
    }

    /// Whether a record has been accepted.
    pub fn is_found(&self) -> bool {
        self.found.is_some()
    }

    /// Location of the accepted record.
    pub fn found_location(&self) -> Option<StepLocation> {
        self.found
    }

    /// Last record the controller was called for.
    pub fn progress_location(&self) -> Option<StepLocation> {
        self.progress
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The candidate streams ran out.
    pub fn mark_exhausted(&mut self) {
        if self.found.is_none() {
            self.state = ControllerState::Exhausted;
        }
    }

    /// Filter settings for every element, including unique values accepted so far.
    pub fn filter_settings(&self) -> BTreeMap<String, SteppingFilterSettings> {
        let mut settings = self.filter_settings.clone();
        for monitor in &self.monitors {
            if let Some(current) = monitor.filter_settings() {
                settings.insert(monitor.element_id().to_string(), current);
            }
        }
        settings
    }

    /// The cached data of the accepted record.
    pub fn found_step_data(&self) -> Option<StepData> {
        self.cache.get(&self.found?).cloned()
    }

    /// Snapshot every monitor, located at the accepted record if there is one.
    pub fn create_step_data(&self, highlight: Option<&TextRange>) -> StepData {
        let source_location = self.found.map(|found| {
            SourceLocation::new(found, self.request.child_stream_type.clone(), highlight.copied())
        });
        let element_map = self
            .monitors
            .iter()
            .map(|monitor| {
                (monitor.element_id().to_string(), monitor.capture_snapshot(self.errors.as_ref(), highlight))
            })
            .collect();

        StepData { source_location, element_map }
    }

    fn searching_state(step_type: StepType) -> ControllerState {
        match step_type {
            StepType::First | StepType::Last => ControllerState::SearchingBoundary,
            StepType::Forward => ControllerState::SearchingForward,
            StepType::Backward => ControllerState::SearchingBackward,
            StepType::Refresh => ControllerState::Refreshing,
        }
    }

    fn is_position_valid(&self, location: &StepLocation) -> bool {
        let Some(reference) = self.step_location else {
            return true;
        };

        match self.request.step_type {
            StepType::First | StepType::Last => true,
            StepType::Forward => {
                location.part_index > reference.part_index
                    || (location.part_index == reference.part_index
                        && location.record_index > reference.record_index)
            }
            StepType::Backward => {
                location.part_index < reference.part_index
                    || (location.part_index == reference.part_index
                        && location.record_index < reference.record_index)
            }
            StepType::Refresh => location.record_index == reference.record_index,
        }
    }

    /// Accept when no applied filter rejects the record, or when any applied filter matches it.
    fn filters_match(&mut self, record_index: i64) -> bool {
        let mut all_match = true;
        let mut filter_match = false;
        for monitor in &mut self.monitors {
            if monitor.is_filter_applied() {
                if monitor.filter_matches(record_index) {
                    filter_match = true;
                } else {
                    all_match = false;
                }
            }
        }
        all_match || filter_match
    }

    fn reached_backward_limit(&self, location: &StepLocation) -> bool {
        self.request.step_type == StepType::Backward
            && self.step_location.is_some_and(|reference| {
                location.part_index == reference.part_index
                    && location.record_index >= reference.record_index.saturating_sub(1)
            })
    }
}

impl RecordBoundaryCallback for SteppingController<'_> {
    fn end_record(&mut self, record_index: i64, highlight: Option<TextRange>) -> bool {
        let (container_id, part_index) = self
            .step_location
            .map(|location| (location.container_id, location.part_index))
            .unwrap_or_default();
        let progress = StepLocation::new(container_id, part_index, record_index);
        self.progress = Some(progress);
        self.task.set_progress(progress);
        self.task.info(format!("Processing stream - {} : [{record_index}]", self.stream_info));

        if self.task.is_terminated() {
            return true;
        }

        if self.state == ControllerState::AwaitingFirstCallback {
            self.state = Self::searching_state(self.request.step_type);
        }

        let step_type = self.request.step_type;
        let mut terminate = false;
        if self.is_position_valid(&progress) {
            let accepted = step_type == StepType::Refresh || self.filters_match(record_index);
            trace!(%progress, accepted, "evaluated record");

            if accepted {
                self.found = Some(progress);
                self.state = ControllerState::Found;

                let step_data = self.create_step_data(highlight.as_ref());
                self.cache.put(progress, step_data);
                for monitor in &mut self.monitors {
                    monitor.accept(progress);
                }

                // Later records override earlier ones when looking backwards.
                terminate = !step_type.is_backwards();
                debug!(%progress, terminate, "accepted record");
            }
        }

        for monitor in &self.monitors {
            monitor.reset_for_next_record(highlight.as_ref());
        }
        self.errors.clear();

        if !terminate && self.reached_backward_limit(&progress) {
            trace!(%progress, "reached the reference location");
            terminate = true;
        }
        terminate
    }
}
