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

//! Per-element record filters.
//!
//! A filter is *applied* when its settings configure at least one condition.
//! An applied filter matches a record when any of its conditions holds:
//!
//! - the element raised a diagnostic at or above `skip_to_severity`
//! - the element's output is (not) empty as `skip_to_output` asks
//! - one of the output filters accepts the element's output
//!
//! `UNIQUE` output filters only remember a value once the record that carried
//! it has been accepted by the controller.

use std::{fmt::Debug, sync::Arc};

use serde_json::Value;
use stepper_common::{
    MatchType, OutputFilter, OutputState, StepLocation, SteppingFilterSettings,
};
use tracing::{trace, warn};

use super::recorder::Recorder;
use crate::diagnostics::ErrorReceiver;

/// A predicate over the current record of one element.
pub trait SteppingFilter: Debug + Send {
    /// Whether the filter has anything to evaluate.
    fn is_filter_applied(&self) -> bool;

    /// Whether the current record satisfies the filter.
    fn filter_matches(&mut self, record_index: i64) -> bool;

    /// The current record was accepted at `location`.
    fn accept(&mut self, location: StepLocation);

    /// Settings including any values remembered by unique filters.
    fn settings(&self) -> SteppingFilterSettings;
}

/// [`SteppingFilter`] over an element's diagnostics and recorded output.
#[derive(Debug)]
pub struct ElementFilter {
    element_id: String,
    settings: SteppingFilterSettings,
    output: Option<Arc<dyn Recorder>>,
    errors: Arc<dyn ErrorReceiver>,
    /// Unique values seen in the current record, by output filter index
    pending: Vec<(usize, String)>,
    /// Unique values of the last accepted record
    accepted: Vec<(usize, String, StepLocation)>,
}

impl ElementFilter {
    /// Filter `element_id` with `settings`, reading its output from `output`.
    pub fn new(
        element_id: impl Into<String>,
        settings: SteppingFilterSettings,
        output: Option<Arc<dyn Recorder>>,
        errors: Arc<dyn ErrorReceiver>,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            settings,
            output,
            errors,
            pending: Vec::new(),
            accepted: Vec::new(),
        }
    }

    fn output_text(&self) -> Option<String> {
        let recorder = self.output.as_ref()?;
        match recorder.data(None) {
            Ok(data) => data,
            Err(e) => {
                warn!(element_id = %self.element_id, "unable to read output for filtering: {e}");
                None
            }
        }
    }

    fn severity_matches(&self) -> bool {
        let Some(threshold) = self.settings.skip_to_severity else {
            return false;
        };
        self.errors
            .indicators(&self.element_id)
            .and_then(|indicators| indicators.max_severity())
            .is_some_and(|max| max >= threshold)
    }

    fn output_state_matches(&self, output: Option<&str>) -> bool {
        let empty = output.is_none_or(|text| text.trim().is_empty());
        match self.settings.skip_to_output {
            Some(OutputState::Empty) => empty,
            Some(OutputState::NotEmpty) => !empty,
            None => false,
        }
    }

    fn output_filter_matches(&mut self, index: usize, output: Option<&str>) -> bool {
        let filter = &self.settings.filters[index];
        let Some(value) = select_value(filter, output) else {
            return false;
        };

        match filter.match_type {
            MatchType::Exists => !value.trim().is_empty(),
            MatchType::Contains => compare(filter, &value, |value, expected| value.contains(expected)),
            MatchType::Equals => compare(filter, &value, |value, expected| value == expected),
            MatchType::Unique => {
                let key = if filter.ignore_case { value.to_lowercase() } else { value };
                if filter.unique_values.contains_key(&key) {
                    false
                } else {
                    self.pending.push((index, key));
                    true
                }
            }
        }
    }
}

impl SteppingFilter for ElementFilter {
    fn is_filter_applied(&self) -> bool {
        self.settings.is_active()
    }

    fn filter_matches(&mut self, record_index: i64) -> bool {
        self.pending.clear();

        let output = self.output_text();
        let mut matched = self.severity_matches() | self.output_state_matches(output.as_deref());
        // Every output filter is evaluated so that unique values are staged.
        for index in 0..self.settings.filters.len() {
            matched |= self.output_filter_matches(index, output.as_deref());
        }

        trace!(element_id = %self.element_id, record_index, matched, "evaluated filter");
        matched
    }

    fn accept(&mut self, location: StepLocation) {
        self.accepted =
            self.pending.iter().map(|(index, value)| (*index, value.clone(), location)).collect();
    }

    fn settings(&self) -> SteppingFilterSettings {
        let mut settings = self.settings.clone();
        for (index, value, location) in &self.accepted {
            if let Some(filter) = settings.filters.get_mut(*index) {
                filter.unique_values.insert(value.clone(), *location);
            }
        }
        settings
    }
}

/// The value an output filter looks at: the JSON value at its path, or the whole output.
fn select_value(filter: &OutputFilter, output: Option<&str>) -> Option<String> {
    let output = output?;
    let Some(path) = filter.path.as_deref() else {
        return Some(output.trim().to_string());
    };

    let json: Value = serde_json::from_str(output).ok()?;
    match json.pointer(path)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn compare(filter: &OutputFilter, value: &str, op: impl Fn(&str, &str) -> bool) -> bool {
    let Some(expected) = filter.value.as_deref() else {
        return false;
    };
    if filter.ignore_case {
        op(&value.to_lowercase(), &expected.to_lowercase())
    } else {
        op(value, expected)
    }
}
