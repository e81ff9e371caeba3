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

//! Data captured for a step, before it is converted for transport.

use std::collections::BTreeMap;

use stepper_common::{Indicators, SharedElementData, SharedStepData, SourceLocation};

/// What one element saw and produced for a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    /// Element id
    pub element_id: String,
    /// Element type
    pub element_type: String,
    /// Captured input
    pub input: Option<String>,
    /// Captured output
    pub output: Option<String>,
    /// Pretty-print the input
    pub format_input: bool,
    /// Pretty-print the output
    pub format_output: bool,
    /// Diagnostics raised while processing the record
    pub indicators: Option<Indicators>,
}

impl ElementData {
    /// Transport form.
    pub fn convert_to_shared(&self) -> SharedElementData {
        SharedElementData {
            element_type: self.element_type.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            format_input: self.format_input,
            format_output: self.format_output,
            indicators: self.indicators.clone().filter(|indicators| !indicators.is_empty()),
        }
    }
}

/// Snapshot of every monitored element at one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepData {
    /// Where the record came from; `None` when nothing was found
    pub source_location: Option<SourceLocation>,
    /// Element data keyed by element id
    pub element_map: BTreeMap<String, ElementData>,
}

impl StepData {
    /// Transport form.
    pub fn convert_to_shared(&self) -> SharedStepData {
        SharedStepData {
            source_location: self.source_location.clone(),
            element_map: self
                .element_map
                .iter()
                .map(|(id, data)| (id.clone(), data.convert_to_shared()))
                .collect(),
        }
    }

    /// Add indicators raised outside any record, ahead of the element's own.
    ///
    /// Indicators for elements without data are dropped.
    pub fn merge_indicators(&mut self, indicators: &BTreeMap<String, Indicators>) {
        for (element_id, extra) in indicators {
            if let Some(data) = self.element_map.get_mut(element_id) {
                data.indicators = Indicators::combine(Some(extra), data.indicators.as_ref());
            }
        }
    }
}
