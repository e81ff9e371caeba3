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

//! Transport form of the data captured for a step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Indicators, SourceLocation};

/// What one element saw and produced for the current record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedElementData {
    /// Element type, e.g. `splitter` or `key_value`
    pub element_type: String,
    /// Captured input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Captured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Whether the client should pretty-print the input
    #[serde(default)]
    pub format_input: bool,
    /// Whether the client should pretty-print the output
    #[serde(default)]
    pub format_output: bool,
    /// Diagnostics raised by the element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Indicators>,
}

/// Everything captured for a step, keyed by element id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStepData {
    /// Where the record came from; absent when nothing was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    /// Per-element data
    #[serde(default)]
    pub element_map: BTreeMap<String, SharedElementData>,
}

impl SharedStepData {
    /// Data captured for one element.
    pub fn element(&self, element_id: &str) -> Option<&SharedElementData> {
        self.element_map.get(element_id)
    }

    /// Whether any element carries a diagnostic.
    pub fn has_indicators(&self) -> bool {
        self.element_map
            .values()
            .any(|data| data.indicators.as_ref().is_some_and(|indicators| !indicators.is_empty()))
    }
}
