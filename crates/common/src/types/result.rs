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

//! Step results.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{SharedStepData, StepLocation, StepRequest, SteppingFilterSettings};

/// Outcome of a step request.
///
/// A result is returned whether or not a record was found so that the client
/// can show why nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Session the request belonged to
    pub session_id: String,
    /// Filter settings, including values recorded by unique filters
    #[serde(default)]
    pub step_filter_map: BTreeMap<String, SteppingFilterSettings>,
    /// Last record the search looked at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_location: Option<StepLocation>,
    /// Location the client should now show
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_location: Option<StepLocation>,
    /// Captured data for the location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_data: Option<SharedStepData>,
    /// Offset of the found stream in the full stream list, for paging
    #[serde(default)]
    pub current_stream_offset: usize,
    /// Whether a matching record was found
    #[serde(default)]
    pub found_record: bool,
    /// Problems that were not attributable to an element
    #[serde(default)]
    pub general_errors: BTreeSet<String>,
    /// Whether the last part read held more than one segment
    #[serde(default)]
    pub segmented_data: bool,
    /// Whether the search ran to completion before the client stopped waiting
    #[serde(default)]
    pub complete: bool,
}

impl StepResult {
    /// Result for a request that did not finish in time.
    pub fn incomplete(request: &StepRequest, progress_location: Option<StepLocation>) -> Self {
        Self {
            session_id: request.session_id.clone(),
            step_filter_map: request.step_filter_map.clone(),
            progress_location,
            step_location: request.step_location,
            ..Default::default()
        }
    }
}
