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

//! Per-element filter settings.
//!
//! Filters let a user skip records that are not interesting: step to the next
//! record whose element raised a warning, produced output, or produced output
//! matching a value.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Severity, StepLocation};

/// Whether an element's output should be empty or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputState {
    /// Output is blank
    Empty,
    /// Output has some non-blank content
    NotEmpty,
}

impl FromStr for OutputState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "empty" => Ok(Self::Empty),
            "not-empty" | "notempty" => Ok(Self::NotEmpty),
            _ => Err(format!("unknown output state '{s}', expected empty or not-empty")),
        }
    }
}

/// How an [`OutputFilter`] compares the selected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// The value is present and not blank
    Exists,
    /// The value contains the filter value
    Contains,
    /// The value equals the filter value
    Equals,
    /// The value has not been seen in a previously accepted record
    Unique,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exists => "exists",
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::Unique => "unique",
        };
        f.write_str(name)
    }
}

/// A condition on an element's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFilter {
    /// JSON pointer into the output (e.g. `/user/name`); the whole output when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Comparison to perform
    pub match_type: MatchType,
    /// Value to compare against for `Contains` and `Equals`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Compare case-insensitively
    #[serde(default)]
    pub ignore_case: bool,
    /// Values already accepted by a `Unique` filter and where they were found
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unique_values: BTreeMap<String, StepLocation>,
}

impl OutputFilter {
    /// Create a filter with no path or value.
    pub fn new(match_type: MatchType) -> Self {
        Self { path: None, match_type, value: None, ignore_case: false, unique_values: BTreeMap::new() }
    }

    /// Select a value in JSON output.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Value to compare against.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Compare case-insensitively.
    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

/// Everything a user can filter on for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SteppingFilterSettings {
    /// Stop on records where the element raised at least this severity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to_severity: Option<Severity>,
    /// Stop on records where the element's output is (not) empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to_output: Option<OutputState>,
    /// Stop on records whose output matches one of these filters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<OutputFilter>,
}

impl SteppingFilterSettings {
    /// Whether any condition is configured.
    pub fn is_active(&self) -> bool {
        self.skip_to_severity.is_some() || self.skip_to_output.is_some() || !self.filters.is_empty()
    }

    /// Stop on the given severity or worse.
    pub fn skip_to_severity(severity: Severity) -> Self {
        Self { skip_to_severity: Some(severity), ..Default::default() }
    }

    /// Stop on the given output state.
    pub fn skip_to_output(state: OutputState) -> Self {
        Self { skip_to_output: Some(state), ..Default::default() }
    }

    /// Stop on output matching `filter`.
    pub fn with_filter(mut self, filter: OutputFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active() {
        assert!(!SteppingFilterSettings::default().is_active());
        assert!(SteppingFilterSettings::skip_to_severity(Severity::Error).is_active());
        assert!(SteppingFilterSettings::skip_to_output(OutputState::Empty).is_active());
        assert!(SteppingFilterSettings::default()
            .with_filter(OutputFilter::new(MatchType::Exists))
            .is_active());
    }

    #[test]
    fn test_output_state_parsing() {
        assert_eq!("empty".parse::<OutputState>().unwrap(), OutputState::Empty);
        assert_eq!("not-empty".parse::<OutputState>().unwrap(), OutputState::NotEmpty);
        assert_eq!("NOT_EMPTY".parse::<OutputState>().unwrap(), OutputState::NotEmpty);
        assert!("full".parse::<OutputState>().is_err());
    }

    #[test]
    fn test_settings_json_shape() {
        let settings = SteppingFilterSettings::skip_to_severity(Severity::Warning).with_filter(
            OutputFilter::new(MatchType::Contains).with_path("/user").with_value("bob"),
        );
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "skipToSeverity": "WARN",
                "filters": [{"path": "/user", "matchType": "CONTAINS", "value": "bob", "ignoreCase": false}]
            })
        );

        let back: SteppingFilterSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }
}
