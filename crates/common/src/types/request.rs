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

//! Step requests.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ContainerId, StepLocation, SteppingFilterSettings};

/// Default time a client waits for a step before receiving an incomplete result.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;

/// Direction of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    /// The first matching record of the first stream
    First,
    /// The last matching record of the last stream
    Last,
    /// The next matching record after the reference location
    Forward,
    /// The previous matching record before the reference location
    Backward,
    /// Re-process the record at the reference location
    Refresh,
}

impl StepType {
    /// Whether the search walks towards the start of the stream space.
    pub fn is_backwards(&self) -> bool {
        matches!(self, Self::Backward | Self::Last)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::First => "first",
            Self::Last => "last",
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Refresh => "refresh",
        };
        f.write_str(name)
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "forward" | "next" => Ok(Self::Forward),
            "backward" | "previous" | "prev" => Ok(Self::Backward),
            "refresh" => Ok(Self::Refresh),
            _ => Err(format!("unknown step type '{s}'")),
        }
    }
}

/// Selects the streams a stepping session walks over.
///
/// Every field narrows the selection; an empty criteria selects every stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMetaCriteria {
    /// Only streams of this feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_name: Option<String>,
    /// Only streams of this type (e.g. `Raw Events`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Only these stream ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<ContainerId>>,
    /// Only streams created at or after this time (epoch millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after_ms: Option<i64>,
    /// Only streams created before this time (epoch millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before_ms: Option<i64>,
}

impl FindMetaCriteria {
    /// Criteria matching every stream.
    pub fn all() -> Self {
        Self::default()
    }

    /// Criteria matching one feed.
    pub fn for_feed(feed_name: impl Into<String>) -> Self {
        Self { feed_name: Some(feed_name.into()), ..Default::default() }
    }

    /// Restrict to a stream type.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Restrict to a set of ids.
    pub fn with_ids(mut self, ids: Vec<ContainerId>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Whether a stream with these attributes is selected.
    pub fn is_match(&self, id: ContainerId, feed_name: &str, type_name: &str, create_ms: i64) -> bool {
        self.feed_name.as_deref().is_none_or(|feed| feed == feed_name)
            && self.type_name.as_deref().is_none_or(|ty| ty == type_name)
            && self.ids.as_ref().is_none_or(|ids| ids.contains(&id))
            && self.created_after_ms.is_none_or(|after| create_ms >= after)
            && self.created_before_ms.is_none_or(|before| create_ms < before)
    }
}

/// Name of the pipeline to step with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineRef(pub String);

impl PipelineRef {
    /// Reference a pipeline by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One user-initiated step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    /// Stepping session this request belongs to
    pub session_id: String,
    /// Direction of the step
    pub step_type: StepType,
    /// Where the user currently is, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_location: Option<StepLocation>,
    /// Streams to step over
    #[serde(default)]
    pub criteria: FindMetaCriteria,
    /// Pipeline to process the streams with
    pub pipeline: PipelineRef,
    /// Child stream to read instead of the main data (e.g. `Context`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_stream_type: Option<String>,
    /// Filter settings keyed by element id
    #[serde(default)]
    pub step_filter_map: BTreeMap<String, SteppingFilterSettings>,
    /// How long the caller waits for the step to complete
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

impl StepRequest {
    /// Create a request with no reference location, criteria or filters.
    pub fn new(session_id: impl Into<String>, step_type: StepType, pipeline: PipelineRef) -> Self {
        Self {
            session_id: session_id.into(),
            step_type,
            step_location: None,
            criteria: FindMetaCriteria::default(),
            pipeline,
            child_stream_type: None,
            step_filter_map: BTreeMap::new(),
            timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
        }
    }

    /// Set the reference location.
    pub fn at(mut self, location: StepLocation) -> Self {
        self.step_location = Some(location);
        self
    }

    /// Set the stream selection criteria.
    pub fn with_criteria(mut self, criteria: FindMetaCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Read a child stream.
    pub fn with_child_stream_type(mut self, child: impl Into<String>) -> Self {
        self.child_stream_type = Some(child.into());
        self
    }

    /// Add filter settings for an element.
    pub fn with_filter(mut self, element_id: impl Into<String>, settings: SteppingFilterSettings) -> Self {
        self.step_filter_map.insert(element_id.into(), settings);
        self
    }

    /// Replace all filter settings.
    pub fn with_filter_map(mut self, filters: BTreeMap<String, SteppingFilterSettings>) -> Self {
        self.step_filter_map = filters;
        self
    }

    /// Set the timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// The same request stepping in another direction from another location.
    pub fn next(&self, step_type: StepType, location: Option<StepLocation>) -> Self {
        Self { step_type, step_location: location, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_type_parsing() {
        assert_eq!("FIRST".parse::<StepType>().unwrap(), StepType::First);
        assert_eq!("prev".parse::<StepType>().unwrap(), StepType::Backward);
        assert_eq!("next".parse::<StepType>().unwrap(), StepType::Forward);
        assert!("sideways".parse::<StepType>().is_err());
        assert!(StepType::Last.is_backwards());
        assert!(!StepType::Refresh.is_backwards());
    }

    #[test]
    fn test_criteria_matching() {
        let all = FindMetaCriteria::all();
        assert!(all.is_match(1, "FEED", "Raw Events", 0));

        let criteria = FindMetaCriteria::for_feed("FEED").with_type("Raw Events").with_ids(vec![1, 2]);
        assert!(criteria.is_match(2, "FEED", "Raw Events", 0));
        assert!(!criteria.is_match(3, "FEED", "Raw Events", 0));
        assert!(!criteria.is_match(1, "OTHER", "Raw Events", 0));
        assert!(!criteria.is_match(1, "FEED", "Events", 0));

        let window = FindMetaCriteria { created_after_ms: Some(10), created_before_ms: Some(20), ..Default::default() };
        assert!(window.is_match(1, "F", "T", 10));
        assert!(!window.is_match(1, "F", "T", 20));
        assert!(!window.is_match(1, "F", "T", 9));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: StepRequest = serde_json::from_value(serde_json::json!({
            "sessionId": "s1",
            "stepType": "FORWARD",
            "pipeline": "events",
            "stepLocation": {"containerId": 3, "partIndex": 1, "recordIndex": 2}
        }))
        .unwrap();

        assert_eq!(request.step_type, StepType::Forward);
        assert_eq!(request.step_location, Some(StepLocation::new(3, 1, 2)));
        assert_eq!(request.timeout_ms, DEFAULT_STEP_TIMEOUT_MS);
        assert!(request.step_filter_map.is_empty());
        assert_eq!(request.pipeline.name(), "events");
    }

    #[test]
    fn test_next_keeps_everything_but_direction_and_location() {
        let request = StepRequest::new("s", StepType::First, PipelineRef::new("p"))
            .with_criteria(FindMetaCriteria::for_feed("F"));
        let next = request.next(StepType::Forward, Some(StepLocation::new(1, 1, 1)));
        assert_eq!(next.step_type, StepType::Forward);
        assert_eq!(next.criteria, request.criteria);
        assert_eq!(next.session_id, "s");
    }
}
