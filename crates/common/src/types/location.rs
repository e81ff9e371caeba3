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

//! Positions within the stream space and within decoded text.
//!
//! A [`StepLocation`] addresses a single record: the stream (container) it
//! lives in, the part of that stream, and the record within the part. Parts
//! and records are numbered from 1; a record index of 0 means "before the
//! first record" and [`StepLocation::MAX`] means "the end of the part".

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Identifier of a stored stream.
pub type ContainerId = i64;

/// Position of a record in the hierarchical stream space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLocation {
    /// Stream the record belongs to
    pub container_id: ContainerId,
    /// 1-based part within the stream
    pub part_index: i64,
    /// 1-based record within the part
    pub record_index: i64,
}

impl StepLocation {
    /// Sentinel for "the last part" or "the last record" when the real bound is unknown.
    pub const MAX: i64 = i64::MAX;

    /// Create a location from its three coordinates.
    pub const fn new(container_id: ContainerId, part_index: i64, record_index: i64) -> Self {
        Self { container_id, part_index, record_index }
    }

    /// Before the first record of the first part of a stream.
    pub const fn first(container_id: ContainerId) -> Self {
        Self::new(container_id, 1, 0)
    }

    /// After the last record of the last part of a stream.
    pub const fn last(container_id: ContainerId) -> Self {
        Self::new(container_id, Self::MAX, Self::MAX)
    }

    /// Before the first record of the given part.
    pub const fn first_in_part(container_id: ContainerId, part_index: i64) -> Self {
        Self::new(container_id, part_index, 0)
    }

    /// After the last record of the given part.
    pub const fn last_in_part(container_id: ContainerId, part_index: i64) -> Self {
        Self::new(container_id, part_index, Self::MAX)
    }

    /// Same container and part, different record.
    pub const fn with_record(self, record_index: i64) -> Self {
        Self::new(self.container_id, self.part_index, record_index)
    }

    /// Whether this location sits at the very start of its stream.
    pub const fn is_at_stream_start(&self) -> bool {
        self.part_index <= 1 && self.record_index <= 1
    }

    /// Order two locations by the position of their containers in `candidates`,
    /// then by part and record.
    ///
    /// Returns `None` when either container is not part of the candidate list, as
    /// container ids alone carry no ordering.
    pub fn compare_in(&self, other: &Self, candidates: &[ContainerId]) -> Option<Ordering> {
        let own = candidates.iter().position(|id| *id == self.container_id)?;
        let theirs = candidates.iter().position(|id| *id == other.container_id)?;
        Some(
            own.cmp(&theirs)
                .then(self.part_index.cmp(&other.part_index))
                .then(self.record_index.cmp(&other.record_index)),
        )
    }
}

impl fmt::Display for StepLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn coordinate(value: i64) -> String {
            if value == StepLocation::MAX {
                "max".to_string()
            } else {
                value.to_string()
            }
        }

        write!(
            f,
            "{}:{}:{}",
            self.container_id,
            coordinate(self.part_index),
            coordinate(self.record_index)
        )
    }
}

/// Error returned when a `id:part:record` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLocationError(String);

impl fmt::Display for ParseLocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid step location '{}', expected id:part:record", self.0)
    }
}

impl std::error::Error for ParseLocationError {}

impl FromStr for StepLocation {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |value: &str| -> Result<i64, ParseLocationError> {
            if value.eq_ignore_ascii_case("max") {
                Ok(Self::MAX)
            } else {
                value.trim().parse().map_err(|_| ParseLocationError(s.to_string()))
            }
        };

        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(part), Some(record), None) => {
                Ok(Self::new(parse(id)?, parse(part)?, parse(record)?))
            }
            _ => Err(ParseLocationError(s.to_string())),
        }
    }
}

/// A line/column position in decoded text, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Line number
    pub line_no: i32,
    /// Column number
    pub col_no: i32,
}

impl Location {
    /// Create a location.
    pub const fn new(line_no: i32, col_no: i32) -> Self {
        Self { line_no, col_no }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_no, self.col_no)
    }
}

/// An inclusive range of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    /// First character of the range
    pub from: Location,
    /// Last character of the range
    pub to: Location,
}

impl TextRange {
    /// Create a range.
    pub const fn new(from: Location, to: Location) -> Self {
        Self { from, to }
    }

    /// Whether `location` falls inside this range.
    pub fn contains(&self, location: Location) -> bool {
        self.from <= location && location <= self.to
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.from, self.to)
    }
}

/// Where the data shown for a step came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    /// Stream id
    pub container_id: ContainerId,
    /// Part within the stream
    pub part_index: i64,
    /// Record within the part
    pub record_index: i64,
    /// Child stream type the data was read from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_type: Option<String>,
    /// Highlighted text of the record within its part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<TextRange>,
}

impl SourceLocation {
    /// Build a source location for a found step.
    pub fn new(
        location: StepLocation,
        child_type: Option<String>,
        highlight: Option<TextRange>,
    ) -> Self {
        Self {
            container_id: location.container_id,
            part_index: location.part_index,
            record_index: location.record_index,
            child_type,
            highlight,
        }
    }

    /// The step location this source location points at.
    pub fn step_location(&self) -> StepLocation {
        StepLocation::new(self.container_id, self.part_index, self.record_index)
    }
}
