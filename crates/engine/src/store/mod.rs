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

//! Stream store.
//!
//! A stream is an ordered list of parts. Each part carries its main data, the
//! number of segments the data was written in, and optional child streams
//! (e.g. `Context` or `Meta`) keyed by type.
//!
//! The stepping core consumes two capabilities:
//!
//! - [`MetaService`] resolves selection criteria into an ordered list of streams
//! - [`Store`] opens a stream as a [`Source`] to read its parts
//!
//! [`MemoryStore`] and [`FsStore`] provide both.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stepper_common::{ContainerId, FindMetaCriteria};

use crate::{config::DEFAULT_ENCODING, error::StoreError};

/// Attributes of a stored stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Stream id
    pub id: ContainerId,
    /// Feed the stream was received on
    pub feed_name: String,
    /// Stream type, e.g. `Raw Events`
    pub type_name: String,
    /// Creation time in epoch millis
    #[serde(default)]
    pub create_ms: i64,
}

impl Meta {
    /// Whether `criteria` selects this stream.
    pub fn matches(&self, criteria: &FindMetaCriteria) -> bool {
        criteria.is_match(self.id, &self.feed_name, &self.type_name, self.create_ms)
    }
}

/// Content of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartData {
    /// Text, stored as UTF-8
    Text(String),
    /// Raw bytes in the feed's encoding
    Bytes(Vec<u8>),
}

impl PartData {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Bytes(bytes) => bytes.clone(),
        }
    }
}

fn one_segment() -> usize {
    1
}

/// One part of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPart {
    /// Main data
    pub data: PartData,
    /// Number of segments the data was written in
    #[serde(default = "one_segment")]
    pub segments: usize,
    /// Child streams keyed by type
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, PartData>,
}

impl StoredPart {
    /// A single-segment text part.
    pub fn text(data: impl Into<String>) -> Self {
        Self { data: PartData::Text(data.into()), segments: 1, children: BTreeMap::new() }
    }

    /// A single-segment part of raw bytes.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self { data: PartData::Bytes(data.into()), segments: 1, children: BTreeMap::new() }
    }

    /// Set the segment count.
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments;
        self
    }

    /// Attach a text child stream.
    pub fn with_child(mut self, child_type: impl Into<String>, data: impl Into<String>) -> Self {
        self.children.insert(child_type.into(), PartData::Text(data.into()));
        self
    }
}

/// A stream as it is held by the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStream {
    /// Stream attributes
    pub meta: Meta,
    /// Parts in order
    pub parts: Vec<StoredPart>,
}

impl StoredStream {
    /// A stream with no parts, created now.
    pub fn new(id: ContainerId, feed_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            meta: Meta {
                id,
                feed_name: feed_name.into(),
                type_name: type_name.into(),
                create_ms: chrono::Utc::now().timestamp_millis(),
            },
            parts: Vec::new(),
        }
    }

    /// Append a part.
    pub fn with_part(mut self, part: StoredPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Append a single-segment text part.
    pub fn with_text(self, data: impl Into<String>) -> Self {
        self.with_part(StoredPart::text(data))
    }

    /// Set the creation time.
    pub fn created_at(mut self, create_ms: i64) -> Self {
        self.meta.create_ms = create_ms;
        self
    }
}

/// Resolves selection criteria.
pub trait MetaService: Send + Sync {
    /// Streams selected by `criteria`, ordered by id.
    fn find(&self, criteria: &FindMetaCriteria) -> Result<Vec<Meta>, StoreError>;
}

/// Opens streams for reading.
pub trait Store: Send + Sync {
    /// Open the stream with the given id.
    fn open_source(&self, id: ContainerId) -> Result<Source, StoreError>;
}

/// Everything the stepping core needs from a store.
pub trait StreamStore: MetaService + Store {}

impl<T: MetaService + Store> StreamStore for T {}

/// An opened stream.
#[derive(Debug, Clone)]
pub struct Source {
    stream: StoredStream,
}

impl Source {
    /// Wrap a stored stream.
    pub fn new(stream: StoredStream) -> Self {
        Self { stream }
    }

    /// Stream attributes.
    pub fn meta(&self) -> &Meta {
        &self.stream.meta
    }

    /// Number of parts.
    pub fn count(&self) -> i64 {
        self.stream.parts.len() as i64
    }

    /// Open the 1-based part `part_index`.
    pub fn get(&self, part_index: i64) -> Result<InputStreamProvider<'_>, StoreError> {
        let out_of_range = || StoreError::PartOutOfRange { id: self.meta().id, part: part_index };
        let slot = usize::try_from(part_index - 1).map_err(|_| out_of_range())?;
        let part = self.stream.parts.get(slot).ok_or_else(out_of_range)?;
        Ok(InputStreamProvider { id: self.meta().id, part })
    }
}

/// Access to the main data and child streams of one part.
#[derive(Debug, Clone, Copy)]
pub struct InputStreamProvider<'a> {
    id: ContainerId,
    part: &'a StoredPart,
}

impl InputStreamProvider<'_> {
    /// Main data when `child_type` is `None`, otherwise the named child stream.
    pub fn get(&self, child_type: Option<&str>) -> Result<SegmentInputStream, StoreError> {
        let data = match child_type {
            None => &self.part.data,
            Some(child) => self.part.children.get(child).ok_or_else(|| StoreError::MissingChild {
                id: self.id,
                child: child.to_string(),
            })?,
        };
        let segments = if child_type.is_none() { self.part.segments } else { 1 };
        Ok(SegmentInputStream::new(data.to_bytes(), segments))
    }
}

/// Bytes of a part together with its segment count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInputStream {
    bytes: Vec<u8>,
    segments: usize,
}

impl SegmentInputStream {
    /// Wrap bytes written in `segments` segments.
    pub fn new(bytes: Vec<u8>, segments: usize) -> Self {
        Self { bytes, segments }
    }

    /// Number of bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Number of segments.
    pub fn count(&self) -> usize {
        self.segments
    }

    /// The bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encodings of feeds and their child streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedProperties {
    encodings: BTreeMap<(String, Option<String>), String>,
}

impl FeedProperties {
    /// Set the encoding of a feed's data, or of one of its child streams.
    pub fn set_encoding(&mut self, feed: &str, child_type: Option<&str>, encoding: &str) {
        self.encodings
            .insert((feed.to_string(), child_type.map(str::to_string)), encoding.to_string());
    }

    /// Encoding to decode `feed` data with, `UTF-8` unless configured.
    ///
    /// A child stream without its own setting uses the feed's encoding.
    pub fn encoding(&self, feed: &str, child_type: Option<&str>) -> String {
        let lookup = |child: Option<&str>| {
            self.encodings.get(&(feed.to_string(), child.map(str::to_string))).cloned()
        };
        child_type
            .and_then(|child| lookup(Some(child)))
            .or_else(|| lookup(None))
            .unwrap_or_else(|| DEFAULT_ENCODING.to_string())
    }
}
