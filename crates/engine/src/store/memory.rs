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

use std::collections::BTreeMap;

use parking_lot::RwLock;
use stepper_common::{ContainerId, FindMetaCriteria};

use super::{Meta, MetaService, Source, Store, StoredStream};
use crate::error::StoreError;

/// Store holding its streams in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    streams: RwLock<BTreeMap<ContainerId, StoredStream>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `streams`.
    pub fn with_streams(streams: impl IntoIterator<Item = StoredStream>) -> Self {
        let store = Self::new();
        for stream in streams {
            store.add(stream);
        }
        store
    }

    /// Add or replace a stream.
    pub fn add(&self, stream: StoredStream) {
        self.streams.write().insert(stream.meta.id, stream);
    }

    /// Remove a stream.
    pub fn remove(&self, id: ContainerId) -> Option<StoredStream> {
        self.streams.write().remove(&id)
    }
}

impl MetaService for MemoryStore {
    fn find(&self, criteria: &FindMetaCriteria) -> Result<Vec<Meta>, StoreError> {
        Ok(self
            .streams
            .read()
            .values()
            .filter(|stream| stream.meta.matches(criteria))
            .map(|stream| stream.meta.clone())
            .collect())
    }
}

impl Store for MemoryStore {
    fn open_source(&self, id: ContainerId) -> Result<Source, StoreError> {
        self.streams.read().get(&id).cloned().map(Source::new).ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_is_ordered_by_id() {
        let store = MemoryStore::with_streams([
            StoredStream::new(9, "A", "Raw Events"),
            StoredStream::new(2, "B", "Raw Events"),
            StoredStream::new(5, "A", "Events"),
        ]);

        let ids = |criteria: FindMetaCriteria| -> Vec<ContainerId> {
            store.find(&criteria).unwrap().into_iter().map(|meta| meta.id).collect()
        };
        assert_eq!(ids(FindMetaCriteria::all()), vec![2, 5, 9]);
        assert_eq!(ids(FindMetaCriteria::for_feed("A")), vec![5, 9]);
        assert_eq!(ids(FindMetaCriteria::for_feed("A").with_type("Raw Events")), vec![9]);
    }

    #[test]
    fn test_open_missing_stream() {
        let store = MemoryStore::new();
        assert!(matches!(store.open_source(1), Err(StoreError::NotFound(1))));

        store.add(StoredStream::new(1, "A", "Raw Events").with_text("x"));
        assert_eq!(store.open_source(1).unwrap().count(), 1);
        assert!(store.remove(1).is_some());
        assert!(store.open_source(1).is_err());
    }
}
