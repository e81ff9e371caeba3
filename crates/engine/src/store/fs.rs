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

use std::{
    fs,
    path::{Path, PathBuf},
};

use stepper_common::{ContainerId, FindMetaCriteria};
use tracing::{trace, warn};

use super::{Meta, MetaService, Source, Store, StoredStream};
use crate::error::StoreError;

/// Store keeping one JSON document per stream, named `<id>.json`, in a directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Use `root` as the store directory, creating it when needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_file(&self, id: ContainerId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Write a stream, replacing any stream with the same id.
    pub fn put(&self, stream: &StoredStream) -> Result<(), StoreError> {
        let file = self.stream_file(stream.meta.id);
        trace!("writing stream: {:?}", file);

        let content = serde_json::to_string_pretty(stream)
            .map_err(|e| StoreError::Corrupt { id: stream.meta.id, message: e.to_string() })?;
        fs::write(&file, content)?;
        Ok(())
    }

    fn read(&self, id: ContainerId) -> Result<StoredStream, StoreError> {
        let file = self.stream_file(id);
        trace!("reading stream: {:?}", file);
        if !file.exists() {
            return Err(StoreError::NotFound(id));
        }

        let content = fs::read_to_string(&file)?;
        let stream: StoredStream = serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt { id, message: e.to_string() })?;
        if stream.meta.id != id {
            return Err(StoreError::Corrupt {
                id,
                message: format!("file holds stream {}", stream.meta.id),
            });
        }
        Ok(stream)
    }

    fn stream_ids(&self) -> Result<Vec<ContainerId>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()).map(str::parse::<ContainerId>) {
                Some(Ok(id)) => ids.push(id),
                _ => trace!("ignoring non-stream file: {:?}", path),
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

impl MetaService for FsStore {
    fn find(&self, criteria: &FindMetaCriteria) -> Result<Vec<Meta>, StoreError> {
        let unfiltered = criteria.feed_name.is_none() && criteria.type_name.is_none();
        let mut found = Vec::new();
        for id in self.stream_ids()? {
            if criteria.ids.as_ref().is_some_and(|ids| !ids.contains(&id)) {
                continue;
            }
            match self.read(id) {
                Ok(stream) if stream.meta.matches(criteria) => found.push(stream.meta),
                Ok(_) => {}
                // Still listed so that opening it reports the problem.
                Err(StoreError::Corrupt { .. }) if unfiltered => {
                    warn!("stream {id} is corrupt, listing it without attributes");
                    found.push(Meta {
                        id,
                        feed_name: String::new(),
                        type_name: String::new(),
                        create_ms: 0,
                    });
                }
                Err(e) => warn!("skipping unreadable stream {id}: {e}"),
            }
        }
        Ok(found)
    }
}

impl Store for FsStore {
    fn open_source(&self, id: ContainerId) -> Result<Source, StoreError> {
        self.read(id).map(Source::new)
    }
}
