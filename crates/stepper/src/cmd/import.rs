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

//! Import command - write a stream built from local files into the store

use std::{fs, path::PathBuf};

use eyre::{Context, Result};
use stepper_common::ContainerId;
use stepper_engine::{FsStore, StoredPart, StoredStream};

/// Store the files in `parts` as the parts of stream `id`.
///
/// Files that are not UTF-8 are kept as raw bytes and decoded with the
/// feed's configured encoding when stepped over.
pub fn import_stream(
    store: &FsStore,
    id: ContainerId,
    feed: &str,
    stream_type: &str,
    children: &[(String, String)],
    parts: &[PathBuf],
) -> Result<()> {
    let mut stream = StoredStream::new(id, feed, stream_type);

    for path in parts {
        let bytes = fs::read(path).with_context(|| format!("Failed to read part: {:?}", path))?;
        let mut part = match String::from_utf8(bytes) {
            Ok(text) => StoredPart::text(text),
            Err(e) => StoredPart::bytes(e.into_bytes()),
        };
        for (child_type, file) in children {
            let data = fs::read_to_string(file)
                .with_context(|| format!("Failed to read child stream: {:?}", file))?;
            part = part.with_child(child_type, data);
        }
        stream = stream.with_part(part);
    }

    store.put(&stream)?;
    tracing::info!("Imported stream {} with {} parts", id, parts.len());
    println!("imported stream {id} ({} parts)", parts.len());
    Ok(())
}
