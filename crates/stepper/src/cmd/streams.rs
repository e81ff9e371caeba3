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

//! Streams command - list what the store holds

use eyre::Result;
use stepper_engine::{FsStore, MetaService};

use crate::SelectionArgs;

/// Print one line per selected stream.
pub fn list_streams(store: &FsStore, selection: &SelectionArgs) -> Result<()> {
    let streams = store.find(&selection.criteria())?;
    tracing::debug!("Found {} streams", streams.len());

    if streams.is_empty() {
        println!("no streams");
        return Ok(());
    }
    for meta in streams {
        println!("{}\t{}\t{}", meta.id, meta.feed_name, meta.type_name);
    }
    Ok(())
}
