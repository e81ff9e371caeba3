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

//! Transport types shared between stepping clients and the engine.

/// Per-element filter settings applied while searching for a record
pub mod filter;
/// Diagnostic severities, stored errors and per-element indicator sets
pub mod indicators;
/// Step, source and text locations
pub mod location;
/// Step requests and stream selection criteria
pub mod request;
/// Step results returned to clients
pub mod result;
/// Captured per-element data in its transport form
pub mod step_data;

pub use filter::*;
pub use indicators::*;
pub use location::*;
pub use request::*;
pub use result::*;
pub use step_data::*;
