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

//! Stepper Engine - record-by-record stepping through data processing pipelines.
//!
//! A user picks a pipeline and a set of stored streams, then steps forwards
//! and backwards through the records the pipeline produces. Every step
//! re-runs the pipeline over the relevant part of a stream and captures what
//! each element read, wrote and complained about for the record it stops at.

pub mod config;
pub use config::*;

pub mod diagnostics;
pub use diagnostics::*;

pub mod error;
pub use error::*;

pub mod pipeline;
pub use pipeline::*;

pub mod service;
pub use service::*;

pub mod stepping;
pub use stepping::*;

pub mod store;
pub use store::*;

pub mod task;
pub use task::*;
