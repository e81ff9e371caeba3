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

//! Stepping through pipeline output one record at a time.
//!
//! # Key Components
//!
//! - [`SteppingRequestHandler`] - resolves candidate streams and drives the pipeline
//! - [`SteppingController`] - decides, record by record, whether the search is over
//! - [`ElementMonitor`] and [`ElementFilter`] - capture and filter each element
//! - [`SteppingResponseCache`] - bounded per-session cache of captured records

pub mod cache;
pub mod controller;
pub mod data;
pub mod filter;
pub mod handler;
pub mod monitor;
pub mod recorder;

pub use cache::SteppingResponseCache;
pub use controller::{ControllerState, SteppingController};
pub use data::{ElementData, StepData};
pub use filter::{ElementFilter, SteppingFilter};
pub use handler::SteppingRequestHandler;
pub use monitor::ElementMonitor;
pub use recorder::{BufferRecorder, RecordMode, Recorder};
