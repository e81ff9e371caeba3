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

//! Error types raised while stepping.
//!
//! Three families of fault exist:
//!
//! - [`StoreError`] and most [`ProcessingError`]s concern a single candidate stream
//!   or part. The request handler records them as general errors and moves on.
//! - [`SteppingError`] aborts the whole request (e.g. the pipeline cannot be built).
//! - [`RecorderError`] is raised while capturing element data and only ever ends up
//!   as a diagnostic on the element.

use stepper_common::ContainerId;
use thiserror::Error;

/// Errors raised by a stream store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No stream with this id exists
    #[error("stream {0} not found")]
    NotFound(ContainerId),

    /// The requested part does not exist in the stream
    #[error("stream {id} has no part {part}")]
    PartOutOfRange {
        /// Stream id
        id: ContainerId,
        /// Requested part
        part: i64,
    },

    /// The requested child stream does not exist for the part
    #[error("stream {id} has no '{child}' child stream")]
    MissingChild {
        /// Stream id
        id: ContainerId,
        /// Requested child stream type
        child: String,
    },

    /// Reading the underlying storage failed
    #[error("failed to read stream store: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be decoded
    #[error("corrupt stream {id}: {message}")]
    Corrupt {
        /// Stream id
        id: ContainerId,
        /// What was wrong
        message: String,
    },
}

/// Errors raised by a pipeline while processing a part.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The problem has already been reported to the error receiver
    #[error("{0}")]
    Logged(String),

    /// Reading the input failed
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure inside the pipeline
    #[error("{0}")]
    Runtime(String),
}

impl ProcessingError {
    /// Whether the error receiver already knows about this error.
    pub fn is_logged(&self) -> bool {
        matches!(self, Self::Logged(_))
    }
}

/// Errors raised when reading captured element data.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The captured bytes are not valid text
    #[error("recorded data is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),

    /// Any other capture failure
    #[error("{0}")]
    Other(String),
}

/// Errors that abort a step request.
#[derive(Debug, Error)]
pub enum SteppingError {
    /// The pipeline has no record detector or no monitored element
    #[error("You cannot step with this pipeline as it does not contain required elements.")]
    NotSteppable,

    /// The pipeline definition could not be found or built
    #[error("failed to create pipeline '{name}': {message}")]
    PipelineConstruction {
        /// Pipeline name
        name: String,
        /// Why construction failed
        message: String,
    },

    /// Resolving the candidate streams failed
    #[error("failed to find streams: {0}")]
    Store(#[from] StoreError),

    /// The stepping worker panicked or was lost
    #[error("stepping task failed: {0}")]
    Task(String),
}
