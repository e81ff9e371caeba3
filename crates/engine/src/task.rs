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

//! Cooperative cancellation and progress reporting for a running step.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use stepper_common::StepLocation;

#[derive(Debug, Default)]
struct TaskState {
    terminated: AtomicBool,
    progress: Mutex<Option<StepLocation>>,
    info: Mutex<Option<String>>,
}

/// Handle shared between a running step and whoever waits for it.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    state: Arc<TaskState>,
}

impl TaskContext {
    /// A fresh, running task.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the task to stop at the next opportunity.
    pub fn terminate(&self) {
        self.state.terminated.store(true, Ordering::SeqCst);
    }

    /// Whether termination was requested.
    pub fn is_terminated(&self) -> bool {
        self.state.terminated.load(Ordering::SeqCst)
    }

    /// Publish the record the task is looking at.
    pub fn set_progress(&self, location: StepLocation) {
        *self.state.progress.lock() = Some(location);
    }

    /// Last record the task reported.
    pub fn progress(&self) -> Option<StepLocation> {
        *self.state.progress.lock()
    }

    /// Describe what the task is doing.
    pub fn info(&self, message: impl Into<String>) {
        *self.state.info.lock() = Some(message.into());
    }

    /// Whether `other` is a clone of this task.
    pub fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Last description the task gave.
    pub fn current_info(&self) -> Option<String> {
        self.state.info.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let task = TaskContext::new();
        let observer = task.clone();
        assert!(!observer.is_terminated());
        assert_eq!(observer.progress(), None);

        task.set_progress(StepLocation::new(1, 2, 3));
        task.info("Processing stream 1");
        observer.terminate();

        assert!(task.is_terminated());
        assert_eq!(observer.progress(), Some(StepLocation::new(1, 2, 3)));
        assert_eq!(observer.current_info().as_deref(), Some("Processing stream 1"));
    }
}
