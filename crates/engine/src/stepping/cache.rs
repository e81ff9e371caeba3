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

//! Bounded cache of step data, one per stepping session.
//!
//! Eviction is first-in first-out over distinct locations: storing data for a
//! location that is already cached overwrites the data but keeps its age.

use std::collections::{HashMap, VecDeque};

use stepper_common::StepLocation;
use tracing::trace;

use super::data::StepData;
use crate::config::DEFAULT_CACHE_ENTRIES;

/// Step data keyed by the location it was captured at.
#[derive(Debug)]
pub struct SteppingResponseCache {
    capacity: usize,
    location_to_step_data: HashMap<StepLocation, StepData>,
    insertion_order: VecDeque<StepLocation>,
}

impl Default for SteppingResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}

impl SteppingResponseCache {
    /// An empty cache holding at most `capacity` locations (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            location_to_step_data: HashMap::with_capacity(capacity),
            insertion_order: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Data captured at `location`, if still cached.
    pub fn get(&self, location: &StepLocation) -> Option<&StepData> {
        self.location_to_step_data.get(location)
    }

    /// Store data captured at `location`.
    pub fn put(&mut self, location: StepLocation, step_data: StepData) {
        if !self.location_to_step_data.contains_key(&location) {
            self.insertion_order.push_back(location);
            while self.insertion_order.len() > self.capacity {
                if let Some(oldest) = self.insertion_order.pop_front() {
                    trace!("evicting cached step data for {oldest}");
                    self.location_to_step_data.remove(&oldest);
                }
            }
        }
        self.location_to_step_data.insert(location, step_data);
    }

    /// Number of cached locations.
    pub fn len(&self) -> usize {
        self.location_to_step_data.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.location_to_step_data.is_empty()
    }

    /// Maximum number of cached locations.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
