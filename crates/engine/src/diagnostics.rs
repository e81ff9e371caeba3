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

//! Collection of diagnostics raised by pipeline elements.

use std::{collections::BTreeMap, fmt::Debug};

use parking_lot::Mutex;
use stepper_common::{Indicators, Location, Severity, StoredError};
use tracing::{debug, trace};

/// Sink for diagnostics raised while a pipeline runs.
///
/// Elements log into the receiver as they process; the stepping controller
/// reads the per-element indicators when it captures a record and clears them
/// before the next one.
pub trait ErrorReceiver: Debug + Send + Sync {
    /// Record a diagnostic against an element.
    fn log(&self, severity: Severity, location: Option<Location>, element_id: &str, message: &str);

    /// Diagnostics recorded for `element_id` since the last clear.
    fn indicators(&self, element_id: &str) -> Option<Indicators>;

    /// All diagnostics recorded since the last clear, keyed by element id.
    fn indicators_map(&self) -> BTreeMap<String, Indicators>;

    /// Forget every recorded diagnostic.
    fn clear(&self);

    /// Whether nothing of severity ERROR or worse has been recorded since the last clear.
    fn is_all_ok(&self) -> bool;
}

/// [`ErrorReceiver`] that keeps indicators in memory and traces every diagnostic.
#[derive(Debug, Default)]
pub struct LoggingErrorReceiver {
    indicators: Mutex<BTreeMap<String, Indicators>>,
}

impl LoggingErrorReceiver {
    /// An empty receiver.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ErrorReceiver for LoggingErrorReceiver {
    fn log(&self, severity: Severity, location: Option<Location>, element_id: &str, message: &str) {
        match severity {
            Severity::Info => trace!(element_id, "{message}"),
            _ => debug!(element_id, %severity, "{message}"),
        }

        self.indicators.lock().entry(element_id.to_string()).or_default().add(StoredError {
            severity,
            location,
            element_id: element_id.to_string(),
            message: message.to_string(),
        });
    }

    fn indicators(&self, element_id: &str) -> Option<Indicators> {
        self.indicators.lock().get(element_id).cloned()
    }

    fn indicators_map(&self) -> BTreeMap<String, Indicators> {
        self.indicators.lock().clone()
    }

    fn clear(&self) {
        self.indicators.lock().clear();
    }

    fn is_all_ok(&self) -> bool {
        self.indicators
            .lock()
            .values()
            .all(|indicators| indicators.max_severity().is_none_or(|max| max < Severity::Error))
    }
}
