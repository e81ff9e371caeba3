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

//! Stepping sessions.
//!
//! The [`SteppingService`] keeps one [`SteppingSession`] per session id. Steps
//! of a session run one at a time on tokio's blocking pool; a caller that
//! stops waiting after the request's timeout gets an incomplete result and the
//! step is terminated.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use eyre::Result;
use parking_lot::Mutex;
use stepper_common::{StepRequest, StepResult};
use tracing::{debug, info, warn};

use crate::{
    config::StepperConfig,
    error::SteppingError,
    pipeline::{PipelineFactory, PipelineStore},
    stepping::{SteppingRequestHandler, SteppingResponseCache},
    store::StreamStore,
    task::TaskContext,
};

/// State kept between the steps of one session.
#[derive(Debug)]
pub struct SteppingSession {
    cache: SteppingResponseCache,
}

impl SteppingSession {
    fn new(cache_entries: usize) -> Self {
        Self { cache: SteppingResponseCache::new(cache_entries) }
    }

    /// Step data captured by earlier steps.
    pub fn cache(&self) -> &SteppingResponseCache {
        &self.cache
    }
}

#[derive(Debug)]
struct SessionHandle {
    session: Mutex<SteppingSession>,
    last_used: Mutex<Instant>,
    running: Mutex<Option<TaskContext>>,
}

impl SessionHandle {
    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }
}

/// Runs step requests for any number of sessions.
#[derive(Debug)]
pub struct SteppingService {
    handler: SteppingRequestHandler,
    sessions: DashMap<String, Arc<SessionHandle>>,
    cache_entries: usize,
    idle_timeout: Duration,
    default_timeout_ms: u64,
}

impl SteppingService {
    /// A service stepping over `store` with pipelines from `pipelines`.
    pub fn new(
        store: Arc<dyn StreamStore>,
        pipelines: Arc<dyn PipelineStore>,
        factory: Arc<dyn PipelineFactory>,
        config: &StepperConfig,
    ) -> Self {
        let handler =
            SteppingRequestHandler::new(store, pipelines, factory, config.feed_properties());
        Self {
            handler,
            sessions: DashMap::new(),
            cache_entries: config.cache.max_entries,
            idle_timeout: config.session.idle_timeout(),
            default_timeout_ms: config.session.default_timeout_ms,
        }
    }

    fn session(&self, session_id: &str) -> Arc<SessionHandle> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(session_id, "opening stepping session");
                Arc::new(SessionHandle {
                    session: Mutex::new(SteppingSession::new(self.cache_entries)),
                    last_used: Mutex::new(Instant::now()),
                    running: Mutex::new(None),
                })
            })
            .clone()
    }

    /// Run one step.
    ///
    /// Fails only when the step itself fails (no steppable pipeline, the
    /// candidate streams cannot be listed, or the worker is lost). Running out
    /// of time yields an incomplete result carrying the last progress.
    pub async fn step(&self, request: StepRequest) -> Result<StepResult> {
        let handle = self.session(&request.session_id);
        handle.touch();

        let task = TaskContext::new();
        if let Some(previous) = handle.running.lock().replace(task.clone()) {
            // Supersede a step the caller stopped waiting for.
            previous.terminate();
        }

        let timeout_ms =
            if request.timeout_ms == 0 { self.default_timeout_ms } else { request.timeout_ms };
        let worker = {
            let handler = self.handler.clone();
            let handle = handle.clone();
            let request = request.clone();
            let task = task.clone();
            tokio::task::spawn_blocking(move || {
                let mut session = handle.session.lock();
                let result = handler.handle(&request, &mut session.cache, &task);
                handle.touch();
                result
            })
        };

        let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), worker).await;
        {
            let mut running = handle.running.lock();
            if running.as_ref().is_some_and(|current| current.is_same(&task)) {
                *running = None;
            }
        }

        match outcome {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(e)) => Err(SteppingError::Task(e.to_string()).into()),
            Err(_) => {
                warn!(
                    session = %request.session_id,
                    timeout_ms,
                    activity = ?task.current_info(),
                    "step timed out, terminating"
                );
                task.terminate();
                Ok(StepResult::incomplete(&request, task.progress()))
            }
        }
    }

    /// Ask the running step of a session, if any, to stop.
    pub fn terminate(&self, session_id: &str) -> bool {
        let Some(handle) = self.sessions.get(session_id).map(|entry| entry.value().clone()) else {
            return false;
        };
        let running = handle.running.lock().take();
        match running {
            Some(task) => {
                debug!(session_id, "terminating running step");
                task.terminate();
                true
            }
            None => false,
        }
    }

    /// Drop a session and its cache.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id);
        if let Some((_, handle)) = &removed {
            if let Some(task) = handle.running.lock().take() {
                task.terminate();
            }
            info!(session_id, "closed stepping session");
        }
        removed.is_some()
    }

    /// Drop every session unused since `now - idle timeout`, returning how many went.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|session_id, handle| {
            let idle = now.saturating_duration_since(*handle.last_used.lock());
            let keep = idle < self.idle_timeout || handle.running.lock().is_some();
            if !keep {
                debug!(%session_id, ?idle, "evicting idle session");
            }
            keep
        });
        before - self.sessions.len()
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of step results cached by a session.
    pub fn cached_steps(&self, session_id: &str) -> Option<usize> {
        let handle = self.sessions.get(session_id)?.value().clone();
        let cached = handle.session.lock().cache().len();
        Some(cached)
    }
}
