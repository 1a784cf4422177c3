// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

/// Tunables for a [`Manager`](crate::manager::Manager).
///
/// Defaults reproduce the source's behavior: a 3-worker floor, a 10ms idle
/// backoff, a 1ms manager-thread backoff, and an unbounded shutdown join
/// (the spec has no per-operation timeout; `shutdown_join_timeout` exists
/// for embedders who want one anyway).
#[derive(Debug, Clone, bon::Builder)]
pub struct ManagerConfig {
    #[builder(default = 3)]
    max_workers: usize,

    #[builder(default = Duration::from_millis(10), into)]
    idle_sleep: Duration,

    #[builder(default = Duration::from_millis(1), into)]
    manager_backoff: Duration,

    /// Bound on how long [`Manager::shutdown`](crate::manager::Manager::shutdown)
    /// waits for worker threads to join. `None` (the default) waits
    /// indefinitely, matching §5's "no per-operation timeout" — in-flight
    /// dispatches always run to completion. `Some(d)` bounds the wait to
    /// `d`; any worker still running past the deadline is logged and its
    /// thread is detached rather than joined.
    #[builder(into)]
    shutdown_join_timeout: Option<Duration>,

    /// Per-queue capacity ceiling. `None` means unbounded (the realistic
    /// default — `QueueError::QueueFull` only matters to callers who
    /// deliberately want back-pressure).
    queue_capacity: Option<usize>,
}

impl ManagerConfig {
    #[must_use]
    pub const fn max_workers(&self) -> usize { self.max_workers }

    #[must_use]
    pub const fn idle_sleep(&self) -> Duration { self.idle_sleep }

    #[must_use]
    pub const fn manager_backoff(&self) -> Duration { self.manager_backoff }

    #[must_use]
    pub const fn shutdown_join_timeout(&self) -> Option<Duration> { self.shutdown_join_timeout }

    #[must_use]
    pub const fn queue_capacity(&self) -> Option<usize> { self.queue_capacity }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_behavior() {
        let config = ManagerConfig::builder().build();
        assert_eq!(config.max_workers(), 3);
        assert_eq!(config.idle_sleep(), Duration::from_millis(10));
        assert_eq!(config.manager_backoff(), Duration::from_millis(1));
        assert_eq!(config.shutdown_join_timeout(), None);
        assert_eq!(config.queue_capacity(), None);
    }
}
