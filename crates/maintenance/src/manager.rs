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

//! The owning container: the queue set, the worker registry, and the
//! startup/shutdown sequence that brings the pool up and tears it down.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::info;

use crate::{
    collaborator::Collaborator,
    config::ManagerConfig,
    error::{StartupError, ThreadSpawnSnafu, TooFewWorkersSnafu, UncoveredCapabilitySnafu},
    id::WorkerId,
    kind::WorkKindMask,
    metrics::ACTIVE_WORKERS,
    queue::QueueSet,
    worker::{Worker, WorkerRole},
};
use snafu::ResultExt;

/// One entry in a worker topology: the capability mask a spawned worker
/// will service, and a name used for its OS thread and diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSpec {
    pub name:         &'static str,
    pub capabilities: WorkKindMask,
}

impl WorkerSpec {
    #[must_use]
    pub const fn new(name: &'static str, capabilities: WorkKindMask) -> Self {
        Self { name, capabilities }
    }
}

/// The source's topology: the Manager Thread services Merge, a dedicated
/// worker services Switch only, and a single omnivorous worker covers
/// everything. Exposed as the default so callers who don't care about
/// topology get the source's exact behavior (§9 open question: worker
/// composition).
#[must_use]
pub fn default_topology() -> Vec<WorkerSpec> {
    vec![
        WorkerSpec::new("switch", WorkKindMask::SWITCH),
        WorkerSpec::new(
            "general",
            WorkKindMask::SWITCH | WorkKindMask::FLUSH | WorkKindMask::BLOOM | WorkKindMask::MERGE,
        ),
    ]
}

/// Owns the queue set and the worker registry for one storage-engine
/// connection.
///
/// The Manager Thread itself (worker #0, capability {Merge}) is always
/// present and is not part of the caller-supplied topology — it is spawned
/// by [`Manager::start`] alongside whatever [`WorkerSpec`]s the caller asks
/// for.
pub struct Manager {
    queues:               Arc<QueueSet>,
    running:              Arc<AtomicBool>,
    worker_count:         Arc<AtomicUsize>,
    max_workers:          usize,
    handles:              Vec<JoinHandle<()>>,
    shutdown_join_timeout: Option<Duration>,
}

impl Manager {
    /// Bring the manager up: create the queues, spawn the Manager Thread
    /// plus every worker in `topology`, in that order (§4.3's startup
    /// ordering).
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if `config.max_workers()` is below the
    /// required floor of 3, if `topology` does not cover every `WorkKind`
    /// with at least one worker, or if any worker thread fails to spawn. On
    /// error, any threads already spawned are asked to shut down and
    /// joined before the error is returned — no partially constructed
    /// manager is ever handed to the caller.
    pub fn start(
        config: &ManagerConfig,
        collaborator: Arc<dyn Collaborator>,
        topology: Vec<WorkerSpec>,
    ) -> Result<Self, StartupError> {
        let max_workers = config.max_workers();
        if max_workers < 3 {
            return TooFewWorkersSnafu { max_workers }.fail();
        }

        let mut covered = WorkKindMask::MERGE; // the Manager Thread always covers Merge.
        for spec in &topology {
            covered |= spec.capabilities;
        }
        for kind in [
            crate::kind::WorkKind::Switch,
            crate::kind::WorkKind::Flush,
            crate::kind::WorkKind::Bloom,
            crate::kind::WorkKind::Merge,
        ] {
            if !covered.admits(kind) {
                return UncoveredCapabilitySnafu { kind }.fail();
            }
        }

        let queues = Arc::new(QueueSet::new(config.queue_capacity()));
        let running = Arc::new(AtomicBool::new(true));
        let worker_count = Arc::new(AtomicUsize::new(0));

        let mut manager = Self {
            queues,
            running,
            worker_count,
            max_workers,
            handles: Vec::with_capacity(topology.len() + 1),
            shutdown_join_timeout: config.shutdown_join_timeout(),
        };

        if let Err(err) = manager.spawn(
            WorkerId::new(0),
            "manager-thread",
            WorkerRole::ManagerThread {
                manager_backoff: config.manager_backoff(),
            },
            WorkKindMask::MERGE,
            collaborator.clone(),
            config.idle_sleep(),
        ) {
            manager.shutdown();
            return Err(err);
        }

        for (offset, spec) in topology.into_iter().enumerate() {
            let id = WorkerId::new(u32::try_from(offset + 1).unwrap_or(u32::MAX));
            if let Err(err) = manager.spawn(
                id,
                spec.name,
                WorkerRole::Worker,
                spec.capabilities,
                collaborator.clone(),
                config.idle_sleep(),
            ) {
                manager.shutdown();
                return Err(err);
            }
        }

        info!(workers = manager.handles.len(), "manager started");
        Ok(manager)
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn(
        &mut self,
        id: WorkerId,
        name: &'static str,
        role: WorkerRole,
        capabilities: WorkKindMask,
        collaborator: Arc<dyn Collaborator>,
        idle_sleep: std::time::Duration,
    ) -> Result<(), StartupError> {
        let worker = Worker::new(
            id,
            capabilities,
            role,
            self.queues.clone(),
            collaborator,
            self.running.clone(),
            self.worker_count.clone(),
            idle_sleep,
        );

        // Incremented here, under the spawning thread, before the worker
        // runs; decremented by the worker itself just before it exits.
        self.worker_count.fetch_add(1, Ordering::AcqRel);
        let worker_count = self.worker_count.clone();

        let spawned = thread::Builder::new()
            .name(format!("lsm-{name}-{id}"))
            .spawn(move || worker.run())
            .context(ThreadSpawnSnafu { worker: name });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                worker_count.fetch_sub(1, Ordering::AcqRel);
                return Err(err);
            }
        };

        self.handles.push(handle);
        Ok(())
    }

    /// Number of worker threads the manager was configured to run,
    /// including the Manager Thread.
    #[must_use]
    pub const fn max_workers(&self) -> usize { self.max_workers }

    /// Number of live worker threads right now. Racy by nature — intended
    /// for diagnostics, not for correctness decisions.
    #[must_use]
    pub fn worker_count(&self) -> usize { self.worker_count.load(Ordering::Acquire) }

    /// Push a unit onto the Switch queue. Used by foreground writers.
    pub fn push_switch(&self, tree: crate::id::TreeId) -> Result<(), crate::error::QueueError> {
        self.queues
            .switch
            .push(crate::unit::WorkUnit::new(crate::kind::WorkKind::Switch, tree))
    }

    /// Push a Flush or Bloom unit onto the App queue. Used by foreground
    /// callers (e.g. a write path that just sealed a chunk).
    pub fn push_app(
        &self,
        kind: crate::kind::WorkKind,
        tree: crate::id::TreeId,
    ) -> Result<(), crate::error::QueueError> {
        debug_assert!(
            matches!(kind, crate::kind::WorkKind::Flush | crate::kind::WorkKind::Bloom),
            "App queue only admits Flush and Bloom units"
        );
        self.queues.app.push(crate::unit::WorkUnit::new(kind, tree))
    }

    /// Flip the shutdown flag and wait for every worker to exit.
    ///
    /// Every worker observes the flag at the top of its next loop
    /// iteration (at most one idle-sleep interval away) and finishes any
    /// dispatch already in flight before exiting. With no
    /// `shutdown_join_timeout` configured (the default) this call blocks
    /// until all of them have, per §5's "no per-operation timeout". When a
    /// timeout is configured, join is bounded by it: any worker still
    /// running past the deadline is logged and left to exit on its own,
    /// detached from the manager. Either way, once joining stops the three
    /// queues are drained so no unit pushed but never dispatched is silently
    /// leaked (§9 open question: queue draining on shutdown).
    pub fn shutdown(&mut self) {
        info!("manager shutting down");
        self.running.store(false, Ordering::Release);

        match self.shutdown_join_timeout {
            Some(timeout) => self.join_with_timeout(timeout),
            None => self.join_all(),
        }

        let drained = self.queues.drain_all();
        if drained > 0 {
            tracing::warn!(drained, "dropped undispatched units during shutdown");
        }

        ACTIVE_WORKERS.set(0);
        info!("manager shutdown complete");
    }

    fn join_all(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked during shutdown");
            }
        }
    }

    /// Poll for completed workers until every handle has joined or
    /// `timeout` elapses, whichever comes first. `JoinHandle` has no native
    /// timed join, so completed workers are reaped with a short sleep
    /// between polls; any handle still outstanding at the deadline is
    /// dropped rather than joined, detaching its thread.
    fn join_with_timeout(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let mut pending = std::mem::take(&mut self.handles);

        while !pending.is_empty() && Instant::now() < deadline {
            let mut still_pending = Vec::with_capacity(pending.len());
            for handle in pending {
                if handle.is_finished() {
                    if handle.join().is_err() {
                        tracing::error!("worker thread panicked during shutdown");
                    }
                } else {
                    still_pending.push(handle);
                }
            }
            pending = still_pending;
            if !pending.is_empty() {
                thread::sleep(Duration::from_millis(5));
            }
        }

        if !pending.is_empty() {
            tracing::warn!(
                remaining = pending.len(),
                "shutdown join timeout elapsed, detaching remaining worker threads"
            );
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collaborator::{
        ChunkIndex, ChunkState, DispatchResult, Isolation, LockMode, SessionId, TreeShape,
    };

    struct EmptyCollaborator;

    impl Collaborator for EmptyCollaborator {
        fn open_trees(&self) -> Vec<crate::id::TreeId> { vec![] }

        fn shape(&self, _tree: crate::id::TreeId) -> TreeShape {
            TreeShape {
                nchunks:        0,
                merge_throttle: 0,
            }
        }

        fn chunks(&self, _tree: crate::id::TreeId) -> Vec<ChunkState> { vec![] }

        fn pin_chunk(&self, _tree: crate::id::TreeId, _chunk: ChunkIndex) {}

        fn unpin_chunk(&self, _tree: crate::id::TreeId, _chunk: ChunkIndex) {}

        fn tree_lock(&self, _tree: crate::id::TreeId, _mode: LockMode) {}

        fn tree_unlock(&self, _tree: crate::id::TreeId) {}

        fn tree_switch(&self, _tree: crate::id::TreeId) -> DispatchResult<()> { Ok(()) }

        fn checkpoint_chunk(
            &self,
            _tree: crate::id::TreeId,
            _chunk: ChunkIndex,
        ) -> DispatchResult<()> {
            Ok(())
        }

        fn merge(&self, _tree: crate::id::TreeId, _worker: WorkerId) -> DispatchResult<()> {
            Ok(())
        }

        fn bloom_build(&self, _tree: crate::id::TreeId, _chunk: ChunkIndex) -> DispatchResult<()> {
            Ok(())
        }

        fn open_session(&self, _isolation: Isolation) -> SessionId { SessionId::new(0) }

        fn close_session(&self, _session: SessionId) {}
    }

    #[test]
    fn rejects_too_few_workers() {
        let config = ManagerConfig::builder().max_workers(2).build();
        let err = Manager::start(&config, Arc::new(EmptyCollaborator), default_topology());
        assert!(matches!(err, Err(StartupError::TooFewWorkers { .. })));
    }

    #[test]
    fn rejects_topology_missing_a_kind() {
        let config = ManagerConfig::builder().build();
        let topology = vec![WorkerSpec::new("switch-only", WorkKindMask::SWITCH)];
        let err = Manager::start(&config, Arc::new(EmptyCollaborator), topology);
        assert!(matches!(
            err,
            Err(StartupError::UncoveredCapability { .. })
        ));
    }

    #[test]
    fn starts_and_shuts_down_with_default_topology() {
        let config = ManagerConfig::builder()
            .idle_sleep(Duration::from_millis(2))
            .build();
        let mut manager =
            Manager::start(&config, Arc::new(EmptyCollaborator), default_topology()).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(manager.worker_count(), manager.max_workers());

        manager.shutdown();
        assert_eq!(manager.worker_count(), 0);
    }

    struct HangingCollaborator;

    impl Collaborator for HangingCollaborator {
        fn open_trees(&self) -> Vec<crate::id::TreeId> { vec![crate::id::TreeId::new(0)] }

        fn shape(&self, _tree: crate::id::TreeId) -> TreeShape {
            TreeShape {
                nchunks:        0,
                merge_throttle: 0,
            }
        }

        fn chunks(&self, _tree: crate::id::TreeId) -> Vec<ChunkState> { vec![] }

        fn pin_chunk(&self, _tree: crate::id::TreeId, _chunk: ChunkIndex) {}

        fn unpin_chunk(&self, _tree: crate::id::TreeId, _chunk: ChunkIndex) {}

        fn tree_lock(&self, _tree: crate::id::TreeId, _mode: LockMode) {}

        fn tree_unlock(&self, _tree: crate::id::TreeId) {}

        fn tree_switch(&self, _tree: crate::id::TreeId) -> DispatchResult<()> {
            std::thread::sleep(Duration::from_secs(10));
            Ok(())
        }

        fn checkpoint_chunk(
            &self,
            _tree: crate::id::TreeId,
            _chunk: ChunkIndex,
        ) -> DispatchResult<()> {
            Ok(())
        }

        fn merge(&self, _tree: crate::id::TreeId, _worker: WorkerId) -> DispatchResult<()> {
            Ok(())
        }

        fn bloom_build(&self, _tree: crate::id::TreeId, _chunk: ChunkIndex) -> DispatchResult<()> {
            Ok(())
        }

        fn open_session(&self, _isolation: Isolation) -> SessionId { SessionId::new(0) }

        fn close_session(&self, _session: SessionId) {}
    }

    #[test]
    fn shutdown_honors_join_timeout_for_a_hanging_worker() {
        let config = ManagerConfig::builder()
            .idle_sleep(Duration::from_millis(2))
            .shutdown_join_timeout(Duration::from_millis(100))
            .build();
        let mut manager =
            Manager::start(&config, Arc::new(HangingCollaborator), default_topology()).unwrap();
        manager.push_switch(crate::id::TreeId::new(0)).unwrap();

        std::thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        manager.shutdown();
        let elapsed = start.elapsed();

        assert!(
            elapsed < Duration::from_millis(500),
            "shutdown took {elapsed:?}, expected to return near the 100ms join timeout"
        );
    }
}
