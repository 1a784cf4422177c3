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

//! The worker loop: draining queues by capability, dispatching to external
//! operations, and — for worker #0 — scanning trees for merge candidates.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use tracing::{debug, error, info};

use crate::{
    collaborator::{Collaborator, DispatchResult, Isolation, select_flush_chunk},
    id::{TreeId, WorkerId},
    kind::{WorkKind, WorkKindMask},
    metrics::{ACTIVE_WORKERS, DISPATCH_ERRORS, DISPATCH_TOTAL, MANAGER_MERGES_ENQUEUED, WORKER_STARTED, WORKER_STOPPED},
    queue::QueueSet,
    unit::WorkUnit,
};

const fn kind_label(kind: WorkKind) -> &'static str {
    match kind {
        WorkKind::Switch => "switch",
        WorkKind::Flush => "flush",
        WorkKind::Bloom => "bloom",
        WorkKind::Merge => "merge",
    }
}

/// Whether a worker is an ordinary capability-driven drainer or the
/// Manager Thread, which additionally scans trees every iteration.
pub(crate) enum WorkerRole {
    Worker,
    ManagerThread { manager_backoff: Duration },
}

/// A single worker thread's identity, capabilities, and shared handles.
///
/// Constructed and spawned by [`Manager`](crate::manager::Manager); never
/// constructed directly by callers.
pub(crate) struct Worker {
    id:           WorkerId,
    capabilities: WorkKindMask,
    role:         WorkerRole,
    queues:       Arc<QueueSet>,
    collaborator: Arc<dyn Collaborator>,
    running:      Arc<AtomicBool>,
    worker_count: Arc<AtomicUsize>,
    idle_sleep:   Duration,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: WorkerId,
        capabilities: WorkKindMask,
        role: WorkerRole,
        queues: Arc<QueueSet>,
        collaborator: Arc<dyn Collaborator>,
        running: Arc<AtomicBool>,
        worker_count: Arc<AtomicUsize>,
        idle_sleep: Duration,
    ) -> Self {
        Self {
            id,
            capabilities,
            role,
            queues,
            collaborator,
            running,
            worker_count,
            idle_sleep,
        }
    }

    /// Run the worker loop until the shutdown flag clears. Blocking; meant
    /// to be the entry point of a dedicated OS thread.
    pub(crate) fn run(self) {
        let worker_label = self.id.to_string();
        info!(worker_id = %self.id, capabilities = ?self.capabilities, "worker starting");
        let session = self.collaborator.open_session(Isolation::ReadUncommitted);
        WORKER_STARTED.with_label_values(&[&worker_label]).inc();
        ACTIVE_WORKERS.inc();

        info!(worker_id = %self.id, "worker running");
        while self.running.load(Ordering::Acquire) {
            match &self.role {
                WorkerRole::Worker => self.worker_iteration(),
                WorkerRole::ManagerThread { manager_backoff } => {
                    self.manager_thread_iteration(*manager_backoff);
                }
            }
        }

        debug!(worker_id = %self.id, "worker draining");
        self.collaborator.close_session(session);
        self.worker_count.fetch_sub(1, Ordering::AcqRel);
        ACTIVE_WORKERS.dec();
        WORKER_STOPPED.with_label_values(&[&worker_label]).inc();
        info!(worker_id = %self.id, "worker exited");
    }

    /// One iteration of the §4.2 priority order: drain all Switch units,
    /// then at most one App unit, then at most one Manager-queue unit —
    /// each gated by whether this worker's capability mask covers it.
    fn worker_iteration(&self) {
        if self.collaborator.open_trees().is_empty() {
            thread::sleep(self.idle_sleep);
            return;
        }

        if self.capabilities.contains(WorkKindMask::SWITCH) {
            while let Some(unit) = self.queues.switch.pop_matching(WorkKindMask::SWITCH) {
                self.dispatch(unit);
            }
        }

        let app_filter = self.capabilities & (WorkKindMask::FLUSH | WorkKindMask::BLOOM);
        if !app_filter.is_empty()
            && let Some(unit) = self.queues.app.pop_matching(app_filter)
        {
            self.dispatch(unit);
        }

        if self.capabilities.contains(WorkKindMask::MERGE)
            && let Some(unit) = self.queues.manager.pop_matching(WorkKindMask::MERGE)
        {
            self.dispatch(unit);
        }
    }

    /// One iteration of the Manager Thread: the tree-inspection pass plus
    /// its own Merge dispatch, followed by the §4.3 backoff rule.
    fn manager_thread_iteration(&self, manager_backoff: Duration) {
        let trees = self.collaborator.open_trees();
        if trees.is_empty() {
            thread::sleep(self.idle_sleep);
            return;
        }

        let enqueued = self.inspection_pass(&trees);

        if self.capabilities.contains(WorkKindMask::MERGE)
            && let Some(unit) = self.queues.manager.pop_matching(WorkKindMask::MERGE)
        {
            self.dispatch(unit);
        }

        if enqueued == 0 {
            thread::sleep(manager_backoff);
        }
    }

    /// Walk every open tree and enqueue a Merge unit for each one whose
    /// shape indicates merging is due. Returns the number enqueued.
    fn inspection_pass(&self, trees: &[TreeId]) -> usize {
        let mut enqueued = 0;
        for &tree in trees {
            let shape = self.collaborator.shape(tree);
            if shape.nchunks > 1 && shape.merge_throttle > 0 {
                match self.queues.manager.push(WorkUnit::new(WorkKind::Merge, tree)) {
                    Ok(()) => {
                        enqueued += 1;
                        MANAGER_MERGES_ENQUEUED.inc();
                    }
                    Err(err) => {
                        error!(tree = %tree, error = %err, "manager thread failed to enqueue merge unit");
                    }
                }
            }
        }
        debug!(trees_scanned = trees.len(), merges_enqueued = enqueued, "inspection pass complete");
        enqueued
    }

    /// Invoke the external operation matching `unit`'s kind. Errors are
    /// logged and swallowed — a single failed dispatch must never end the
    /// worker.
    fn dispatch(&self, unit: WorkUnit) {
        let tree = unit.tree();
        let kind = unit.kind();
        let worker_label = self.id.to_string();
        DISPATCH_TOTAL.with_label_values(&[&worker_label, kind_label(kind)]).inc();

        let result = match kind {
            WorkKind::Switch => self.collaborator.tree_switch(tree),
            WorkKind::Flush => self.dispatch_flush(tree),
            WorkKind::Bloom => self.dispatch_bloom(tree),
            WorkKind::Merge => self.collaborator.merge(tree, self.id),
        };

        if let Err(err) = result {
            DISPATCH_ERRORS.with_label_values(&[&worker_label, kind_label(kind)]).inc();
            error!(
                worker_id = %self.id,
                tree = %tree,
                kind = kind_label(kind),
                error = %err,
                "dispatch failed, continuing"
            );
        }
    }

    fn dispatch_flush(&self, tree: TreeId) -> DispatchResult<()> {
        match select_flush_chunk(self.collaborator.as_ref(), tree) {
            Some(chunk) => {
                let result = self.collaborator.checkpoint_chunk(tree, chunk);
                self.collaborator.unpin_chunk(tree, chunk);
                result
            }
            None => Ok(()),
        }
    }

    fn dispatch_bloom(&self, tree: TreeId) -> DispatchResult<()> {
        match select_flush_chunk(self.collaborator.as_ref(), tree) {
            Some(chunk) => {
                let result = self.collaborator.bloom_build(tree, chunk);
                self.collaborator.unpin_chunk(tree, chunk);
                result
            }
            None => Ok(()),
        }
    }
}
