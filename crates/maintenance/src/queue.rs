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

//! The three admitted-kind FIFOs workers drain from.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use crate::{
    error::{QueueError, QueueFullSnafu},
    kind::WorkKindMask,
    metrics::QUEUE_DEPTH,
    unit::WorkUnit,
};

/// A single FIFO admitting a fixed subset of [`WorkKind`](crate::kind::WorkKind)s.
///
/// `push` and `pop_matching` each take the internal lock for the duration of
/// a single list manipulation and release it before returning; no caller
/// ever observes the lock held across anything but a `VecDeque` splice.
///
/// The three queues in a [`QueueSet`] differ only in the `admits` mask they
/// were constructed with and the filter their callers pass to
/// [`pop_matching`](Self::pop_matching) — the admission and pop mechanics
/// below are identical for all three, which is why a single type models
/// Switch, App, and Manager alike.
pub struct Queue {
    name:     &'static str,
    admits:   WorkKindMask,
    capacity: Option<usize>,
    // Mirrors `items.len()` so emptiness can be checked without taking the
    // lock; `pop_matching` rechecks under the lock before acting on it.
    len:      AtomicUsize,
    items:    Mutex<VecDeque<WorkUnit>>,
}

impl Queue {
    #[must_use]
    pub fn new(name: &'static str, admits: WorkKindMask, capacity: Option<usize>) -> Self {
        Self {
            name,
            admits,
            capacity,
            len: AtomicUsize::new(0),
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue name, for diagnostics and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    /// Push a unit onto the tail of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the queue has a configured capacity and is
    /// already full. Never partially enqueues.
    ///
    /// # Panics (debug only)
    ///
    /// Panics in debug builds if `unit`'s kind is not in this queue's
    /// admitted set — pushing a Bloom unit onto the Switch queue is a bug in
    /// the caller, not a runtime condition to recover from.
    pub fn push(&self, unit: WorkUnit) -> Result<(), QueueError> {
        debug_assert!(
            self.admits.admits(unit.kind()),
            "queue {} does not admit {:?}",
            self.name,
            unit.kind()
        );

        let mut items = self.items.lock();
        if let Some(capacity) = self.capacity
            && items.len() >= capacity
        {
            return Err(QueueFullSnafu { name: self.name }.build());
        }
        items.push_back(unit);
        let new_len = items.len();
        drop(items);

        self.len.fetch_add(1, Ordering::Release);
        QUEUE_DEPTH.with_label_values(&[self.name]).set(new_len as i64);
        Ok(())
    }

    /// Pop the head unit if its kind intersects `filter`; otherwise the head
    /// (if any) is left in place and `None` is returned.
    ///
    /// For the Switch queue callers pass `WorkKindMask::SWITCH`, which every
    /// resident unit satisfies by construction, giving the "pop
    /// unconditionally" behavior the Switch queue needs. For the Manager
    /// queue callers pass `WorkKindMask::MERGE`. For the App queue callers
    /// pass whatever subset of Flush/Bloom the calling worker services.
    pub fn pop_matching(&self, filter: WorkKindMask) -> Option<WorkUnit> {
        // Fast path: skip the lock entirely when we're confident the queue
        // is empty. A racing pusher may invalidate this immediately after
        // we read it, which is fine — we just take the slow path next time.
        if self.len.load(Ordering::Acquire) == 0 {
            return None;
        }

        let mut items = self.items.lock();
        // Double-checked: the fast-path read above is advisory only.
        let head_matches = items.front().is_some_and(|u| filter.admits(u.kind()));
        if !head_matches {
            return None;
        }
        let unit = items.pop_front();
        let new_len = items.len();
        drop(items);

        if unit.is_some() {
            self.len.fetch_sub(1, Ordering::Release);
        }
        QUEUE_DEPTH.with_label_values(&[self.name]).set(new_len as i64);
        unit
    }

    /// Whether the queue currently holds no units. Racy by nature; intended
    /// for diagnostics and the idle check in the worker loop, not for
    /// correctness decisions.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len.load(Ordering::Acquire) == 0 }

    /// Drain and drop every unit still queued. Used during manager shutdown
    /// so no unit is silently leaked when the engine exits with a non-empty
    /// queue.
    pub fn drain(&self) -> usize {
        let mut items = self.items.lock();
        let drained = items.len();
        items.clear();
        drop(items);
        self.len.store(0, Ordering::Release);
        QUEUE_DEPTH.with_label_values(&[self.name]).set(0);
        drained
    }
}

/// The trio of queues a [`Manager`](crate::manager::Manager) owns.
pub struct QueueSet {
    pub switch:  Queue,
    pub app:     Queue,
    pub manager: Queue,
}

impl QueueSet {
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            switch:  Queue::new("switch", WorkKindMask::SWITCH, capacity),
            app:     Queue::new("app", WorkKindMask::FLUSH | WorkKindMask::BLOOM, capacity),
            manager: Queue::new("manager", WorkKindMask::MERGE, capacity),
        }
    }

    /// Drain all three queues, returning the total number of units dropped.
    pub fn drain_all(&self) -> usize {
        self.switch.drain() + self.app.drain() + self.manager.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{id::TreeId, kind::WorkKind};

    fn unit(kind: WorkKind) -> WorkUnit { WorkUnit::new(kind, TreeId::new(1)) }

    #[test]
    fn fifo_order_preserved() {
        let q = Queue::new("switch", WorkKindMask::SWITCH, None);
        q.push(unit(WorkKind::Switch)).unwrap();
        q.push(unit(WorkKind::Switch)).unwrap();
        q.push(unit(WorkKind::Switch)).unwrap();

        let first = q.pop_matching(WorkKindMask::SWITCH).unwrap();
        let second = q.pop_matching(WorkKindMask::SWITCH).unwrap();
        let third = q.pop_matching(WorkKindMask::SWITCH).unwrap();

        assert_eq!(first.tree(), unit(WorkKind::Switch).tree());
        assert_eq!(second.kind(), WorkKind::Switch);
        assert_eq!(third.kind(), WorkKind::Switch);
        assert!(q.is_empty());
    }

    #[test]
    fn non_matching_filter_leaves_head_in_place() {
        let q = Queue::new("manager", WorkKindMask::MERGE, None);
        q.push(unit(WorkKind::Merge)).unwrap();

        assert!(q.pop_matching(WorkKindMask::SWITCH).is_none());
        assert!(!q.is_empty());
        assert!(q.pop_matching(WorkKindMask::MERGE).is_some());
    }

    #[test]
    fn app_queue_pops_on_any_intersecting_bit() {
        let q = Queue::new("app", WorkKindMask::FLUSH | WorkKindMask::BLOOM, None);
        q.push(unit(WorkKind::Bloom)).unwrap();

        assert!(q.pop_matching(WorkKindMask::FLUSH).is_none());
        assert!(q
            .pop_matching(WorkKindMask::FLUSH | WorkKindMask::BLOOM)
            .is_some());
    }

    #[test]
    fn capacity_limit_rejects_push() {
        let q = Queue::new("switch", WorkKindMask::SWITCH, Some(1));
        q.push(unit(WorkKind::Switch)).unwrap();
        assert!(q.push(unit(WorkKind::Switch)).is_err());
    }

    #[test]
    fn drain_empties_and_counts() {
        let set = QueueSet::new(None);
        set.switch.push(unit(WorkKind::Switch)).unwrap();
        set.app.push(unit(WorkKind::Flush)).unwrap();
        set.manager.push(unit(WorkKind::Merge)).unwrap();

        assert_eq!(set.drain_all(), 3);
        assert!(set.switch.is_empty());
        assert!(set.app.is_empty());
        assert!(set.manager.is_empty());
    }
}
