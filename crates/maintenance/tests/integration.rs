//! End-to-end scenarios E1-E6.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use lsmforge_maintenance::{
    ChunkIndex, ChunkState, Collaborator, DispatchResult, Isolation, LockMode, Manager,
    ManagerConfig, SessionId, TreeId, TreeShape, WorkKind, WorkerId, default_topology,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Switch(TreeId),
    Checkpoint(TreeId, ChunkIndex),
    Merge(TreeId, WorkerId),
    Bloom(TreeId, ChunkIndex),
}

struct TreeFixture {
    chunks:         Vec<ChunkState>,
    merge_throttle: u32,
}

struct FakeCollaborator {
    trees:        Mutex<HashMap<TreeId, TreeFixture>>,
    refcounts:    Mutex<HashMap<(TreeId, ChunkIndex), i64>>,
    calls:        Mutex<Vec<Call>>,
    fail_switch:  AtomicBool,
    next_session: AtomicU64,
}

impl FakeCollaborator {
    fn new() -> Self {
        Self {
            trees:        Mutex::new(HashMap::new()),
            refcounts:    Mutex::new(HashMap::new()),
            calls:        Mutex::new(Vec::new()),
            fail_switch:  AtomicBool::new(false),
            next_session: AtomicU64::new(1),
        }
    }

    fn register_tree(&self, id: TreeId, chunks: Vec<ChunkState>, merge_throttle: u32) {
        self.trees.lock().unwrap().insert(id, TreeFixture {
            chunks,
            merge_throttle,
        });
    }

    fn calls(&self) -> Vec<Call> { self.calls.lock().unwrap().clone() }

    fn refcount(&self, tree: TreeId, chunk: ChunkIndex) -> i64 {
        *self.refcounts.lock().unwrap().get(&(tree, chunk)).unwrap_or(&0)
    }
}

impl Collaborator for FakeCollaborator {
    fn open_trees(&self) -> Vec<TreeId> { self.trees.lock().unwrap().keys().copied().collect() }

    fn shape(&self, tree: TreeId) -> TreeShape {
        let trees = self.trees.lock().unwrap();
        let fixture = &trees[&tree];
        TreeShape {
            nchunks:        fixture.chunks.len(),
            merge_throttle: fixture.merge_throttle,
        }
    }

    fn chunks(&self, tree: TreeId) -> Vec<ChunkState> {
        self.trees.lock().unwrap()[&tree].chunks.clone()
    }

    fn pin_chunk(&self, tree: TreeId, chunk: ChunkIndex) {
        *self.refcounts.lock().unwrap().entry((tree, chunk)).or_insert(0) += 1;
    }

    fn unpin_chunk(&self, tree: TreeId, chunk: ChunkIndex) {
        *self.refcounts.lock().unwrap().entry((tree, chunk)).or_insert(0) -= 1;
    }

    fn tree_lock(&self, _tree: TreeId, _mode: LockMode) {}

    fn tree_unlock(&self, _tree: TreeId) {}

    fn tree_switch(&self, tree: TreeId) -> DispatchResult<()> {
        self.calls.lock().unwrap().push(Call::Switch(tree));
        if self.fail_switch.load(Ordering::Relaxed) {
            return Err("injected switch failure".into());
        }
        Ok(())
    }

    fn checkpoint_chunk(&self, tree: TreeId, chunk: ChunkIndex) -> DispatchResult<()> {
        self.calls.lock().unwrap().push(Call::Checkpoint(tree, chunk));
        Ok(())
    }

    fn merge(&self, tree: TreeId, worker: WorkerId) -> DispatchResult<()> {
        self.calls.lock().unwrap().push(Call::Merge(tree, worker));
        Ok(())
    }

    fn bloom_build(&self, tree: TreeId, chunk: ChunkIndex) -> DispatchResult<()> {
        self.calls.lock().unwrap().push(Call::Bloom(tree, chunk));
        Ok(())
    }

    fn open_session(&self, _isolation: Isolation) -> SessionId {
        SessionId::new(self.next_session.fetch_add(1, Ordering::Relaxed))
    }

    fn close_session(&self, _session: SessionId) {}
}

fn fast_config() -> ManagerConfig {
    ManagerConfig::builder()
        .idle_sleep(Duration::from_millis(2))
        .manager_backoff(Duration::from_millis(1))
        .build()
}

/// E1: three workers running and idle with no trees registered.
#[test]
fn e1_starts_three_idle_workers() {
    let collaborator = Arc::new(FakeCollaborator::new());
    let mut manager = Manager::start(&fast_config(), collaborator, default_topology()).unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(manager.worker_count(), 3);
    assert_eq!(manager.max_workers(), 3);

    manager.shutdown();
}

/// E2: a pushed Switch unit reaches `tree_switch` exactly once.
#[test]
fn e2_switch_unit_dispatches_to_tree_switch() {
    let collaborator = Arc::new(FakeCollaborator::new());
    let tree = TreeId::new(1);
    collaborator.register_tree(tree, vec![], 0);

    let mut manager =
        Manager::start(&fast_config(), collaborator.clone(), default_topology()).unwrap();
    manager.push_switch(tree).unwrap();

    thread::sleep(Duration::from_millis(50));
    let switch_calls: Vec<_> = collaborator
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Switch(_)))
        .collect();
    assert_eq!(switch_calls, vec![Call::Switch(tree)]);

    manager.shutdown();
}

/// E3: a throttled tree produces at least one Merge dispatch.
#[test]
fn e3_throttled_tree_produces_merge() {
    let collaborator = Arc::new(FakeCollaborator::new());
    let tree = TreeId::new(7);
    collaborator.register_tree(
        tree,
        vec![
            ChunkState { on_disk: true, is_primary: false },
            ChunkState { on_disk: true, is_primary: false },
            ChunkState { on_disk: true, is_primary: false },
            ChunkState { on_disk: true, is_primary: false },
            ChunkState { on_disk: false, is_primary: true },
        ],
        2,
    );

    let mut manager =
        Manager::start(&fast_config(), collaborator.clone(), default_topology()).unwrap();

    thread::sleep(Duration::from_millis(50));
    let merges = collaborator
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Merge(t, _) if *t == tree))
        .count();
    assert!(merges >= 1, "expected at least one merge dispatch, got {merges}");

    manager.shutdown();
}

/// E4: flushing a tree pins exactly the expected chunk once.
#[test]
fn e4_flush_pins_correct_chunk() {
    let collaborator = Arc::new(FakeCollaborator::new());
    let tree = TreeId::new(3);
    collaborator.register_tree(
        tree,
        vec![
            ChunkState { on_disk: true, is_primary: false },
            ChunkState { on_disk: false, is_primary: false },
            ChunkState { on_disk: false, is_primary: true },
        ],
        0,
    );

    let mut manager =
        Manager::start(&fast_config(), collaborator.clone(), default_topology()).unwrap();
    manager.push_app(WorkKind::Flush, tree).unwrap();

    thread::sleep(Duration::from_millis(50));

    let checkpoints: Vec<_> = collaborator
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Checkpoint(t, _) if *t == tree))
        .collect();
    assert_eq!(checkpoints, vec![Call::Checkpoint(tree, ChunkIndex::new(1))]);
    assert_eq!(
        collaborator.refcount(tree, ChunkIndex::new(1)),
        0,
        "pinned then unpinned once flush returned"
    );

    manager.shutdown();
}

/// E5: a failing external op is logged and swallowed, worker keeps running.
#[test]
fn e5_failed_dispatch_does_not_stop_the_worker() {
    let collaborator = Arc::new(FakeCollaborator::new());
    let tree = TreeId::new(9);
    collaborator.register_tree(tree, vec![], 0);
    collaborator.fail_switch.store(true, Ordering::Relaxed);

    let mut manager =
        Manager::start(&fast_config(), collaborator.clone(), default_topology()).unwrap();
    for _ in 0..5 {
        manager.push_switch(tree).unwrap();
    }

    thread::sleep(Duration::from_millis(80));

    let switch_calls = collaborator
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Switch(_)))
        .count();
    assert_eq!(switch_calls, 5);
    assert_eq!(manager.worker_count(), manager.max_workers(), "workers still running");

    manager.shutdown();
}

/// E6: 100 switches, shutdown mid-flight, no units are leaked and the pool
/// reaches zero live workers.
#[test]
fn e6_shutdown_mid_flight_completes_in_flight_dispatches() {
    let collaborator = Arc::new(FakeCollaborator::new());
    let tree = TreeId::new(11);
    collaborator.register_tree(tree, vec![], 0);

    let mut manager =
        Manager::start(&fast_config(), collaborator.clone(), default_topology()).unwrap();
    for _ in 0..100 {
        manager.push_switch(tree).unwrap();
    }

    thread::sleep(Duration::from_millis(10));
    manager.shutdown();

    let switch_calls = collaborator
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Switch(_)))
        .count();
    assert!(switch_calls <= 100);
    assert_eq!(manager.worker_count(), 0);
}
