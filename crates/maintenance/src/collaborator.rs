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

//! Everything the core treats as an external collaborator: the tree store,
//! the checkpoint/merge/bloom operations, and session management.
//!
//! The core never implements any of these — it only calls them. Production
//! code wires a real storage-engine adapter; tests wire an in-memory fake
//! that records every call.

use std::fmt;

use crate::id::TreeId;

/// Error returned by a dispatch-time external operation.
///
/// Opaque on purpose: the core's only obligation on a dispatch error is to
/// log it and move on (see the worker loop's error policy), so it never
/// needs to inspect the error's shape.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a dispatch-time external operation.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Advisory lock mode requested on a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Session isolation level. The core only ever opens sessions with
/// `ReadUncommitted`, since background work only ever touches sealed,
/// read-only chunks and caching uncommitted updates would be wasted effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    #[default]
    ReadUncommitted,
}

/// Opaque handle to a per-worker session, opened once at worker startup and
/// closed once at worker shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self { Self(raw) }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "session#{}", self.0) }
}

/// Index of a chunk within a tree's chunk array, in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkIndex(usize);

impl ChunkIndex {
    #[must_use]
    pub const fn new(raw: usize) -> Self { Self(raw) }

    #[must_use]
    pub const fn as_usize(&self) -> usize { self.0 }
}

/// What the Manager Thread's inspection pass needs to know about one chunk,
/// in the order the chunk appears in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkState {
    pub on_disk:   bool,
    /// Whether this is the tree's currently-mutable chunk. Exactly one
    /// chunk in a tree is primary, and it is always the last one.
    pub is_primary: bool,
}

/// Shape of a tree, as consulted by the Manager Thread's inspection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    pub nchunks:       usize,
    pub merge_throttle: u32,
}

/// The complete set of external operations the core depends on (§6).
///
/// One trait, not several, because the spec presents these as a single
/// cohesive boundary: tree synchronization primitives, the three
/// maintenance operations, session management, and the tree directory the
/// Manager Thread walks.
pub trait Collaborator: Send + Sync {
    /// List of currently open trees, consulted by the Manager Thread's
    /// inspection pass every iteration.
    fn open_trees(&self) -> Vec<TreeId>;

    /// `nchunks` / `merge_throttle` for one tree.
    fn shape(&self, tree: TreeId) -> TreeShape;

    /// On-disk/primary state of every chunk in a tree, in order.
    fn chunks(&self, tree: TreeId) -> Vec<ChunkState>;

    /// Atomically increment a chunk's reference count. Called while the
    /// tree lock is held, before it is released.
    fn pin_chunk(&self, tree: TreeId, chunk: ChunkIndex);

    /// Atomically decrement a chunk's reference count once its flush has
    /// completed (or failed).
    fn unpin_chunk(&self, tree: TreeId, chunk: ChunkIndex);

    /// Advisory mutual exclusion on tree metadata.
    fn tree_lock(&self, tree: TreeId, mode: LockMode);

    /// Release a lock taken via [`tree_lock`](Self::tree_lock).
    fn tree_unlock(&self, tree: TreeId);

    /// Seal the active chunk and begin a new one. Invoked per Switch unit.
    fn tree_switch(&self, tree: TreeId) -> DispatchResult<()>;

    /// Write a chunk to disk. Invoked per Flush unit.
    fn checkpoint_chunk(&self, tree: TreeId, chunk: ChunkIndex) -> DispatchResult<()>;

    /// Perform one merge step. Invoked per Merge unit.
    fn merge(&self, tree: TreeId, worker: crate::id::WorkerId) -> DispatchResult<()>;

    /// Construct a Bloom filter for a flushed chunk. Invoked per Bloom unit.
    fn bloom_build(&self, tree: TreeId, chunk: ChunkIndex) -> DispatchResult<()>;

    /// Acquire a per-worker session.
    fn open_session(&self, isolation: Isolation) -> SessionId;

    /// Release a session opened via [`open_session`](Self::open_session).
    fn close_session(&self, session: SessionId);
}

/// Select the chunk a Flush unit should pin, following the exact sequence
/// the spec describes: lock, scan for the first chunk not yet on disk,
/// assert it is not the primary, pin it, unlock.
///
/// Returns `None` when every chunk is already on disk — there is simply
/// nothing to flush, which is not an error.
///
/// # Panics
///
/// Panics if the only candidate chunk is the primary (active) chunk. This
/// is the spec's one asserted invariant violation in the flush path: the
/// caller asked for a chunk to flush on a tree that has nothing sealed yet.
pub fn select_flush_chunk(
    collaborator: &dyn Collaborator,
    tree: TreeId,
) -> Option<ChunkIndex> {
    collaborator.tree_lock(tree, LockMode::Exclusive);
    let chunks = collaborator.chunks(tree);
    let candidate = chunks.iter().position(|chunk| !chunk.on_disk);

    let selected = candidate.map(|idx| {
        assert!(
            !chunks[idx].is_primary,
            "flush target for {tree} is the primary chunk"
        );
        let chunk = ChunkIndex::new(idx);
        collaborator.pin_chunk(tree, chunk);
        chunk
    });
    collaborator.tree_unlock(tree);
    selected
}
