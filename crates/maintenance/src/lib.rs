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

//! Background maintenance worker pool for a log-structured-merge storage
//! engine.
//!
//! This crate owns the pool of worker threads that keep an LSM tree
//! healthy: switching the active chunk, flushing sealed chunks to disk
//! (optionally building their Bloom filters), and merging on-disk chunks
//! into larger ones. It owns the work-queue discipline that dispatches
//! those activities fairly and safely, but not the operations themselves —
//! those are supplied by the embedder through the [`Collaborator`] trait.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lsmforge_maintenance::{Manager, ManagerConfig, default_topology};
//! # use lsmforge_maintenance::{Collaborator, DispatchResult, TreeId, ChunkIndex,
//! #     ChunkState, LockMode, Isolation, SessionId, TreeShape, WorkerId};
//! # struct FakeCollaborator;
//! # impl Collaborator for FakeCollaborator {
//! #     fn open_trees(&self) -> Vec<TreeId> { vec![] }
//! #     fn shape(&self, _: TreeId) -> TreeShape { TreeShape { nchunks: 0, merge_throttle: 0 } }
//! #     fn chunks(&self, _: TreeId) -> Vec<ChunkState> { vec![] }
//! #     fn pin_chunk(&self, _: TreeId, _: ChunkIndex) {}
//! #     fn unpin_chunk(&self, _: TreeId, _: ChunkIndex) {}
//! #     fn tree_lock(&self, _: TreeId, _: LockMode) {}
//! #     fn tree_unlock(&self, _: TreeId) {}
//! #     fn tree_switch(&self, _: TreeId) -> DispatchResult<()> { Ok(()) }
//! #     fn checkpoint_chunk(&self, _: TreeId, _: ChunkIndex) -> DispatchResult<()> { Ok(()) }
//! #     fn merge(&self, _: TreeId, _: WorkerId) -> DispatchResult<()> { Ok(()) }
//! #     fn bloom_build(&self, _: TreeId, _: ChunkIndex) -> DispatchResult<()> { Ok(()) }
//! #     fn open_session(&self, _: Isolation) -> SessionId { SessionId::new(0) }
//! #     fn close_session(&self, _: SessionId) {}
//! # }
//!
//! let config = ManagerConfig::builder().build();
//! let collaborator: Arc<dyn Collaborator> = Arc::new(FakeCollaborator);
//! let mut manager = Manager::start(&config, collaborator, default_topology()).unwrap();
//!
//! assert_eq!(manager.worker_count(), manager.max_workers());
//! manager.shutdown();
//! ```
//!
//! # Architecture
//!
//! - [`WorkKind`] / [`WorkKindMask`]: the tag a unit carries, and the
//!   bitmask used everywhere a *set* of kinds is needed instead.
//! - [`WorkUnit`]: one pending task.
//! - [`Queue`] / [`QueueSet`]: the three admitted-kind FIFOs.
//! - [`Collaborator`]: the external operations the core invokes but never
//!   implements.
//! - [`Manager`]: owns the queue set and the worker registry for one
//!   storage-engine connection.

mod collaborator;
mod config;
mod error;
mod id;
mod kind;
mod manager;
mod metrics;
mod queue;
mod unit;
mod worker;

pub use collaborator::{
    ChunkIndex, ChunkState, Collaborator, DispatchError, DispatchResult, Isolation, LockMode,
    SessionId, TreeShape, select_flush_chunk,
};
pub use config::ManagerConfig;
pub use error::{QueueError, StartupError};
pub use id::{TreeId, WorkerId};
pub use kind::{WorkKind, WorkKindMask};
pub use manager::{Manager, WorkerSpec, default_topology};
pub use queue::{Queue, QueueSet};
pub use unit::WorkUnit;
