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

//! Identifiers for workers and trees.

use derive_more::{Debug, Display};

/// Numeric identifier for a worker, stable for the worker's lifetime.
///
/// Worker #0 is always the Manager Thread. Ids are handed out by the
/// [`Manager`](crate::manager::Manager) in spawn order and are never reused
/// while the manager is alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[debug("WorkerId({_0})")]
#[display("{_0}")]
pub struct WorkerId(u32);

impl WorkerId {
    pub(crate) const fn new(raw: u32) -> Self { Self(raw) }

    #[must_use]
    pub const fn as_u32(&self) -> u32 { self.0 }
}

/// Stable handle for an LSM tree the manager knows about.
///
/// The tree itself is owned by the engine; the core never holds more than
/// this id plus whatever the [`Collaborator`](crate::collaborator::Collaborator)
/// hands back for it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[debug("TreeId({_0})")]
#[display("{_0}")]
pub struct TreeId(u64);

impl TreeId {
    #[must_use]
    pub const fn new(raw: u64) -> Self { Self(raw) }

    #[must_use]
    pub const fn as_u64(&self) -> u64 { self.0 }
}
