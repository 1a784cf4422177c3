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

//! The unit of dispatchable work.

use crate::{id::TreeId, kind::WorkKind};

/// One pending task: a kind, plus the tree it targets.
///
/// A `WorkUnit` lives in exactly one [`Queue`](crate::queue::Queue) at a
/// time. It is allocated by the pusher, owned by the queue while enqueued,
/// handed to exactly one worker on pop, and dropped once that worker has
/// dispatched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkUnit {
    kind: WorkKind,
    tree: TreeId,
}

impl WorkUnit {
    #[must_use]
    pub const fn new(kind: WorkKind, tree: TreeId) -> Self { Self { kind, tree } }

    #[must_use]
    pub const fn kind(&self) -> WorkKind { self.kind }

    #[must_use]
    pub const fn tree(&self) -> TreeId { self.tree }
}
