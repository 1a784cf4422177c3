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

//! The kinds of maintenance work and the masks used to describe sets of them.
//!
//! [`WorkKind`] is the tag carried by a single [`WorkUnit`](crate::unit::WorkUnit);
//! it is a plain four-way enum, not a bitmask, so a unit is never ambiguous
//! about what it is. [`WorkKindMask`] is the bitmask type used everywhere a
//! *set* of kinds is needed instead: worker capabilities and the filter a
//! caller passes to the App queue's pop.

use bitflags::bitflags;

/// What a single work unit asks a worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// Seal the active chunk and begin a new one.
    Switch,
    /// Write a sealed chunk to disk.
    Flush,
    /// Build a Bloom filter for a flushed chunk.
    Bloom,
    /// Combine on-disk chunks into a larger one.
    Merge,
}

impl WorkKind {
    /// The single-bit mask corresponding to this kind.
    #[must_use]
    pub const fn mask(self) -> WorkKindMask {
        match self {
            Self::Switch => WorkKindMask::SWITCH,
            Self::Flush => WorkKindMask::FLUSH,
            Self::Bloom => WorkKindMask::BLOOM,
            Self::Merge => WorkKindMask::MERGE,
        }
    }
}

bitflags! {
    /// A set of [`WorkKind`]s: a worker's capability mask, or the filter
    /// passed to a queue's pop operation.
    ///
    /// Never stored on a [`WorkUnit`](crate::unit::WorkUnit) itself — only
    /// the tagged [`WorkKind`] is. Keeping the two types distinct is what
    /// makes it impossible to accidentally compare a unit's kind bit-wise
    /// where an equality check was meant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WorkKindMask: u8 {
        const SWITCH = 0b0001;
        const FLUSH  = 0b0010;
        const BLOOM  = 0b0100;
        const MERGE  = 0b1000;
    }
}

impl WorkKindMask {
    /// All four kinds, the omnivorous worker's default capability set.
    pub const ALL: Self = Self::all();

    /// Whether this mask would service a unit of the given kind.
    #[must_use]
    pub const fn admits(self, kind: WorkKind) -> bool { self.contains(kind.mask()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_admits_only_its_own_kind() {
        let switch_only = WorkKindMask::SWITCH;
        assert!(switch_only.admits(WorkKind::Switch));
        assert!(!switch_only.admits(WorkKind::Flush));
        assert!(!switch_only.admits(WorkKind::Bloom));
        assert!(!switch_only.admits(WorkKind::Merge));
    }

    #[test]
    fn combined_mask_admits_each_constituent() {
        let app = WorkKindMask::FLUSH | WorkKindMask::BLOOM;
        assert!(app.admits(WorkKind::Flush));
        assert!(app.admits(WorkKind::Bloom));
        assert!(!app.admits(WorkKind::Switch));
        assert!(!app.admits(WorkKind::Merge));
    }

    #[test]
    fn all_covers_every_kind() {
        for kind in [WorkKind::Switch, WorkKind::Flush, WorkKind::Bloom, WorkKind::Merge] {
            assert!(WorkKindMask::ALL.admits(kind));
        }
    }
}
