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

//! Error taxonomy.
//!
//! Startup errors and queue errors are the only ones the core represents as
//! `Result`s. Dispatch errors come from the caller-supplied
//! [`Collaborator`](crate::collaborator::Collaborator) and are logged and
//! swallowed at the call site rather than modeled here. Invariant
//! violations are asserted, not returned.

use snafu::Snafu;

/// Errors surfaced while bringing a [`Manager`](crate::manager::Manager) up.
///
/// Any variant means startup failed as a whole; whatever was already
/// constructed is dropped by ordinary `Result`/`?` unwinding rather than by
/// manual teardown code.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StartupError {
    #[snafu(display("failed to spawn {worker} thread: {source}"))]
    ThreadSpawn {
        worker: &'static str,
        source:  std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("configured max_workers ({max_workers}) is below the required minimum of 3"))]
    TooFewWorkers {
        max_workers: usize,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display(
        "worker topology does not cover kind {kind:?}: at least one worker must declare it"
    ))]
    UncoveredCapability {
        kind: crate::kind::WorkKind,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

/// Errors reported to the pusher of a [`Queue`](crate::queue::Queue).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    #[snafu(display("queue {name} is at capacity"))]
    QueueFull {
        name: &'static str,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}
