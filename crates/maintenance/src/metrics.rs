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

use lazy_static::lazy_static;
use prometheus::*;

pub const WORKER_LABEL: &str = "worker_id";
pub const KIND_LABEL: &str = "kind";
pub const QUEUE_LABEL: &str = "queue";

lazy_static! {
    pub static ref WORKER_STARTED: IntCounterVec = register_int_counter_vec!(
        "lsm_worker_started_total",
        "Total number of maintenance workers started",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref WORKER_STOPPED: IntCounterVec = register_int_counter_vec!(
        "lsm_worker_stopped_total",
        "Total number of maintenance workers that exited gracefully",
        &[WORKER_LABEL]
    )
    .unwrap();
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "lsm_dispatch_total",
        "Total number of work units dispatched",
        &[WORKER_LABEL, KIND_LABEL]
    )
    .unwrap();
    pub static ref DISPATCH_ERRORS: IntCounterVec = register_int_counter_vec!(
        "lsm_dispatch_errors_total",
        "Total number of dispatch errors, logged and swallowed",
        &[WORKER_LABEL, KIND_LABEL]
    )
    .unwrap();
    pub static ref QUEUE_DEPTH: IntGaugeVec = register_int_gauge_vec!(
        "lsm_queue_depth",
        "Current number of units resident in a queue",
        &[QUEUE_LABEL]
    )
    .unwrap();
    pub static ref MANAGER_MERGES_ENQUEUED: IntCounter = register_int_counter!(
        "lsm_manager_merges_enqueued_total",
        "Total number of Merge units enqueued by the manager thread's inspection pass"
    )
    .unwrap();
    pub static ref ACTIVE_WORKERS: IntGauge = register_int_gauge!(
        "lsm_active_workers",
        "Current number of live maintenance worker threads"
    )
    .unwrap();
}
