// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract between the executor and the pluggable service shims.

use crate::executor::{SharedBoard, SharedScheduler};
use crate::task::Task;
use isoflow_core::Clock;

/// Adapter wrapping one external service.
///
/// `execute` must return in bounded time; any external work is attached
/// as scheduled jobs.  The returned task is already STARTED, COMPLETED,
/// or FAILED — a shim that cannot start (missing inputs, unknown scheme)
/// returns a task it has failed itself.
pub trait Shim<C: Clock> {
    fn execute(&self, sid: &str, board: &SharedBoard, scheduler: &SharedScheduler<C>)
        -> Box<dyn Task>;
}
