//! Ember Asset Pipeline
//!
//! Asynchronous task execution for asset work (scene loads, texture
//! slicing, font rasterization). Tasks execute on one background worker;
//! their results are observed only on the main thread, once per frame,
//! during [`TaskQueue::process`] — so engine state is never mutated
//! concurrently.

mod queue;
mod task;

pub use queue::{TaskQueue, TaskQueueError};
pub use task::{Task, TaskId};
