//! Task trait and type-erased plumbing

use std::any::Any;

/// Monotonically assigned identifier for a submitted task.
pub type TaskId = u32;

/// A unit of asset work.
///
/// `execute` runs on the queue's worker thread; the output crosses back to
/// the main thread and is handed to the completion callback registered at
/// submission. Tasks cannot be cancelled once submitted.
pub trait Task: Send + 'static {
    type Output: Send + 'static;

    fn execute(&mut self) -> Self::Output;
}

/// Object-safe wrapper so the worker can run heterogeneous tasks.
pub(crate) trait AnyTask: Send {
    fn run(&mut self) -> Box<dyn Any + Send>;
}

pub(crate) struct TaskCell<T: Task> {
    task: T,
}

impl<T: Task> TaskCell<T> {
    pub(crate) fn new(task: T) -> Self {
        Self { task }
    }
}

impl<T: Task> AnyTask for TaskCell<T> {
    fn run(&mut self) -> Box<dyn Any + Send> {
        Box::new(self.task.execute())
    }
}

pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    pub(crate) task: Box<dyn AnyTask>,
}

pub(crate) struct CompletedTask {
    pub(crate) id: TaskId,
    pub(crate) output: Box<dyn Any + Send>,
}
