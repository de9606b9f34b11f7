//! Background task queue
//!
//! One worker thread drains a mutex-guarded input queue (condvar wakeup)
//! and pushes finished work onto a mutex-guarded output queue. The main
//! thread applies at most one completed task per [`TaskQueue::process`]
//! call, which is expected to run once per frame. Completion callbacks are
//! stored main-side and never cross threads. There is no cancellation and
//! no timeout: shutdown flags the worker to stop, wakes it, and joins.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::task::{CompletedTask, QueuedTask, Task, TaskCell, TaskId};

#[derive(Debug, Error)]
pub enum TaskQueueError {
    #[error("failed to spawn asset worker thread")]
    WorkerSpawn(#[from] std::io::Error),
}

struct InputState {
    queue: VecDeque<QueuedTask>,
    running: bool,
}

struct Shared {
    input: Mutex<InputState>,
    available: Condvar,
    output: Mutex<VecDeque<CompletedTask>>,
}

type Callback = Box<dyn FnOnce(Box<dyn Any + Send>)>;

pub struct TaskQueue {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    callbacks: HashMap<TaskId, Callback>,
    next_id: TaskId,
}

impl TaskQueue {
    pub fn new() -> Result<Self, TaskQueueError> {
        let shared = Arc::new(Shared {
            input: Mutex::new(InputState {
                queue: VecDeque::new(),
                running: true,
            }),
            available: Condvar::new(),
            output: Mutex::new(VecDeque::new()),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("ember-asset-worker".into())
            .spawn(move || worker_loop(worker_shared))?;

        Ok(Self {
            shared,
            worker: Some(worker),
            callbacks: HashMap::new(),
            next_id: 0,
        })
    }

    /// Submit a task for background execution. `on_complete` runs on the
    /// main thread during a later [`TaskQueue::process`] call, with the
    /// task's output.
    pub fn add_task<T, F>(&mut self, task: T, on_complete: F) -> TaskId
    where
        T: Task,
        F: FnOnce(T::Output) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        self.callbacks.insert(
            id,
            Box::new(move |output| match output.downcast::<T::Output>() {
                Ok(output) => on_complete(*output),
                Err(_) => tracing::error!(task = id, "task output type mismatch"),
            }),
        );

        {
            let mut input = self.shared.input.lock().unwrap();
            input.queue.push_back(QueuedTask {
                id,
                task: Box::new(TaskCell::new(task)),
            });
        }
        self.shared.available.notify_one();
        tracing::debug!(task = id, "task queued");
        id
    }

    /// Apply at most one completed task's callback. Call once per frame on
    /// the main thread.
    pub fn process(&mut self) {
        let completed = self.shared.output.lock().unwrap().pop_front();
        let Some(completed) = completed else {
            return;
        };
        match self.callbacks.remove(&completed.id) {
            Some(callback) => {
                tracing::debug!(task = completed.id, "task completed");
                callback(completed.output);
            }
            None => tracing::warn!(task = completed.id, "completed task had no callback"),
        }
    }

    /// Tasks submitted but not yet picked up by the worker.
    pub fn queued(&self) -> usize {
        self.shared.input.lock().unwrap().queue.len()
    }

    /// Finished tasks waiting for a `process` call.
    pub fn finished(&self) -> usize {
        self.shared.output.lock().unwrap().len()
    }

    /// Whether any submitted task has not yet been applied.
    pub fn is_idle(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Drop all not-yet-started tasks and all unapplied results. Work
    /// already running on the worker is not interrupted; its result will be
    /// discarded at the next `process` (its callback is gone).
    pub fn clear(&mut self) {
        self.shared.input.lock().unwrap().queue.clear();
        self.shared.output.lock().unwrap().clear();
        self.callbacks.clear();
    }

    /// Stop the worker: flag it, wake it, join it. Queued-but-unstarted
    /// tasks are abandoned. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        {
            let mut input = self.shared.input.lock().unwrap();
            input.running = false;
        }
        self.shared.available.notify_all();
        if worker.join().is_err() {
            tracing::error!("asset worker panicked");
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    tracing::debug!("asset worker started");
    loop {
        let mut queued = {
            let mut input = shared.input.lock().unwrap();
            loop {
                if !input.running {
                    tracing::debug!("asset worker stopping");
                    return;
                }
                if let Some(task) = input.queue.pop_front() {
                    break task;
                }
                input = shared.available.wait(input).unwrap();
            }
        };

        let output = queued.task.run();
        shared.output.lock().unwrap().push_back(CompletedTask {
            id: queued.id,
            output,
        });
    }
}
