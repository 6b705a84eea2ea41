//! Deferred task queue for a document's event loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use tracing::trace;

struct Task {
    name: &'static str,
    run: Box<dyn FnOnce()>,
}

/// A FIFO of work to run after the current call stack unwinds.
///
/// Work dispatched from inside a mutation notification is queued here and
/// runs later, on the same thread, when the owner of the loop calls
/// [`run_until_idle`](Self::run_until_idle). Tasks run in dispatch order;
/// a task dispatched by a running task goes to the back of the queue.
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl TaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `run` to execute later.
    pub fn dispatch(&self, name: &'static str, run: impl FnOnce() + 'static) {
        trace!(task = name, "dispatch");
        self.tasks.borrow_mut().push_back(Task {
            name,
            run: Box::new(run),
        });
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Runs the oldest queued task. Returns false if the queue was empty.
    pub fn run_next(&self) -> bool {
        // The borrow must end before the task runs so it can dispatch more.
        let next = self.tasks.borrow_mut().pop_front();
        match next {
            Some(task) => {
                trace!(task = task.name, "run");
                (task.run)();
                true
            }
            None => false,
        }
    }

    /// Runs tasks until the queue is empty, including any queued meanwhile.
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}
