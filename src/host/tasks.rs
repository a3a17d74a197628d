//! Fire-and-forget async work started by synchronous code, such as the
//! stylesheet fetch behind an intercepted `<link>`.

use std::cell::RefCell;
use std::future::Future;

use futures::future::{join_all, LocalBoxFuture};
use futures::FutureExt;

#[derive(Default)]
pub struct TaskQueue {
    pending: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue::default()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.pending.borrow_mut().push(task.boxed_local());
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Drives queued tasks to completion, including tasks they spawn.
    pub async fn settle(&self) {
        loop {
            let batch = std::mem::take(&mut *self.pending.borrow_mut());
            if batch.is_empty() {
                break;
            }
            join_all(batch).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn settle_runs_nested_tasks() {
        let queue = Rc::new(TaskQueue::new());
        let done = Rc::new(Cell::new(0));

        let (inner_queue, inner_done) = (queue.clone(), done.clone());
        queue.spawn(async move {
            inner_done.set(inner_done.get() + 1);
            let nested = inner_done.clone();
            inner_queue.spawn(async move { nested.set(nested.get() + 10) });
        });
        assert_eq!(queue.len(), 1);

        futures::executor::block_on(queue.settle());
        assert_eq!(done.get(), 11);
        assert!(queue.is_empty());
    }
}
