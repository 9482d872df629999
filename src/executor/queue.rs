//! Bounded FIFO of tasks waiting for a worker.

use super::task::Task;
use crate::config::QueueCapacity;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Blocking FIFO shared between submitters and workers.
///
/// Submitters only ever use the non-blocking [`offer`](TaskQueue::offer).
/// Workers block in [`take`](TaskQueue::take) or
/// [`poll`](TaskQueue::poll) until a task arrives or the queue is closed.
/// Once closed, no task can be added, and waiters return `None` as soon as
/// the remaining tasks are gone.
#[derive(Debug)]
pub struct TaskQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    capacity: QueueCapacity,
}

#[derive(Debug)]
struct Inner {
    tasks: VecDeque<Task>,
    closed: bool,
}

impl TaskQueue {
    pub fn new(capacity: QueueCapacity) -> Self {
        let initial = match capacity {
            QueueCapacity::Bounded(n) => n.min(1024),
            QueueCapacity::Unbounded => 64,
        };

        Self {
            inner: Mutex::new(Inner {
                tasks: VecDeque::with_capacity(initial),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> QueueCapacity {
        self.capacity
    }

    /// Append a task if there is room. The task is handed back when the
    /// queue is full or closed.
    pub fn offer(&self, task: Task) -> Result<(), Task> {
        let mut inner = self.inner.lock();
        if inner.closed || !self.capacity.has_room(inner.tasks.len()) {
            return Err(task);
        }

        inner.tasks.push_back(task);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Block until a task is available. Returns `None` once the queue is
    /// closed and empty.
    pub fn take(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(task) = inner.tasks.pop_front() {
                return Some(task);
            }
            if inner.closed {
                return None;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Like [`take`](TaskQueue::take), but gives up after `timeout`.
    pub fn poll(&self, timeout: Duration) -> Option<Task> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        loop {
            if let Some(task) = inner.tasks.pop_front() {
                return Some(task);
            }
            if inner.closed {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                        return inner.tasks.pop_front();
                    }
                }
                // timeout too large to represent, treat as no timeout
                None => self.not_empty.wait(&mut inner),
            }
        }
    }

    /// Refuse further offers and wake every blocked worker.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_empty.notify_all();
    }

    /// Close the queue and remove every task still in it, oldest first.
    /// Both happen under one lock acquisition, so no worker can dequeue in
    /// between.
    pub fn close_and_drain(&self) -> Vec<Task> {
        let drained = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.tasks.drain(..).collect()
        };
        self.not_empty.notify_all();
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn noop() -> Task {
        Task::new(|| {})
    }

    #[test]
    fn test_offer_respects_capacity() {
        let queue = TaskQueue::new(QueueCapacity::Bounded(2));

        assert!(queue.offer(noop()).is_ok());
        assert!(queue.offer(noop()).is_ok());
        assert!(queue.offer(noop()).is_err());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_zero_capacity_never_queues() {
        let queue = TaskQueue::new(QueueCapacity::Bounded(0));
        assert!(queue.offer(noop()).is_err());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new(QueueCapacity::Unbounded);
        let ids: Vec<_> = (0..5)
            .map(|_| {
                let task = noop();
                let id = task.id();
                queue.offer(task).unwrap();
                id
            })
            .collect();

        let taken: Vec<_> = (0..5).map(|_| queue.take().unwrap().id()).collect();
        assert_eq!(ids, taken);
    }

    #[test]
    fn test_poll_times_out() {
        let queue = TaskQueue::new(QueueCapacity::Unbounded);
        let start = Instant::now();

        assert!(queue.poll(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_close_wakes_blocked_take() {
        let queue = Arc::new(TaskQueue::new(QueueCapacity::Unbounded));
        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || queue.take().is_none())
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert!(waiter.join().unwrap());
        assert!(queue.offer(noop()).is_err());
    }

    #[test]
    fn test_closed_queue_still_hands_out_remaining() {
        let queue = TaskQueue::new(QueueCapacity::Unbounded);
        queue.offer(noop()).unwrap();
        queue.close();

        assert!(queue.take().is_some());
        assert!(queue.take().is_none());
    }

    #[test]
    fn test_close_and_drain() {
        let queue = TaskQueue::new(QueueCapacity::Bounded(8));
        assert_eq!(queue.capacity(), QueueCapacity::Bounded(8));
        let ids: Vec<_> = (0..3)
            .map(|_| {
                let task = noop();
                let id = task.id();
                queue.offer(task).unwrap();
                id
            })
            .collect();

        let drained: Vec<_> = queue.close_and_drain().iter().map(|t| t.id()).collect();
        assert_eq!(drained, ids);
        assert!(queue.is_empty());
        assert!(queue.offer(noop()).is_err());
        assert!(queue.is_closed());
        assert!(queue.poll(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_concurrent_producers_consumers() {
        let queue = Arc::new(TaskQueue::new(QueueCapacity::Unbounded));
        let executed = Arc::new(AtomicUsize::new(0));

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    while let Some(task) = queue.take() {
                        task.run();
                    }
                })
            })
            .collect();

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let executed = executed.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        let executed = executed.clone();
                        queue
                            .offer(Task::new(move || {
                                executed.fetch_add(1, Ordering::SeqCst);
                            }))
                            .unwrap();
                    }
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        queue.close();
        for c in consumers {
            c.join().unwrap();
        }

        assert_eq!(executed.load(Ordering::SeqCst), 1000);
    }
}
