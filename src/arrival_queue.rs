//! Per-warehouse FIFO hand-off queue: producers never block, the consumer
//! blocks until an item arrives or the queue is closed.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Item handed back when a push is refused.
#[derive(Debug)]
pub enum PushError<T> {
    Closed(T),
    Full(T),
}

pub struct ArrivalQueue<T> {
    inner: Mutex<QueueState<T>>,
    available: Condvar,
    capacity: Option<usize>,
}

struct QueueState<T> {
    queue: VecDeque<T>,
    closed: bool,
}

impl<T> ArrivalQueue<T> {
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Queue that refuses pushes beyond `capacity` pending items.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(QueueState {
                queue: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue without blocking; the item comes back if it cannot be queued.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut guard = self.inner.lock().expect("arrival queue mutex poisoned");
        if guard.closed {
            return Err(PushError::Closed(item));
        }
        if self.capacity.is_some_and(|cap| guard.queue.len() >= cap) {
            return Err(PushError::Full(item));
        }
        guard.queue.push_back(item);
        self.available.notify_one();
        Ok(())
    }

    /// Block until an item is available or the queue is closed.
    pub fn pop_blocking_or_closed(&self) -> Option<T> {
        let mut guard = self.inner.lock().expect("arrival queue mutex poisoned");
        loop {
            if guard.closed {
                return None;
            }
            if let Some(item) = guard.queue.pop_front() {
                return Some(item);
            }
            guard = self.available.wait(guard).expect("condvar wait failed");
        }
    }

    /// Close the queue, wake every consumer, and return what was still pending.
    pub fn close(&self) -> Vec<T> {
        let mut guard = self.inner.lock().expect("arrival queue mutex poisoned");
        guard.closed = true;
        self.available.notify_all();
        guard.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("arrival queue mutex poisoned");
        guard.queue.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
