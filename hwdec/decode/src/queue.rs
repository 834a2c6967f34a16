/*!
    Blocking hand-off queue between the session and its decode worker.
*/

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct QueueState<T> {
    items: VecDeque<T>,
    end_of_stream: bool,
    closed: bool,
}

/**
    An unbounded multi-producer, multi-consumer FIFO.

    `pop_blocking` waits until an item is available, returning `None` once
    the queue is empty and either end of stream has been flagged or the
    queue has been closed.
*/
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                end_of_stream: false,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /**
        Append an item. Returns false (dropping the item) if the queue is closed.
    */
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.items.push_back(item);
        self.available.notify_one();
        true
    }

    /**
        Take the oldest item without waiting.
    */
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /**
        Take the oldest item, waiting until one is pushed.

        Returns `None` if the queue is empty and end of stream has been
        flagged, or the queue has been closed.
    */
    pub fn pop_blocking(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.end_of_stream || state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /**
        Like [`pop_blocking`](Self::pop_blocking), but also gives up with
        `None` once `keep_waiting` returns false.

        `keep_waiting` is evaluated with the queue locked; whoever changes
        its outcome must call [`wake`](Self::wake) afterwards.
    */
    pub fn pop_blocking_while(&self, mut keep_waiting: impl FnMut() -> bool) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.end_of_stream || state.closed || !keep_waiting() {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /**
        Wake every waiting consumer so it re-checks its wait condition.
    */
    pub fn wake(&self) {
        let _state = self.state.lock();
        self.available.notify_all();
    }

    /**
        Flag that no more items will be pushed for the current stream.

        Waiting consumers drain what is queued, then see `None`.
    */
    pub fn set_end_of_stream(&self) {
        self.state.lock().end_of_stream = true;
        self.available.notify_all();
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.state.lock().end_of_stream
    }

    /**
        Drop all queued items and clear the end-of-stream flag.
    */
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.end_of_stream = false;
    }

    /**
        Refuse further pushes and wake every waiting consumer.
    */
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
