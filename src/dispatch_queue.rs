//! Bounded priority queue shared by the request source and the dispatcher.
//!
//! All operations are serialized by a single mutex; insertion signals a condvar
//! so the dispatcher can block while the queue is empty. Ordering is priority
//! descending with ascending arrival sequence as the tie-break, so equal
//! priority requests leave in FIFO order. Peek and removal happen through
//! [`HeadGuard`], one critical section, so the head cannot change between the
//! two.

use crate::request::Request;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry ordering: most urgent first, FIFO within a priority class.
#[derive(Debug)]
struct QueuedRequest {
    request: Request,
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.request
            .priority
            .urgency()
            .cmp(&other.request.priority.urgency())
            // Reverse order on the sequence: the max-heap must surface the
            // oldest entry among equal priorities.
            .then_with(|| {
                other
                    .request
                    .arrival_sequence
                    .cmp(&self.request.arrival_sequence)
            })
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedRequest {}

struct QueueState {
    heap: BinaryHeap<QueuedRequest>,
    stopped: bool,
}

/// Bounded, priority-ordered container of pending requests.
pub struct DispatchQueue {
    state: Mutex<QueueState>,
    nonempty: Condvar,
    capacity: usize,
}

impl DispatchQueue {
    /// Create an empty queue with a fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::with_capacity(capacity),
                stopped: false,
            }),
            nonempty: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Insert iff there is room and the queue is still accepting work.
    ///
    /// The size check and the insertion share one critical section, so the
    /// capacity bound holds against concurrent removal. On rejection the
    /// request is handed back to the caller untouched.
    pub fn try_enqueue(&self, request: Request) -> Result<(), Request> {
        let mut state = self.state.lock();
        if state.stopped || state.heap.len() >= self.capacity {
            return Err(request);
        }
        state.heap.push(QueuedRequest { request });
        self.nonempty.notify_one();
        Ok(())
    }

    /// Lock the queue for head inspection without waiting.
    pub fn lock(&self) -> HeadGuard<'_> {
        HeadGuard {
            state: self.state.lock(),
        }
    }

    /// Block until the queue holds at least one request or a stop is observed,
    /// returning with the lock held either way.
    pub fn wait_until_nonempty_or_stopped(&self) -> HeadGuard<'_> {
        let mut state = self.state.lock();
        while state.heap.is_empty() && !state.stopped {
            self.nonempty.wait(&mut state);
        }
        HeadGuard { state }
    }

    /// Stop accepting requests and wake every blocked waiter.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        self.nonempty.notify_all();
    }

    /// Remove and return every resident request. Used on teardown so no
    /// request outlives the topology.
    pub fn drain(&self) -> Vec<Request> {
        let mut state = self.state.lock();
        let mut remaining = Vec::with_capacity(state.heap.len());
        while let Some(entry) = state.heap.pop() {
            remaining.push(entry.request);
        }
        remaining
    }
}

/// Exclusive access to the queue head.
///
/// Holds the queue lock for its whole lifetime: a `remove_head` removes
/// exactly the request the preceding `peek_head` returned.
pub struct HeadGuard<'a> {
    state: MutexGuard<'a, QueueState>,
}

impl HeadGuard<'_> {
    /// Whether a stop signal has been observed.
    pub fn is_stopped(&self) -> bool {
        self.state.stopped
    }

    pub fn len(&self) -> usize {
        self.state.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.heap.is_empty()
    }

    /// Highest-priority request without removing it.
    pub fn peek_head(&self) -> Option<&Request> {
        self.state.heap.peek().map(|entry| &entry.request)
    }

    /// Remove the current head, transferring ownership to the caller.
    pub fn remove_head(&mut self) -> Option<Request> {
        self.state.heap.pop().map(|entry| entry.request)
    }
}
