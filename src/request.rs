//! Request representation shared by the queue, dispatcher, and devices.

use crate::priority::Priority;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static ARRIVAL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unit of work travelling through the system.
///
/// A [`Request`] has exactly one owner at any instant: first the dispatch
/// queue, then the device serving it. It is deliberately not `Clone`: the
/// handle moves from queue to device and is destroyed on completion, so it can
/// never be aliased or duplicated. Use [`Request::view`] for logging and
/// status output.
#[derive(Debug)]
pub struct Request {
    /// Monotonically increasing identifier, unique for the lifetime of the
    /// process.
    pub id: u64,
    /// Target group; only devices of this group may serve the request.
    pub group_id: u32,
    pub priority: Priority,
    /// Strictly increasing admission counter, stamped at construction. Breaks
    /// ties between equal-priority requests (FIFO within a class).
    pub arrival_sequence: u64,
}

impl Request {
    /// Construct a request, stamping the next arrival sequence number.
    pub fn new(id: u64, group_id: u32, priority: Priority) -> Self {
        Request {
            id,
            group_id,
            priority,
            arrival_sequence: ARRIVAL_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Non-owning copy of the request's identity for logs and snapshots.
    pub fn view(&self) -> RequestView {
        RequestView {
            id: self.id,
            group_id: self.group_id,
            priority: self.priority,
        }
    }
}

/// Copyable projection of a request's identity. Never an owning handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestView {
    pub id: u64,
    pub group_id: u32,
    pub priority: Priority,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_sequence_is_strictly_increasing() {
        let a = Request::new(1, 0, Priority::High);
        let b = Request::new(2, 0, Priority::High);
        let c = Request::new(3, 1, Priority::Low);
        assert!(a.arrival_sequence < b.arrival_sequence);
        assert!(b.arrival_sequence < c.arrival_sequence);
    }

    #[test]
    fn view_carries_identity() {
        let request = Request::new(7, 2, Priority::Medium);
        let view = request.view();
        assert_eq!(view.id, 7);
        assert_eq!(view.group_id, 2);
        assert_eq!(view.priority, Priority::Medium);
    }
}
