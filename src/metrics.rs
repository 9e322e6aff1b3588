//! Simulation counters, aggregated off the hot path.
//!
//! Tasks record [`SimEvent`]s through a lock-free channel; a collector thread
//! folds them into totals so the source, dispatcher, and devices never contend
//! on a counter lock. [`MetricsHub::snapshot`] exposes the running totals for
//! the status output and the shutdown summary.

use crate::priority::{Priority, PriorityTable};
use crate::request::RequestView;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One observable state change in the simulation.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// A request was admitted to the queue.
    Generated { request: RequestView },
    /// A generation tick found the queue at capacity; nothing was created.
    GenerationSkipped { queue_len: usize },
    /// The dispatcher transferred a request to a device.
    Dispatched { request: RequestView, device_id: u32 },
    /// A device finished serving its request.
    Completed {
        request: RequestView,
        device_id: u32,
        service: Duration,
    },
    /// A request was destroyed without completing (stop paths only).
    Discarded { request_id: u64 },
}

struct MetricsTotals {
    generated: PriorityTable<u64>,
    dispatched: PriorityTable<u64>,
    completed: PriorityTable<u64>,
    skipped_full: u64,
    discarded: u64,
}

impl MetricsTotals {
    fn new() -> Self {
        Self {
            generated: PriorityTable::from_fn(|_| 0),
            dispatched: PriorityTable::from_fn(|_| 0),
            completed: PriorityTable::from_fn(|_| 0),
            skipped_full: 0,
            discarded: 0,
        }
    }

    fn apply(&mut self, event: &SimEvent) {
        match event {
            SimEvent::Generated { request } => self.generated[request.priority] += 1,
            SimEvent::GenerationSkipped { .. } => self.skipped_full += 1,
            SimEvent::Dispatched { request, .. } => self.dispatched[request.priority] += 1,
            SimEvent::Completed { request, .. } => self.completed[request.priority] += 1,
            SimEvent::Discarded { .. } => self.discarded += 1,
        }
    }
}

/// Point-in-time copy of the running totals.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub generated: u64,
    pub skipped_full: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub discarded: u64,
    pub per_priority: Vec<PriorityCounters>,
}

/// Totals broken out for one priority class.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriorityCounters {
    pub priority: Priority,
    pub generated: u64,
    pub dispatched: u64,
    pub completed: u64,
}

/// Owner of the event channel and the aggregated totals.
pub struct MetricsHub {
    sender: Option<Sender<SimEvent>>,
    totals: Arc<Mutex<MetricsTotals>>,
}

impl MetricsHub {
    /// Create the hub and spawn its collector thread.
    ///
    /// The collector exits once every sender clone is gone; [`MetricsHub::close`]
    /// drops the hub's own clone.
    pub fn spawn() -> (Self, thread::JoinHandle<()>) {
        let (sender, receiver) = unbounded();
        let totals = Arc::new(Mutex::new(MetricsTotals::new()));
        let collector_totals = Arc::clone(&totals);
        let handle = thread::Builder::new()
            .name("metrics-collector".into())
            .spawn(move || collect(receiver, collector_totals))
            .expect("failed to spawn metrics collector thread");
        let hub = Self {
            sender: Some(sender),
            totals,
        };
        (hub, handle)
    }

    /// Clone the event sender for a task. Call only before [`MetricsHub::close`].
    pub fn sender(&self) -> Sender<SimEvent> {
        self.sender
            .as_ref()
            .expect("metrics hub already closed")
            .clone()
    }

    /// Record an event directly (teardown bookkeeping). No-op once closed.
    pub fn record(&self, event: SimEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    /// Drop the hub's sender so the collector can drain and exit.
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let totals = self.totals.lock();
        MetricsSnapshot {
            generated: totals.generated.iter().map(|(_, n)| n).sum(),
            skipped_full: totals.skipped_full,
            dispatched: totals.dispatched.iter().map(|(_, n)| n).sum(),
            completed: totals.completed.iter().map(|(_, n)| n).sum(),
            discarded: totals.discarded,
            per_priority: Priority::ALL
                .iter()
                .map(|&priority| PriorityCounters {
                    priority,
                    generated: totals.generated[priority],
                    dispatched: totals.dispatched[priority],
                    completed: totals.completed[priority],
                })
                .collect(),
        }
    }
}

fn collect(receiver: Receiver<SimEvent>, totals: Arc<Mutex<MetricsTotals>>) {
    while let Ok(event) = receiver.recv() {
        totals.lock().apply(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use std::time::Instant;

    fn view(id: u64, priority: Priority) -> RequestView {
        Request::new(id, 0, priority).view()
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        done()
    }

    #[test]
    fn collector_aggregates_events() {
        let (mut hub, handle) = MetricsHub::spawn();
        let sender = hub.sender();

        sender
            .send(SimEvent::Generated {
                request: view(1, Priority::High),
            })
            .unwrap();
        sender
            .send(SimEvent::Generated {
                request: view(2, Priority::Low),
            })
            .unwrap();
        sender
            .send(SimEvent::GenerationSkipped { queue_len: 4 })
            .unwrap();
        sender
            .send(SimEvent::Dispatched {
                request: view(1, Priority::High),
                device_id: 0,
            })
            .unwrap();
        sender
            .send(SimEvent::Completed {
                request: view(1, Priority::High),
                device_id: 0,
                service: Duration::from_millis(5),
            })
            .unwrap();
        sender.send(SimEvent::Discarded { request_id: 2 }).unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            let snapshot = hub.snapshot();
            snapshot.generated == 2
                && snapshot.skipped_full == 1
                && snapshot.dispatched == 1
                && snapshot.completed == 1
                && snapshot.discarded == 1
        }));

        let snapshot = hub.snapshot();
        let high = snapshot.per_priority[Priority::High.index()];
        assert_eq!(high.generated, 1);
        assert_eq!(high.completed, 1);

        drop(sender);
        hub.close();
        handle.join().expect("collector thread panicked");
    }

    #[test]
    fn snapshot_serializes() {
        let (mut hub, handle) = MetricsHub::spawn();
        let snapshot = hub.snapshot();
        let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
        assert!(json.contains("\"generated\""));
        hub.close();
        handle.join().expect("collector thread panicked");
    }
}
