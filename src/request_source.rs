//! Request generation task.
//!
//! Draws a group and a priority uniformly, attempts an atomic check-and-insert
//! on the shared queue, and sleeps a random bounded delay between attempts. A
//! full queue skips the tick (nothing is created, nothing is retried), so
//! request ids stay consecutive over admitted arrivals.

use crate::config::SourceConfig;
use crate::dispatch_queue::DispatchQueue;
use crate::metrics::SimEvent;
use crate::priority::Priority;
use crate::request::Request;
use crate::shutdown::ShutdownToken;
use crossbeam_channel::Sender;
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

pub struct RequestSource {
    queue: Arc<DispatchQueue>,
    group_count: u32,
    config: SourceConfig,
    shutdown: ShutdownToken,
}

impl RequestSource {
    pub fn new(
        queue: Arc<DispatchQueue>,
        group_count: u32,
        config: SourceConfig,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            queue,
            group_count,
            config,
            shutdown,
        }
    }

    pub fn spawn(self, events: Sender<SimEvent>) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("request-source".into())
            .spawn(move || self.run(&events))
            .expect("failed to spawn request source thread")
    }

    fn run(&self, events: &Sender<SimEvent>) {
        let mut rng = rand::rng();
        let mut next_id: u64 = 0;
        while !self.shutdown.is_cancelled() {
            let group_id = rng.random_range(0..self.group_count);
            let priority = Priority::ALL[rng.random_range(0..Priority::ALL.len())];
            let request = Request::new(next_id + 1, group_id, priority);
            let view = request.view();

            match self.queue.try_enqueue(request) {
                Ok(()) => {
                    next_id += 1;
                    info!(
                        id = view.id,
                        group = view.group_id,
                        priority = %view.priority,
                        "request arrived"
                    );
                    let _ = events.send(SimEvent::Generated { request: view });
                }
                Err(_rejected) => {
                    // Not a drop: the id was not consumed and no one ever saw
                    // the request.
                    debug!(queue_len = self.queue.len(), "queue full, tick skipped");
                    let _ = events.send(SimEvent::GenerationSkipped {
                        queue_len: self.queue.len(),
                    });
                }
            }

            let min_ms = self.config.min_delay.as_millis() as u64;
            let max_ms = self.config.max_delay.as_millis() as u64;
            let delay = Duration::from_millis(rng.random_range(min_ms..=max_ms));
            if self.shutdown.wait_for(delay) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Instant;

    fn fast_source() -> SourceConfig {
        SourceConfig {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(3),
        }
    }

    #[test]
    fn generation_never_exceeds_capacity() {
        let queue = Arc::new(DispatchQueue::new(1));
        let shutdown = ShutdownToken::new();
        let source = RequestSource::new(Arc::clone(&queue), 4, fast_source(), shutdown.clone());
        let (events_tx, events_rx) = unbounded();
        let handle = source.spawn(events_tx);

        // No consumer: after the first admission every tick must be skipped.
        let start = Instant::now();
        let mut saw_skip = false;
        while start.elapsed() < Duration::from_millis(200) {
            assert!(queue.len() <= 1);
            if let Ok(SimEvent::GenerationSkipped { .. }) =
                events_rx.recv_timeout(Duration::from_millis(10))
            {
                saw_skip = true;
            }
        }
        assert!(saw_skip);
        assert_eq!(queue.len(), 1);

        shutdown.cancel();
        handle.join().expect("source thread panicked");
    }

    #[test]
    fn admitted_ids_are_consecutive() {
        let queue = Arc::new(DispatchQueue::new(64));
        let shutdown = ShutdownToken::new();
        let source = RequestSource::new(Arc::clone(&queue), 3, fast_source(), shutdown.clone());
        let (events_tx, events_rx) = unbounded();
        let handle = source.spawn(events_tx);

        thread::sleep(Duration::from_millis(100));
        shutdown.cancel();
        handle.join().expect("source thread panicked");

        let mut expected = 1;
        while let Ok(event) = events_rx.try_recv() {
            if let SimEvent::Generated { request } = event {
                assert_eq!(request.id, expected);
                assert!(request.group_id < 3);
                expected += 1;
            }
        }
        assert!(expected > 1, "source generated nothing in 100ms");
    }

    #[test]
    fn stops_promptly_mid_delay() {
        let queue = Arc::new(DispatchQueue::new(4));
        let shutdown = ShutdownToken::new();
        let config = SourceConfig {
            min_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
        };
        let source = RequestSource::new(queue, 3, config, shutdown.clone());
        let (events_tx, _events_rx) = unbounded();
        let handle = source.spawn(events_tx);

        thread::sleep(Duration::from_millis(20));
        let stop_started = Instant::now();
        shutdown.cancel();
        handle.join().expect("source thread panicked");
        assert!(stop_started.elapsed() < Duration::from_secs(2));
    }
}
