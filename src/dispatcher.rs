//! Matching loop between the queue head and idle devices.
//!
//! Only the head of the queue is ever inspected. If the head's group has no
//! idle device the dispatcher backs off and retries the same head. It never
//! reaches past it, so a saturated group blocks every request queued behind
//! it even when other groups sit idle. That head-of-line policy is intentional
//! and covered by tests.

use crate::config::DispatchConfig;
use crate::device::DeviceGroup;
use crate::dispatch_queue::DispatchQueue;
use crate::metrics::SimEvent;
use crate::shutdown::ShutdownToken;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

pub struct Dispatcher {
    queue: Arc<DispatchQueue>,
    groups: Arc<Vec<DeviceGroup>>,
    config: DispatchConfig,
    shutdown: ShutdownToken,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<DispatchQueue>,
        groups: Arc<Vec<DeviceGroup>>,
        config: DispatchConfig,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            queue,
            groups,
            config,
            shutdown,
        }
    }

    pub fn spawn(self, events: Sender<SimEvent>) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("dispatcher".into())
            .spawn(move || self.run(&events))
            .expect("failed to spawn dispatcher thread")
    }

    fn run(&self, events: &Sender<SimEvent>) {
        loop {
            let mut head = self.queue.wait_until_nonempty_or_stopped();
            if head.is_stopped() {
                break;
            }
            let Some(target) = head.peek_head().map(|request| request.view()) else {
                continue;
            };

            let Some(group) = self.groups.get(target.group_id as usize) else {
                // A request outside the topology can never match a device;
                // remove it rather than wedge the head forever.
                debug_assert!(false, "request {} targets unknown group {}", target.id, target.group_id);
                let request = head.remove_head().expect("peeked head vanished under guard");
                drop(head);
                warn!(id = request.id, group = request.group_id, "request targets unknown group, discarding");
                let _ = events.send(SimEvent::Discarded {
                    request_id: request.id,
                });
                continue;
            };

            // The scan reads busy flags only; no device lock is taken while
            // the queue guard is held.
            match group.find_idle() {
                Some(device) => {
                    let device = Arc::clone(device);
                    let request = head.remove_head().expect("peeked head vanished under guard");
                    drop(head);
                    match device.assign(request) {
                        Ok(()) => {
                            debug!(
                                id = target.id,
                                group = target.group_id,
                                device = device.device_id(),
                                priority = %target.priority,
                                "request dispatched"
                            );
                            let _ = events.send(SimEvent::Dispatched {
                                request: target,
                                device_id: device.device_id(),
                            });
                        }
                        Err(request) => {
                            // Only reachable when stop lands between the scan
                            // and the handoff; the request is released here.
                            warn!(id = request.id, "assignment refused during shutdown");
                            let _ = events.send(SimEvent::Discarded {
                                request_id: request.id,
                            });
                        }
                    }
                }
                None => {
                    // Leave the head untouched and retry it after the backoff.
                    drop(head);
                    if self.shutdown.wait_for(self.config.retry_backoff) {
                        break;
                    }
                }
            }
        }
    }
}
