//! Ownership and lifecycle of the whole facility.
//!
//! The topology owns every device group, the shared queue, the metrics hub,
//! and the two driving tasks. Start order: device workers first, then the
//! request source and the dispatcher. Stop order: signal and join the source
//! and dispatcher, then wake and join every device, then release whatever is
//! still resident in the queue. Stop is idempotent and safe to call while
//! generation or dispatch is in flight.

use crate::config::{ConfigError, SimConfig};
use crate::device::DeviceGroup;
use crate::dispatch_queue::DispatchQueue;
use crate::dispatcher::Dispatcher;
use crate::metrics::{MetricsHub, MetricsSnapshot, SimEvent};
use crate::request_source::RequestSource;
use crate::shutdown::ShutdownToken;
use crate::status::{DeviceStatus, GroupStatus, SystemSnapshot};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};

struct TaskHandles {
    devices: Vec<JoinHandle<()>>,
    source: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

pub struct Topology {
    config: SimConfig,
    queue: Arc<DispatchQueue>,
    groups: Arc<Vec<DeviceGroup>>,
    shutdown: ShutdownToken,
    metrics: MetricsHub,
    tasks: Option<TaskHandles>,
    collector: Option<JoinHandle<()>>,
}

impl Topology {
    /// Build the topology without starting any simulation thread.
    ///
    /// Validation happens here: an invalid configuration never constructs a
    /// topology, let alone starts one.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let shutdown = ShutdownToken::new();
        let queue = Arc::new(DispatchQueue::new(config.shape.queue_capacity));
        let groups = Arc::new(
            (0..config.shape.group_count)
                .map(|group_id| {
                    DeviceGroup::new(
                        group_id,
                        config.shape.devices_per_group,
                        &config.service,
                        &shutdown,
                    )
                })
                .collect::<Vec<_>>(),
        );
        let (metrics, collector) = MetricsHub::spawn();
        Ok(Self {
            config,
            queue,
            groups,
            shutdown,
            metrics,
            tasks: None,
            collector: Some(collector),
        })
    }

    /// Token shared by every task; cancelling it initiates shutdown.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Start every device worker, then the request source and the dispatcher.
    /// A second call is a no-op.
    pub fn start(&mut self) {
        // Already started, or already stopped for good.
        if self.tasks.is_some() || self.collector.is_none() {
            return;
        }
        let devices = self
            .groups
            .iter()
            .flat_map(|group| group.devices().iter())
            .map(|device| Arc::clone(device).spawn(self.metrics.sender()))
            .collect();

        let source = RequestSource::new(
            Arc::clone(&self.queue),
            self.config.shape.group_count,
            self.config.source.clone(),
            self.shutdown.clone(),
        )
        .spawn(self.metrics.sender());

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.groups),
            self.config.dispatch.clone(),
            self.shutdown.clone(),
        )
        .spawn(self.metrics.sender());

        self.tasks = Some(TaskHandles {
            devices,
            source,
            dispatcher,
        });
        info!(
            groups = self.config.shape.group_count,
            devices_per_group = self.config.shape.devices_per_group,
            queue_capacity = self.config.shape.queue_capacity,
            "topology started"
        );
    }

    /// Stop everything and release every request still alive. Idempotent;
    /// never deadlocks even when invoked mid-generation or mid-dispatch.
    pub fn stop(&mut self) {
        self.shutdown.cancel();
        self.queue.stop();

        if let Some(tasks) = self.tasks.take() {
            if tasks.source.join().is_err() {
                error!("request source thread panicked");
            }
            if tasks.dispatcher.join().is_err() {
                error!("dispatcher thread panicked");
            }
            for group in self.groups.iter() {
                for device in group.devices() {
                    device.wake();
                }
            }
            for handle in tasks.devices {
                if handle.join().is_err() {
                    error!("device thread panicked");
                }
            }
        }

        // Requests still queued at teardown are released here, never leaked.
        for request in self.queue.drain() {
            self.metrics.record(SimEvent::Discarded {
                request_id: request.id,
            });
        }

        self.metrics.close();
        if let Some(collector) = self.collector.take() {
            if collector.join().is_err() {
                error!("metrics collector thread panicked");
            }
            info!("topology stopped");
        }
    }

    /// Consistent read-only snapshot for the status collaborator.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            queue_len: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            groups: self
                .groups
                .iter()
                .map(|group| GroupStatus {
                    group_id: group.group_id(),
                    devices: group
                        .devices()
                        .iter()
                        .map(|device| DeviceStatus {
                            device_id: device.device_id(),
                            state: device.state(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for Topology {
    fn drop(&mut self) {
        self.stop();
    }
}
