//! Per-device service state machine and the fixed groups devices belong to.
//!
//! Each device runs one worker thread. The dispatcher hands a request over
//! through [`Device::assign`]; the worker draws a uniform service duration and
//! counts it down in fixed ticks, releasing its lock while sleeping so the
//! observers stay usable. Remaining service time drains by exactly one tick's
//! worth per tick. On completion or forced stop the request is destroyed:
//! ownership ends at the device, it never returns to the queue.

use crate::config::ServiceConfig;
use crate::metrics::SimEvent;
use crate::request::{Request, RequestView};
use crate::shutdown::ShutdownToken;
use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Externally observable state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceState {
    Free,
    Busy {
        request: RequestView,
        remaining_ms: u64,
    },
}

/// One stateful worker serving at most one request at a time.
///
/// The slot mutex and handoff condvar form the device's own synchronization
/// domain; the busy flag mirrors the slot occupancy so the dispatcher can scan
/// a group without touching any device lock.
pub struct Device {
    device_id: u32,
    group_id: u32,
    busy: AtomicBool,
    remaining_ms: AtomicU64,
    slot: Mutex<Option<Request>>,
    handoff: Condvar,
    shutdown: ShutdownToken,
    timing: ServiceConfig,
}

impl Device {
    pub fn new(
        device_id: u32,
        group_id: u32,
        timing: ServiceConfig,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            device_id,
            group_id,
            busy: AtomicBool::new(false),
            remaining_ms: AtomicU64::new(0),
            slot: Mutex::new(None),
            handoff: Condvar::new(),
            shutdown,
            timing,
        }
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Remaining simulated service time of the in-flight request.
    pub fn remaining_time(&self) -> Duration {
        Duration::from_millis(self.remaining_ms.load(Ordering::Acquire))
    }

    /// Identity of the in-flight request, if any.
    pub fn current_request(&self) -> Option<RequestView> {
        self.slot.lock().as_ref().map(Request::view)
    }

    /// Consistent view of the device for the status collaborator.
    pub fn state(&self) -> ServiceState {
        let slot = self.slot.lock();
        match slot.as_ref() {
            Some(request) => ServiceState::Busy {
                request: request.view(),
                remaining_ms: self.remaining_ms.load(Ordering::Acquire),
            },
            None => ServiceState::Free,
        }
    }

    /// Transfer ownership of a request to this device (Idle → Busy).
    ///
    /// Refused (the request is handed back) when the device is already
    /// serving or a stop has been signalled. The busy flag flips inside the
    /// slot critical section, before the worker is woken, so a scan can never
    /// observe an assigned device as idle.
    pub fn assign(&self, request: Request) -> Result<(), Request> {
        let mut slot = self.slot.lock();
        if self.shutdown.is_cancelled() || slot.is_some() {
            return Err(request);
        }
        debug_assert_eq!(
            request.group_id, self.group_id,
            "request routed to a device outside its group"
        );
        self.busy.store(true, Ordering::Release);
        *slot = Some(request);
        self.handoff.notify_one();
        Ok(())
    }

    /// Start the worker thread for this device.
    pub fn spawn(self: Arc<Self>, events: Sender<SimEvent>) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name(format!("device-{}.{}", self.group_id, self.device_id))
            .spawn(move || self.run(&events))
            .expect("failed to spawn device thread")
    }

    /// Wake the worker so it observes cancellation without waiting out a full
    /// tick. Taking the slot lock first closes the window where a notification
    /// could arrive between the worker's cancellation check and its wait.
    pub fn wake(&self) {
        let _slot = self.slot.lock();
        self.handoff.notify_all();
    }

    fn run(&self, events: &Sender<SimEvent>) {
        let mut rng = rand::rng();
        loop {
            let mut slot = self.slot.lock();
            while slot.is_none() && !self.shutdown.is_cancelled() {
                self.handoff.wait(&mut slot);
            }
            if slot.is_none() {
                break;
            }

            let service_ms = rng.random_range(self.timing.min_service_ms..=self.timing.max_service_ms);
            let tick_ms = (self.timing.tick.as_millis().max(1)) as u64;
            let mut remaining_ms = service_ms;
            self.remaining_ms.store(remaining_ms, Ordering::Release);

            while remaining_ms > 0 && !self.shutdown.is_cancelled() {
                // The wait releases the slot lock for the duration of the tick
                // and re-acquires it before returning.
                let timed_out = self
                    .handoff
                    .wait_for(&mut slot, self.timing.tick)
                    .timed_out();
                if timed_out {
                    remaining_ms = remaining_ms.saturating_sub(tick_ms);
                    self.remaining_ms.store(remaining_ms, Ordering::Release);
                }
            }

            let request = slot.take().expect("busy device lost its request");
            self.remaining_ms.store(0, Ordering::Release);
            self.busy.store(false, Ordering::Release);
            drop(slot);

            if remaining_ms == 0 {
                let _ = events.send(SimEvent::Completed {
                    request: request.view(),
                    device_id: self.device_id,
                    service: Duration::from_millis(service_ms),
                });
            } else {
                let _ = events.send(SimEvent::Discarded {
                    request_id: request.id,
                });
            }
        }
        debug!(
            group = self.group_id,
            device = self.device_id,
            "device worker stopped"
        );
    }
}

/// Fixed-size collection of devices sharing one group id.
///
/// Membership is immutable after topology construction; the idle scan walks
/// devices in ascending id order.
pub struct DeviceGroup {
    group_id: u32,
    devices: Vec<Arc<Device>>,
}

impl DeviceGroup {
    pub fn new(
        group_id: u32,
        device_count: u32,
        timing: &ServiceConfig,
        shutdown: &ShutdownToken,
    ) -> Self {
        let devices = (0..device_count)
            .map(|device_id| {
                Arc::new(Device::new(
                    device_id,
                    group_id,
                    timing.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();
        Self { group_id, devices }
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    /// First idle device in ascending id order, if any.
    pub fn find_idle(&self) -> Option<&Arc<Device>> {
        self.devices.iter().find(|device| !device.is_busy())
    }
}
