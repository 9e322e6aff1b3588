//! Read-only status snapshot and its human-readable rendering.

use crate::device::ServiceState;
use serde::Serialize;
use std::fmt;

/// Point-in-time view of the whole facility: queue occupancy plus every
/// device's state. Capturing one never mutates simulation state.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub groups: Vec<GroupStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupStatus {
    pub group_id: u32,
    pub devices: Vec<DeviceStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device_id: u32,
    pub state: ServiceState,
}

impl fmt::Display for SystemSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Queue: {}/{}", self.queue_len, self.queue_capacity)?;
        for group in &self.groups {
            writeln!(f, "Group {}:", group.group_id)?;
            for device in &group.devices {
                match device.state {
                    ServiceState::Free => {
                        writeln!(f, "  Device {}: Free", device.device_id)?;
                    }
                    ServiceState::Busy {
                        request,
                        remaining_ms,
                    } => {
                        writeln!(
                            f,
                            "  Device {}: Busy (request id={}, priority={}, remaining={}ms)",
                            device.device_id, request.id, request.priority, remaining_ms
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::Priority;
    use crate::request::RequestView;

    fn sample() -> SystemSnapshot {
        SystemSnapshot {
            queue_len: 2,
            queue_capacity: 10,
            groups: vec![GroupStatus {
                group_id: 0,
                devices: vec![
                    DeviceStatus {
                        device_id: 0,
                        state: ServiceState::Busy {
                            request: RequestView {
                                id: 12,
                                group_id: 0,
                                priority: Priority::High,
                            },
                            remaining_ms: 1200,
                        },
                    },
                    DeviceStatus {
                        device_id: 1,
                        state: ServiceState::Free,
                    },
                ],
            }],
        }
    }

    #[test]
    fn renders_queue_and_device_lines() {
        let rendered = sample().to_string();
        assert!(rendered.contains("Queue: 2/10"));
        assert!(rendered.contains("Group 0:"));
        assert!(rendered.contains("Device 0: Busy (request id=12, priority=high, remaining=1200ms)"));
        assert!(rendered.contains("Device 1: Free"));
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_string(&sample()).expect("serialize snapshot");
        assert!(json.contains("\"queue_len\":2"));
        assert!(json.contains("\"Busy\""));
    }
}
