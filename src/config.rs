//! Configuration objects for the simulated facility.
//!
//! Every tunable the reference behavior hard-coded (inter-arrival delay,
//! service range, tick length, retry backoff) is exposed here so tests can run
//! the same machinery at millisecond scale. Defaults reproduce the documented
//! behavior: 100-1000 ms arrivals, 1000-5000 ms service, 3 s tick, 100 ms
//! dispatcher backoff.

use std::time::Duration;
use thiserror::Error;

/// Validation failures for a [`SimConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("group count must be greater than 2, got {0}")]
    GroupCount(u32),
    #[error("devices per group must be greater than 2, got {0}")]
    DevicesPerGroup(u32),
    #[error("queue capacity must be greater than 0")]
    QueueCapacity,
    #[error("arrival delay interval is empty ({min:?}..={max:?})")]
    ArrivalDelay { min: Duration, max: Duration },
    #[error("service time interval is empty ({min_ms}..={max_ms} ms)")]
    ServiceRange { min_ms: u64, max_ms: u64 },
    #[error("device tick must be non-zero")]
    Tick,
}

/// Shape of the device fleet and the shared queue.
#[derive(Debug, Clone)]
pub struct TopologyShape {
    /// Number of device groups.
    pub group_count: u32,
    /// Identical devices per group.
    pub devices_per_group: u32,
    /// Capacity of the shared dispatch queue.
    pub queue_capacity: usize,
}

impl Default for TopologyShape {
    fn default() -> Self {
        Self {
            group_count: 3,
            devices_per_group: 3,
            queue_capacity: 10,
        }
    }
}

/// Request source tuning knobs.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Lower bound of the uniform inter-arrival delay.
    pub min_delay: Duration,
    /// Upper bound of the uniform inter-arrival delay.
    pub max_delay: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }
}

/// Device service timing.
///
/// `tick` is both the sleep interval of the countdown loop and the amount
/// drained from the remaining service time per iteration: service time drains
/// at wall-clock rate, and the two cannot be configured apart.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Lower bound of the uniform service duration, in milliseconds.
    pub min_service_ms: u64,
    /// Upper bound of the uniform service duration, in milliseconds.
    pub max_service_ms: u64,
    /// Countdown tick; also bounds worst-case shutdown latency.
    pub tick: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            min_service_ms: 1000,
            max_service_ms: 5000,
            tick: Duration::from_millis(3000),
        }
    }
}

/// Dispatcher tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Fixed sleep before re-inspecting a head request whose group had no idle
    /// device.
    pub retry_backoff: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Top-level configuration used during topology construction.
#[derive(Debug, Clone, Default)]
pub struct SimConfig {
    pub shape: TopologyShape,
    pub source: SourceConfig,
    pub service: ServiceConfig,
    pub dispatch: DispatchConfig,
}

impl SimConfig {
    /// Check every structural invariant before any thread is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shape.group_count <= 2 {
            return Err(ConfigError::GroupCount(self.shape.group_count));
        }
        if self.shape.devices_per_group <= 2 {
            return Err(ConfigError::DevicesPerGroup(self.shape.devices_per_group));
        }
        if self.shape.queue_capacity == 0 {
            return Err(ConfigError::QueueCapacity);
        }
        if self.source.min_delay > self.source.max_delay {
            return Err(ConfigError::ArrivalDelay {
                min: self.source.min_delay,
                max: self.source.max_delay,
            });
        }
        if self.service.min_service_ms > self.service.max_service_ms {
            return Err(ConfigError::ServiceRange {
                min_ms: self.service.min_service_ms,
                max_ms: self.service.max_service_ms,
            });
        }
        if self.service.tick.is_zero() {
            return Err(ConfigError::Tick);
        }
        Ok(())
    }
}
