pub mod config;
pub mod device;
pub mod dispatch_queue;
pub mod dispatcher;
pub mod metrics;
pub mod priority;
pub mod request;
pub mod request_source;
pub mod shutdown;
pub mod status;
pub mod topology;

// Re-export for easier testing
pub use config::{ConfigError, SimConfig};
pub use dispatch_queue::DispatchQueue;
pub use priority::Priority;
pub use request::Request;
pub use topology::Topology;
