//! Fault-injection reverse proxy for a storage API backend.
//!
//! Requests are forwarded verbatim to a target host. Requests whose type has
//! a pending retry rule are first registered as a retry test with the
//! backend's control plane and tagged with the returned `x-retry-test-id`.

pub mod config;
pub mod control_plane;
pub mod metrics;
pub mod operation_manager;
pub mod proxy;
pub mod request_type;
