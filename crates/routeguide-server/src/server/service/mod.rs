//! gRPC service implementation and call lifecycle.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`RouteGuideService`).
//! - [`shutdown`] - call admission, in-flight accounting and graceful drain.

pub mod handler;
pub mod shutdown;
