//! Shared types used by both the RouteGuide server and client.
//!
//! ## Submodules
//!
//! - [`error`] - Unified service error type and its `tonic::Status` mapping.
//! - [`types`] - Scaled-integer [`Location`](types::Location) and normalized
//!   [`Bounds`](types::Bounds) value types.
//! - [`geo`] - Haversine distance and rectangle membership.
//! - [`features`] - Read-only [`FeatureIndex`](features::FeatureIndex) and the
//!   JSON feature database loader.
//! - [`proto`] - Generated protobuf messages and gRPC bindings.

pub mod error;
pub mod features;
pub mod geo;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/route_guide.proto`.
///
/// ## Service
///
/// - `GetFeature` - unary point lookup.
/// - `ListFeatures` - server-streamed rectangle query.
/// - `RecordRoute` - client-streamed points, one aggregated `RouteSummary`.
/// - `RouteChat` - bidirectional stream of `RouteNote`s.
pub mod proto {
    tonic::include_proto!("routeguide");

    /// Encoded file descriptor set for the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("routeguide_descriptor");
}
