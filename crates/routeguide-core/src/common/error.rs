//! Error types for the RouteGuide service.
//!
//! This module defines the central `Error` enum, which captures all recoverable
//! and reportable error cases within the service. It implements
//! `From<Error>` for `tonic::Status` to propagate failures to clients with
//! appropriate status codes, and `From<tonic::Status>` so a failed inbound
//! stream item can be handed to a session as a plain [`Error`].
//!
//! ## Error Cases
//! - `ChannelError`: The outbound response channel is closed (client gone).
//! - `RequestCancelled`: The client cancelled the call mid-flight.
//! - `Transport`: The inbound stream failed for any other reason, including
//!   an `UNAVAILABLE` connection drop.
//! - `MissingReply` / `DuplicateReply`: A single-response call was completed
//!   with zero or more than one reply.
//! - `FeatureDatabase`: The feature database could not be read or parsed.
//! - `ServiceShutdown`: A call arrived or was running while this service shut
//!   down. Only the local shutdown path produces it.
//!
//! "No feature at this point" is never an error; it is an unnamed `Feature`.

use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the RouteGuide service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Outbound channel send failure (the receiving half was dropped).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The client aborted the call.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The inbound stream yielded a transport-level failure.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// A single-response call completed without producing its reply.
    #[error("Call completed without a reply")]
    MissingReply,

    /// A single-response call tried to produce a second reply.
    #[error("Call produced more than one reply")]
    DuplicateReply,

    /// The feature database could not be loaded.
    #[error("Feature database {path}: {reason}")]
    FeatureDatabase { path: String, reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {}", context))
            }
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::Transport { context } => Status::unknown(context),
            Error::MissingReply => Status::data_loss("Call completed without a reply"),
            Error::DuplicateReply => Status::internal("Call produced more than one reply"),
            Error::FeatureDatabase { path, reason } => {
                Status::internal(format!("Feature database {}: {}", path, reason))
            }
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::Cancelled => Error::RequestCancelled,
            _ => Error::Transport {
                context: format!("{:?}: {}", status.code(), status.message()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_status_round_trips_as_cancellation() {
        let err = Error::from(Status::cancelled("gone"));
        assert_eq!(err, Error::RequestCancelled);
        assert_eq!(Status::from(err).code(), Code::Cancelled);
    }

    #[test]
    fn unexpected_status_becomes_transport_error() {
        let err = Error::from(Status::internal("boom"));
        match err {
            Error::Transport { context } => assert!(context.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn inbound_unavailable_is_a_transport_failure() {
        let err = Error::from(Status::unavailable("connection reset"));
        assert!(matches!(err, Error::Transport { ref context } if context.contains("reset")));
        assert_ne!(err, Error::ServiceShutdown);
    }

    #[test]
    fn shutdown_maps_to_unavailable() {
        assert_eq!(Status::from(Error::ServiceShutdown).code(), Code::Unavailable);
        assert_eq!(Status::from(Error::MissingReply).code(), Code::DataLoss);
    }
}
