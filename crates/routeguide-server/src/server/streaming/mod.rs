//! Per-call streaming machinery.
//!
//! ## Structure
//!
//! - [`sink`] - outbound sinks (`ChannelSink`, `ReplySink`).
//! - [`session`] - the `Session` contract and the driver feeding it.
//! - [`summarizer`] - `RecordRoute` session.
//! - [`chat`] - `RouteChat` session.
//! - [`coordinator`] - `ListFeatures` feeder.

pub mod chat;
pub mod coordinator;
pub mod session;
pub mod sink;
pub mod summarizer;
