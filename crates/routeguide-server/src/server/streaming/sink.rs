//! Outbound sinks for call responses.
//!
//! A [`Sink`] accepts zero or more [`next`](Sink::next) items followed by
//! exactly one terminal event, [`complete`](Sink::complete) or
//! [`fail`](Sink::fail). Terminal events take the sink by value, so nothing
//! can be emitted after them.
//!
//! - [`ChannelSink`] backs server-streamed responses with a bounded
//!   `mpsc` channel that tonic drains through a `ReceiverStream`.
//! - [`ReplySink`] backs single-response calls with a `oneshot` channel and
//!   rejects a second reply.

use routeguide_core::Error;
use tokio::sync::{mpsc, oneshot};
use tonic::Status;

#[tonic::async_trait]
pub trait Sink<T: Send + 'static>: Send {
    /// Emits one item toward the caller.
    ///
    /// # Errors
    ///
    /// Fails once the caller can no longer receive items.
    async fn next(&mut self, item: T) -> Result<(), Error>;

    /// Signals normal end of output.
    async fn complete(self);

    /// Terminates output with an error status.
    async fn fail(self, status: Status);
}

/// Streams items to the caller through a bounded channel.
pub struct ChannelSink<T> {
    tx: mpsc::Sender<Result<T, Status>>,
}

impl<T> ChannelSink<T> {
    pub const fn new(tx: mpsc::Sender<Result<T, Status>>) -> Self {
        Self { tx }
    }
}

#[tonic::async_trait]
impl<T: Send + 'static> Sink<T> for ChannelSink<T> {
    async fn next(&mut self, item: T) -> Result<(), Error> {
        self.tx.send(Ok(item)).await.map_err(|e| Error::ChannelError {
            context: format!("Failed to forward item: {e}"),
        })
    }

    async fn complete(self) {
        // Dropping the last sender ends the response stream.
        drop(self.tx);
    }

    async fn fail(self, status: Status) {
        // A full channel means the caller stopped reading; never wait on it.
        if let Err(e) = self.tx.try_send(Err(status)) {
            tracing::debug!("Response channel failed to forward error: {}", e);
        }
    }
}

/// Delivers exactly one reply to a waiting unary-response handler.
pub struct ReplySink<T> {
    reply: Option<T>,
    tx: oneshot::Sender<Result<T, Status>>,
}

impl<T> ReplySink<T> {
    pub fn channel() -> (Self, oneshot::Receiver<Result<T, Status>>) {
        let (tx, rx) = oneshot::channel();
        (Self { reply: None, tx }, rx)
    }
}

#[tonic::async_trait]
impl<T: Send + 'static> Sink<T> for ReplySink<T> {
    async fn next(&mut self, item: T) -> Result<(), Error> {
        if self.reply.is_some() {
            return Err(Error::DuplicateReply);
        }
        self.reply = Some(item);
        Ok(())
    }

    async fn complete(self) {
        let reply = self.reply.ok_or(Error::MissingReply).map_err(Status::from);
        if self.tx.send(reply).is_err() {
            tracing::debug!("Reply receiver dropped before completion");
        }
    }

    async fn fail(self, status: Status) {
        if self.tx.send(Err(status)).is_err() {
            tracing::debug!("Reply receiver dropped before failure");
        }
    }
}
