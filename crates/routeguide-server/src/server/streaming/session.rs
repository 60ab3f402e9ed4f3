//! Per-call session contract and the driver that feeds it.
//!
//! An inbound gRPC stream delivers zero or more items and then ends, either
//! cleanly or with a transport error. [`drive`] maps those onto a
//! [`Session`]'s three transitions:
//!
//! | inbound                      | transition                       |
//! |------------------------------|----------------------------------|
//! | `Some(Ok(item))`             | [`Session::on_next`]             |
//! | `None`                       | [`Session::on_completed`]        |
//! | `Some(Err(status))`          | [`Session::on_error`]            |
//! | shutdown token cancelled     | `on_error(ServiceShutdown)`      |
//!
//! A failing `on_next` (typically the caller hung up and the outbound sink is
//! closed) also ends the session through `on_error`. Shutdown is observed
//! while `on_next` runs too, so a session blocked on a full outbound channel
//! is still cancelled. The terminal transitions take the session by value, so
//! no event can follow them.

use futures::{Stream, StreamExt};
use routeguide_core::Error;
use tokio_util::sync::CancellationToken;
use tonic::Status;

#[tonic::async_trait]
pub trait Session<T: Send + 'static>: Send {
    /// Handles one inbound item.
    ///
    /// # Errors
    ///
    /// An error abandons the session; the driver hands it to
    /// [`on_error`](Session::on_error).
    async fn on_next(&mut self, item: T) -> Result<(), Error>;

    /// Handles a clean end of input.
    async fn on_completed(self);

    /// Handles an upstream failure or cancellation.
    async fn on_error(self, cause: Error);
}

enum Event<T> {
    Next(T),
    Completed,
    Failed(Error),
}

/// Pumps `inbound` into `session` until a terminal transition.
///
/// Returns `Ok(())` when the session completed normally and the cause
/// otherwise.
pub async fn drive<S, T, St>(
    mut session: S,
    mut inbound: St,
    shutdown: CancellationToken,
) -> Result<(), Error>
where
    S: Session<T>,
    T: Send + 'static,
    St: Stream<Item = Result<T, Status>> + Send + Unpin,
{
    loop {
        let event = tokio::select! {
            biased;
            () = shutdown.cancelled() => Event::Failed(Error::ServiceShutdown),
            item = inbound.next() => match item {
                Some(Ok(item)) => Event::Next(item),
                Some(Err(status)) => Event::Failed(status.into()),
                None => Event::Completed,
            },
        };

        match event {
            Event::Next(item) => {
                let handled = tokio::select! {
                    biased;
                    () = shutdown.cancelled() => Err(Error::ServiceShutdown),
                    handled = session.on_next(item) => handled,
                };
                if let Err(e) = handled {
                    session.on_error(e.clone()).await;
                    return Err(e);
                }
            }
            Event::Completed => {
                session.on_completed().await;
                return Ok(());
            }
            Event::Failed(e) => {
                session.on_error(e.clone()).await;
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum Seen {
        Next(u32),
        Completed,
        Error(Error),
    }

    struct Recorder {
        seen: Arc<Mutex<Vec<Seen>>>,
        reject: Option<u32>,
        stall: Option<u32>,
    }

    #[tonic::async_trait]
    impl Session<u32> for Recorder {
        async fn on_next(&mut self, item: u32) -> Result<(), Error> {
            self.seen.lock().push(Seen::Next(item));
            if self.stall == Some(item) {
                // Stands in for a send into a full channel nobody drains.
                std::future::pending::<()>().await;
            }
            if self.reject == Some(item) {
                return Err(Error::ChannelError {
                    context: "closed".to_string(),
                });
            }
            Ok(())
        }

        async fn on_completed(self) {
            self.seen.lock().push(Seen::Completed);
        }

        async fn on_error(self, cause: Error) {
            self.seen.lock().push(Seen::Error(cause));
        }
    }

    fn recorder(reject: Option<u32>) -> (Recorder, Arc<Mutex<Vec<Seen>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Recorder {
                seen: Arc::clone(&seen),
                reject,
                stall: None,
            },
            seen,
        )
    }

    #[tokio::test]
    async fn clean_end_completes_after_every_item() {
        let (session, seen) = recorder(None);
        let inbound = tokio_stream::iter(vec![Ok(1), Ok(2), Ok(3)]);

        assert!(drive(session, inbound, CancellationToken::new()).await.is_ok());
        assert_eq!(
            *seen.lock(),
            [Seen::Next(1), Seen::Next(2), Seen::Next(3), Seen::Completed]
        );
    }

    #[tokio::test]
    async fn inbound_error_fails_and_stops() {
        let (session, seen) = recorder(None);
        let inbound = tokio_stream::iter(vec![
            Ok(1),
            Err(Status::cancelled("client went away")),
            Ok(2),
        ]);

        let outcome = drive(session, inbound, CancellationToken::new()).await;
        assert_eq!(outcome, Err(Error::RequestCancelled));
        assert_eq!(
            *seen.lock(),
            [Seen::Next(1), Seen::Error(Error::RequestCancelled)]
        );
    }

    #[tokio::test]
    async fn rejected_item_fails_the_session() {
        let (session, seen) = recorder(Some(2));
        let inbound = tokio_stream::iter(vec![Ok(1), Ok(2), Ok(3)]);

        assert!(drive(session, inbound, CancellationToken::new()).await.is_err());
        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(matches!(seen[2], Seen::Error(Error::ChannelError { .. })));
    }

    #[tokio::test]
    async fn shutdown_cancels_a_waiting_session() {
        let (session, seen) = recorder(None);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = drive(session, futures::stream::pending(), token).await;
        assert_eq!(outcome, Err(Error::ServiceShutdown));
        assert_eq!(*seen.lock(), [Seen::Error(Error::ServiceShutdown)]);
    }

    #[tokio::test]
    async fn shutdown_cancels_a_session_stuck_in_on_next() {
        let (mut session, seen) = recorder(None);
        session.stall = Some(2);
        let token = CancellationToken::new();
        let inbound = tokio_stream::iter(vec![Ok(1), Ok(2), Ok(3)]);

        let driver = tokio::spawn(drive(session, inbound, token.clone()));
        while !seen.lock().contains(&Seen::Next(2)) {
            tokio::task::yield_now().await;
        }
        token.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), driver)
            .await
            .expect("driver ignored shutdown while on_next was blocked")
            .unwrap();
        assert_eq!(outcome, Err(Error::ServiceShutdown));
        assert_eq!(
            *seen.lock(),
            [
                Seen::Next(1),
                Seen::Next(2),
                Seen::Error(Error::ServiceShutdown)
            ]
        );
    }
}
