//! Call admission and graceful shutdown.
//!
//! Every RPC is admitted through [`ShutdownCoordinator::admit`], which hands
//! back a [`CallGuard`] that lives as long as the call's session. Shutdown
//! proceeds in phases:
//!
//! 1. Refuse new calls with `UNAVAILABLE`.
//! 2. Wait (up to the configured timeout) for in-flight calls to finish.
//! 3. Cancel the shared [`CancellationToken`] so any session still running
//!    terminates through its error path.

use crate::server::telemetry::{
    decrement_sessions_inflight, increment_sessions_inflight, record_session_duration,
};
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use routeguide_core::Error;
use std::{sync::Arc, time::Instant};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutting_down: AtomicBool,
    inflight: AtomicUsize,
    token: CancellationToken,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shutting_down: AtomicBool::new(false),
            inflight: AtomicUsize::new(0),
            token: CancellationToken::new(),
            timeout,
        }
    }

    /// Registers a new call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn admit(self: &Arc<Self>, method: &'static str) -> Result<CallGuard, Error> {
        // Count first, then check: a call that slips past the flag is always
        // visible to the drain loop.
        self.inflight.fetch_add(1, Ordering::SeqCst);
        if self.is_shutting_down() {
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::ServiceShutdown);
        }

        increment_sessions_inflight();
        Ok(CallGuard {
            coordinator: Arc::clone(self),
            method,
            start: Instant::now(),
        })
    }

    /// Token cancelled once the drain phase is over.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Runs the shutdown phases. Calling it again is harmless.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new calls ===
        tracing::info!("Refusing new calls");
        self.shutting_down.store(true, Ordering::SeqCst);

        // === Phase 1: Wait for in-flight calls to drain ===
        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        let drained = timeout(self.timeout, async {
            while self.inflight() > 0 {
                sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight calls drained successfully"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} calls still active)",
                self.inflight()
            ),
        }

        // === Phase 2: Cancel whatever is left ===
        tracing::debug!("Cancelling remaining sessions via shutdown token");
        self.token.cancel();
    }
}

/// Keeps a call counted as in flight until dropped.
#[derive(Debug)]
pub struct CallGuard {
    coordinator: Arc<ShutdownCoordinator>,
    method: &'static str,
    start: Instant,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.coordinator.inflight.fetch_sub(1, Ordering::SeqCst);
        decrement_sessions_inflight();
        record_session_duration(self.start.elapsed().as_secs_f64() * 1_000.0);
        tracing::trace!(method = self.method, "Call finished");
    }
}
