use super::{session::Session, sink::Sink};
use crate::server::{registry::NoteRegistry, telemetry::increment_notes_relayed};
use routeguide_core::{Error, Result, proto::RouteNote, types::Location};
use std::sync::Arc;

/// Bidirectional session behind `RouteChat`.
///
/// For every inbound note, replays the notes previously left at the same
/// location (never the note just sent) and then stores it for later callers.
pub struct ChatRelay<S> {
    registry: Arc<NoteRegistry>,
    sink: S,
}

impl<S: Sink<RouteNote>> ChatRelay<S> {
    pub const fn new(registry: Arc<NoteRegistry>, sink: S) -> Self {
        Self { registry, sink }
    }
}

#[tonic::async_trait]
impl<S: Sink<RouteNote>> Session<RouteNote> for ChatRelay<S> {
    async fn on_next(&mut self, note: RouteNote) -> Result<()> {
        let location = Location::from_optional(note.location.as_ref());
        let handle = self.registry.get_or_create(location);
        let prior = self.registry.snapshot_and_append(&handle, note);

        tracing::debug!(
            %location,
            replayed = prior.len(),
            stored = self.registry.note_count(location),
            locations = self.registry.location_count(),
            "Relaying notes"
        );

        let replayed = prior.len() as u64;
        for previous in prior {
            self.sink.next(previous).await?;
        }
        increment_notes_relayed(replayed);
        Ok(())
    }

    async fn on_completed(self) {
        self.sink.complete().await;
    }

    async fn on_error(self, cause: Error) {
        tracing::warn!("routeChat cancelled: {}", cause);
    }
}
