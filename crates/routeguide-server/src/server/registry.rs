//! Process-wide store of route notes, keyed by exact location.
//!
//! # Thread Safety
//!
//! - Location-level access goes through a `DashMap`, so sessions chatting at
//!   disjoint locations only ever touch their own shard.
//! - Creating the log for a new location happens under the shard's write
//!   lock (`entry().or_default()`), so racing sessions always end up sharing
//!   one log.
//! - Each log is an append-only `Vec` behind its own `parking_lot::Mutex`;
//!   taking the snapshot and appending the new note is one critical section.
//!
//! Logs are never removed or reordered. Callers only get a [`NoteHandle`],
//! never the underlying `Vec`.

use dashmap::DashMap;
use parking_lot::Mutex;
use routeguide_core::{proto::RouteNote, types::Location};
use std::sync::Arc;

/// Shared handle to the append-only note log of a single location.
#[derive(Clone, Debug, Default)]
pub struct NoteHandle {
    log: Arc<Mutex<Vec<RouteNote>>>,
}

impl NoteHandle {
    /// Whether both handles point at the same underlying log.
    #[cfg(test)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.log, &other.log)
    }

    pub fn count(&self) -> usize {
        self.log.lock().len()
    }

    fn snapshot_and_append(&self, note: RouteNote) -> Vec<RouteNote> {
        let mut log = self.log.lock();
        let snapshot = log.clone();
        log.push(note);
        snapshot
    }
}

/// Concurrent mapping from [`Location`] to the notes left there.
#[derive(Debug, Default)]
pub struct NoteRegistry {
    notes: DashMap<Location, NoteHandle>,
}

impl NoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the log for `location`, creating an empty one if this is the
    /// first note seen there.
    pub fn get_or_create(&self, location: Location) -> NoteHandle {
        self.notes.entry(location).or_default().value().clone()
    }

    /// Returns every note currently logged on `handle`, oldest first, then
    /// appends `note`.
    ///
    /// Concurrent callers on the same handle are serialized: each sees exactly
    /// the notes appended before it, never its own.
    pub fn snapshot_and_append(&self, handle: &NoteHandle, note: RouteNote) -> Vec<RouteNote> {
        handle.snapshot_and_append(note)
    }

    /// Number of locations with at least one log.
    pub fn location_count(&self) -> usize {
        self.notes.len()
    }

    /// Number of notes logged at `location`, without creating a log.
    pub fn note_count(&self, location: Location) -> usize {
        self.notes.get(&location).map_or(0, |handle| handle.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routeguide_core::proto::Point;
    use std::collections::HashSet;
    use std::sync::Barrier;
    use std::thread::scope;

    fn note(message: &str, latitude: i32, longitude: i32) -> RouteNote {
        RouteNote {
            location: Some(Point {
                latitude,
                longitude,
            }),
            message: message.to_string(),
        }
    }

    #[test]
    fn get_or_create_returns_the_same_log() {
        let registry = NoteRegistry::new();
        let here = Location::new(1, 2);

        let a = registry.get_or_create(here);
        let b = registry.get_or_create(here);
        let elsewhere = registry.get_or_create(Location::new(2, 1));

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&elsewhere));
        assert_eq!(registry.location_count(), 2);
    }

    #[test]
    fn snapshot_excludes_the_appended_note() {
        let registry = NoteRegistry::new();
        let handle = registry.get_or_create(Location::new(0, 0));

        assert!(
            registry
                .snapshot_and_append(&handle, note("A", 0, 0))
                .is_empty()
        );
        assert_eq!(
            registry.snapshot_and_append(&handle, note("B", 0, 0)),
            vec![note("A", 0, 0)]
        );
        assert_eq!(
            registry.snapshot_and_append(&handle, note("C", 0, 0)),
            vec![note("A", 0, 0), note("B", 0, 0)]
        );
        assert_eq!(registry.note_count(Location::new(0, 0)), 3);
        assert_eq!(registry.note_count(Location::new(9, 9)), 0);
        assert_eq!(registry.location_count(), 1);
    }

    #[test]
    fn concurrent_first_access_shares_one_log() {
        const THREADS: usize = 16;
        let registry = NoteRegistry::new();
        let fresh = Location::new(123, -456);
        let barrier = Barrier::new(THREADS);

        let handles: Vec<NoteHandle> = scope(|s| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry.get_or_create(fresh)
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(registry.location_count(), 1);
        assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
    }

    #[test]
    fn concurrent_appends_are_neither_lost_nor_duplicated() {
        const THREADS: usize = 8;
        const NOTES_PER_THREAD: usize = 250;
        let registry = NoteRegistry::new();
        let here = Location::new(7, 7);

        let snapshot_sizes: Vec<usize> = scope(|s| {
            let workers: Vec<_> = (0..THREADS)
                .map(|t| {
                    let registry = &registry;
                    s.spawn(move || {
                        let mut sizes = Vec::with_capacity(NOTES_PER_THREAD);
                        for i in 0..NOTES_PER_THREAD {
                            let handle = registry.get_or_create(here);
                            let snapshot = registry
                                .snapshot_and_append(&handle, note(&format!("{t}-{i}"), 7, 7));
                            sizes.push(snapshot.len());
                        }
                        sizes
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        let total = THREADS * NOTES_PER_THREAD;
        assert_eq!(registry.note_count(here), total);

        // Every append observed a distinct prefix length: 0, 1, ..., total - 1.
        let distinct: HashSet<usize> = snapshot_sizes.iter().copied().collect();
        assert_eq!(distinct.len(), total);
        assert_eq!(distinct, (0..total).collect::<HashSet<_>>());
    }
}
