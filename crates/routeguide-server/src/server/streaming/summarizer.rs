use super::{session::Session, sink::Sink};
use crate::server::telemetry::increment_points_recorded;
use routeguide_core::{
    Error, Result,
    features::{FeatureIndex, exists},
    geo::distance_meters,
    proto::{Point, RouteSummary},
    types::Location,
};
use std::sync::Arc;
use tokio::time::Instant;

/// Client-streaming session behind `RecordRoute`.
///
/// Accumulates statistics for every point of a route and emits a single
/// [`RouteSummary`] when the client finishes the stream. A failed stream
/// produces no summary.
pub struct RouteSummarizer<S> {
    features: Arc<FeatureIndex>,
    sink: S,
    point_count: i32,
    feature_count: i32,
    distance: i32,
    previous: Option<Location>,
    start: Instant,
}

impl<S: Sink<RouteSummary>> RouteSummarizer<S> {
    /// Starts a session; elapsed time is measured from this call.
    pub fn new(features: Arc<FeatureIndex>, sink: S) -> Self {
        Self {
            features,
            sink,
            point_count: 0,
            feature_count: 0,
            distance: 0,
            previous: None,
            start: Instant::now(),
        }
    }

    fn summary(&self) -> RouteSummary {
        RouteSummary {
            point_count: self.point_count,
            feature_count: self.feature_count,
            distance: self.distance,
            elapsed_time: self.start.elapsed().as_secs() as i32,
        }
    }
}

#[tonic::async_trait]
impl<S: Sink<RouteSummary>> Session<Point> for RouteSummarizer<S> {
    async fn on_next(&mut self, point: Point) -> Result<()> {
        let location = Location::from(point);

        self.point_count += 1;
        if exists(&self.features.lookup(location)) {
            self.feature_count += 1;
        }
        // The first point of a route contributes no distance. Each leg is
        // added to the whole-metre total and truncated again.
        if let Some(previous) = self.previous {
            let travelled = f64::from(self.distance) + distance_meters(previous, location);
            self.distance = travelled as i32;
        }
        self.previous = Some(location);

        increment_points_recorded(1);
        Ok(())
    }

    async fn on_completed(mut self) {
        let summary = self.summary();
        tracing::debug!(
            point_count = summary.point_count,
            feature_count = summary.feature_count,
            distance = summary.distance,
            elapsed_time = summary.elapsed_time,
            "Route recorded"
        );

        if let Err(e) = self.sink.next(summary).await {
            tracing::warn!("Failed to deliver route summary: {}", e);
            return;
        }
        self.sink.complete().await;
    }

    async fn on_error(self, cause: Error) {
        tracing::warn!(
            point_count = self.point_count,
            "recordRoute cancelled: {}",
            cause
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::streaming::{session::drive, sink::ReplySink};
    use core::time::Duration;
    use routeguide_core::proto::Feature;
    use tokio_util::sync::CancellationToken;
    use tonic::Status;

    fn point(latitude: i32, longitude: i32) -> Point {
        Point {
            latitude,
            longitude,
        }
    }

    fn index() -> Arc<FeatureIndex> {
        Arc::new(FeatureIndex::new(vec![
            Feature {
                name: "Pier".to_string(),
                location: Some(Location::from_degrees(38.0, -122.5).into()),
            },
            Feature {
                name: String::new(),
                location: Some(point(0, 0)),
            },
        ]))
    }

    /// Running total truncated to whole metres after every leg.
    fn whole_meters(route: &[Location]) -> i32 {
        route.windows(2).fold(0, |total, leg| {
            (f64::from(total) + distance_meters(leg[0], leg[1])) as i32
        })
    }

    async fn record(points: Vec<Point>) -> RouteSummary {
        let (sink, rx) = ReplySink::channel();
        let summarizer = RouteSummarizer::new(index(), sink);
        let inbound = tokio_stream::iter(points.into_iter().map(Ok::<_, Status>));

        drive(summarizer, inbound, CancellationToken::new())
            .await
            .unwrap();
        rx.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn empty_route_is_all_zero() {
        let summary = record(Vec::new()).await;
        assert_eq!(summary, RouteSummary::default());
    }

    #[tokio::test]
    async fn single_point_has_no_distance() {
        let summary = record(vec![Location::from_degrees(38.0, -122.5).into()]).await;
        assert_eq!(summary.point_count, 1);
        assert_eq!(summary.feature_count, 1);
        assert_eq!(summary.distance, 0);
    }

    #[tokio::test]
    async fn distance_is_sum_of_consecutive_legs() {
        let p1 = Location::from_degrees(0.0, 0.0);
        let p2 = Location::from_degrees(0.0, 1.0);
        let p3 = Location::from_degrees(1.0, 1.0);
        let expected = whole_meters(&[p1, p2, p3]);

        let summary = record(vec![p1.into(), p2.into(), p3.into()]).await;
        assert_eq!(summary.point_count, 3);
        assert_eq!(summary.distance, expected);
        // The unnamed feature at the origin does not count.
        assert_eq!(summary.feature_count, 0);
    }

    #[tokio::test]
    async fn revisiting_a_point_counts_each_visit() {
        let pier = || Point::from(Location::from_degrees(38.0, -122.5));
        let summary = record(vec![pier(), point(1, 1), pier()]).await;
        assert_eq!(summary.point_count, 3);
        assert_eq!(summary.feature_count, 2);
    }

    #[tokio::test]
    async fn distance_truncates_after_every_leg() {
        // Eleven equatorial points 0.3 degrees apart: ten legs of ~33358.478 m.
        let route: Vec<Location> = (0..11)
            .map(|i| Location::from_degrees(0.0, f64::from(i) * 0.3))
            .collect();
        let leg = distance_meters(route[0], route[1]);
        assert!(leg.fract() > 0.1);

        let summary = record(route.iter().copied().map(Point::from).collect()).await;

        assert_eq!(summary.distance, 10 * leg as i32);
        assert!(summary.distance < (10.0 * leg) as i32);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_is_whole_seconds_since_start() {
        let (sink, rx) = ReplySink::channel();
        let mut summarizer = RouteSummarizer::new(index(), sink);

        let p1 = Location::from_degrees(0.0, 0.0);
        let p2 = Location::from_degrees(0.0, 1.0);
        let p3 = Location::from_degrees(0.0, 2.0);
        for p in [p1, p2, p3] {
            summarizer.on_next(p.into()).await.unwrap();
            tokio::time::advance(Duration::from_millis(1_400)).await;
        }
        summarizer.on_completed().await;

        let summary = rx.await.unwrap().unwrap();
        let expected = whole_meters(&[p1, p2, p3]);
        assert_eq!(
            summary,
            RouteSummary {
                point_count: 3,
                feature_count: 0,
                distance: expected,
                elapsed_time: 4,
            }
        );
    }

    #[tokio::test]
    async fn failed_route_emits_no_summary() {
        let (sink, rx) = ReplySink::channel();
        let summarizer = RouteSummarizer::new(index(), sink);
        let inbound = tokio_stream::iter(vec![
            Ok(point(1, 1)),
            Err(Status::cancelled("client went away")),
        ]);

        let outcome = drive(summarizer, inbound, CancellationToken::new()).await;
        assert_eq!(outcome, Err(Error::RequestCancelled));
        // The sink was dropped without a reply.
        assert!(rx.await.is_err());
    }
}
