//! gRPC service implementation for RouteGuide.
//!
//! This module defines [`RouteGuideService`], the concrete implementation of
//! the [`RouteGuide`] gRPC service defined in `route_guide.proto`. It
//! owns the state shared by all calls:
//!
//! - the read-only [`FeatureIndex`] loaded at startup,
//! - the [`NoteRegistry`] that `RouteChat` sessions append to,
//! - the [`ShutdownCoordinator`] that admits calls and cancels live sessions.
//!
//! Each call builds its own session ([`RouteSummarizer`], [`ChatRelay`]) or
//! feeder task ([`feed_features`]) and never shares per-call state with
//! another call.

use crate::server::{
    config::ServerConfig,
    registry::NoteRegistry,
    service::shutdown::{CallGuard, ShutdownCoordinator},
    streaming::{
        chat::ChatRelay,
        coordinator::feed_features,
        session::drive,
        sink::{ChannelSink, ReplySink},
        summarizer::RouteSummarizer,
    },
    telemetry::{increment_requests, increment_session_errors},
};
use core::pin::Pin;
use futures::TryStreamExt;
use routeguide_core::{
    features::{FeatureIndex, exists},
    proto::{Feature, Point, Rectangle, RouteNote, RouteSummary, route_guide_server::RouteGuide},
    types::Location,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use tracing::Instrument;

const GET_FEATURE: &str = "getFeature";
const LIST_FEATURES: &str = "listFeatures";
const RECORD_ROUTE: &str = "recordRoute";
const ROUTE_CHAT: &str = "routeChat";

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Shared RouteGuide state behind every call.
///
/// Cloning is cheap; all clones serve the same features, notes and shutdown
/// state.
#[derive(Clone)]
pub struct RouteGuideService {
    config: ServerConfig,
    features: Arc<FeatureIndex>,
    notes: Arc<NoteRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl RouteGuideService {
    pub fn new(config: ServerConfig, features: FeatureIndex) -> Self {
        let shutdown = ShutdownCoordinator::new(config.shutdown_timeout);
        Self {
            config,
            features: Arc::new(features),
            notes: Arc::new(NoteRegistry::new()),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Refuses new calls, drains in-flight ones and cancels the rest.
    pub async fn shutdown(&self) {
        self.shutdown.shutdown().await;
    }

    fn admit(&self, method: &'static str) -> Result<CallGuard, Status> {
        increment_requests(method);
        self.shutdown.admit(method).map_err(|e| {
            increment_session_errors(method);
            Status::from(e)
        })
    }

    /// Looks up the feature at `point`; an unnamed feature means none.
    pub fn feature_at(&self, point: &Point) -> Result<Feature, Status> {
        let _guard = self.admit(GET_FEATURE)?;
        let feature = self.features.lookup(Location::from(point));
        tracing::debug!(found = exists(&feature), "Feature lookup");
        Ok(feature)
    }

    /// Starts a feeder task streaming every named feature inside `rect`.
    pub fn features_within(&self, rect: Rectangle) -> Result<ResponseStream<Feature>, Status> {
        let guard = self.admit(LIST_FEATURES)?;
        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);

        let features = Arc::clone(&self.features);
        let token = self.shutdown.token();
        let fut = async move {
            let _guard = guard;
            match feed_features(features, rect, ChannelSink::new(tx), token).await {
                Ok(sent) => tracing::debug!(sent, "Feature stream completed"),
                Err(e) => {
                    increment_session_errors(LIST_FEATURES);
                    tracing::warn!("listFeatures cancelled: {}", e);
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("listing")));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// Summarizes a route read from `inbound`.
    ///
    /// Generic over the inbound stream so that anything yielding
    /// `Result<Point, Status>` can stand in for the transport.
    pub async fn record_route_stream<St>(&self, inbound: St) -> Result<RouteSummary, Status>
    where
        St: Stream<Item = Result<Point, Status>> + Send + Unpin,
    {
        let _guard = self.admit(RECORD_ROUTE)?;
        let (sink, reply) = ReplySink::channel();
        let session = RouteSummarizer::new(Arc::clone(&self.features), sink);

        if let Err(e) = drive(session, inbound, self.shutdown.token()).await {
            increment_session_errors(RECORD_ROUTE);
            return Err(e.into());
        }

        // The summarizer drops its sink without replying if it cannot deliver.
        reply
            .await
            .map_err(|_| Status::cancelled("Route summary was not produced"))?
    }

    /// Starts a chat session relaying notes read from `inbound`.
    ///
    /// The session runs on its own task so replies flow while the client is
    /// still sending.
    pub fn route_chat_stream<St>(&self, inbound: St) -> Result<ResponseStream<RouteNote>, Status>
    where
        St: Stream<Item = Result<RouteNote, Status>> + Send + Unpin + 'static,
    {
        let guard = self.admit(ROUTE_CHAT)?;
        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);

        let session = ChatRelay::new(Arc::clone(&self.notes), ChannelSink::new(tx));
        let token = self.shutdown.token();
        let fut = async move {
            let _guard = guard;
            if drive(session, inbound, token).await.is_err() {
                increment_session_errors(ROUTE_CHAT);
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("chatting")));

        let stream = ReceiverStream::new(rx).inspect_err(|_| increment_session_errors(ROUTE_CHAT));
        Ok(Box::pin(stream))
    }
}

#[tonic::async_trait]
impl RouteGuide for RouteGuideService {
    type ListFeaturesStream = ResponseStream<Feature>;
    type RouteChatStream = ResponseStream<RouteNote>;

    /// Returns the feature at the requested point, or an unnamed feature if
    /// there is none. Never fails on a miss.
    #[tracing::instrument(skip_all, fields(location = %Location::from(req.get_ref())))]
    async fn get_feature(&self, req: Request<Point>) -> Result<Response<Feature>, Status> {
        self.feature_at(req.get_ref()).map(Response::new)
    }

    /// Streams every named feature inside the requested rectangle.
    #[tracing::instrument(skip_all)]
    async fn list_features(
        &self,
        req: Request<Rectangle>,
    ) -> Result<Response<Self::ListFeaturesStream>, Status> {
        self.features_within(req.into_inner()).map(Response::new)
    }

    /// Accepts a stream of points and replies with one route summary once
    /// the client finishes sending.
    #[tracing::instrument(skip_all)]
    async fn record_route(
        &self,
        req: Request<Streaming<Point>>,
    ) -> Result<Response<RouteSummary>, Status> {
        self.record_route_stream(req.into_inner())
            .await
            .map(Response::new)
    }

    /// Relays notes between concurrent chatters at the same location.
    #[tracing::instrument(skip_all)]
    async fn route_chat(
        &self,
        req: Request<Streaming<RouteNote>>,
    ) -> Result<Response<Self::RouteChatStream>, Status> {
        self.route_chat_stream(req.into_inner()).map(Response::new)
    }
}
