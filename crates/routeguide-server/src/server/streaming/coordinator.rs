use super::sink::Sink;
use crate::server::telemetry::increment_features_streamed;
use routeguide_core::{
    Error,
    features::FeatureIndex,
    proto::{Feature, Rectangle},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Streams every named feature inside `rect` to `sink`, in index order.
///
/// This function is invoked per `ListFeatures` call on its own task. Matches
/// are produced lazily from the index and forwarded one at a time, so a slow
/// client applies backpressure through the bounded sink rather than the
/// full result set being buffered.
///
/// # Behavior
///
/// - Completes the sink after the last match; no matches is a normal, empty
///   stream.
/// - Returns early if the client disconnects (the sink rejects an item).
/// - Fails the sink with `UNAVAILABLE` if the service begins shutting down
///   mid-stream, including while blocked on a full channel.
pub async fn feed_features<S>(
    features: Arc<FeatureIndex>,
    rect: Rectangle,
    mut sink: S,
    shutdown: CancellationToken,
) -> Result<usize, Error>
where
    S: Sink<Feature>,
{
    let mut sent = 0;

    for feature in features.query(&rect) {
        let forwarded = tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            forwarded = sink.next(feature.clone()) => Some(forwarded),
        };

        match forwarded {
            None => {
                sink.fail(Error::ServiceShutdown.into()).await;
                return Err(Error::ServiceShutdown);
            }
            Some(Err(e)) => {
                // typically "channel closed" (client disconnect)
                tracing::debug!("Response channel failed to forward feature: {}", e);
                return Err(e);
            }
            Some(Ok(())) => {}
        }
        sent += 1;
        increment_features_streamed(1);
    }

    sink.complete().await;
    Ok(sent)
}
