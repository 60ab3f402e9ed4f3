//! Demo client exercising all four RouteGuide calls against a running server.

use clap::Parser;
use core::time::Duration;
use rand::Rng;
use routeguide_core::{
    features::{exists, load_features},
    proto::{Feature, Point, Rectangle, RouteNote, route_guide_client::RouteGuideClient},
    types::Location,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tonic::transport::Channel;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "routeguide-client",
    version,
    about = "Runs the RouteGuide demo scenario against a server"
)]
struct ClientArgs {
    /// Server endpoint.
    ///
    /// Environment variable: `CLIENT_SERVER_ADDR`
    #[arg(long, env = "CLIENT_SERVER_ADDR", default_value_t = String::from("http://127.0.0.1:8980"))]
    server_addr: String,

    /// Feature database the recorded route is sampled from.
    ///
    /// Environment variable: `FEATURE_DB`
    #[arg(long, env = "FEATURE_DB", default_value = "data/route_guide_db.json")]
    feature_db: PathBuf,

    /// Number of points to send to `RecordRoute`.
    #[arg(long, default_value_t = 10)]
    points: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = ClientArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let features = load_features(&args.feature_db)?;
    let mut client = RouteGuideClient::connect(args.server_addr.clone()).await?;
    tracing::info!("Connected to {}", args.server_addr);

    get_feature(&mut client, 409_146_138, -746_188_906).await;
    get_feature(&mut client, 0, 0).await;
    list_features(&mut client, 400_000_000, -750_000_000, 410_000_000, -740_000_000).await;
    record_route(&mut client, &features, args.points).await;
    route_chat(&mut client).await;

    Ok(())
}

async fn get_feature(client: &mut RouteGuideClient<Channel>, latitude: i32, longitude: i32) {
    tracing::info!("*** GetFeature: lat={} lon={}", latitude, longitude);

    let feature = match client
        .get_feature(Point {
            latitude,
            longitude,
        })
        .await
    {
        Ok(response) => response.into_inner(),
        Err(status) => {
            tracing::warn!("RPC failed: {}", status);
            return;
        }
    };

    let location = Location::from_optional(feature.location.as_ref());
    if exists(&feature) {
        tracing::info!("Found feature called \"{}\" at {}", feature.name, location);
    } else {
        tracing::info!("Found no feature at {}", location);
    }
}

async fn list_features(
    client: &mut RouteGuideClient<Channel>,
    lo_latitude: i32,
    lo_longitude: i32,
    hi_latitude: i32,
    hi_longitude: i32,
) {
    tracing::info!(
        "*** ListFeatures: lowLat={} lowLon={} hiLat={} hiLon={}",
        lo_latitude,
        lo_longitude,
        hi_latitude,
        hi_longitude
    );

    let rect = Rectangle {
        lo: Some(Point {
            latitude: lo_latitude,
            longitude: lo_longitude,
        }),
        hi: Some(Point {
            latitude: hi_latitude,
            longitude: hi_longitude,
        }),
    };

    let mut stream = match client.list_features(rect).await {
        Ok(response) => response.into_inner(),
        Err(status) => {
            tracing::warn!("RPC failed: {}", status);
            return;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(feature) => tracing::info!(
                "Result: \"{}\" at {}",
                feature.name,
                Location::from_optional(feature.location.as_ref())
            ),
            Err(status) => {
                tracing::warn!("RPC failed: {}", status);
                return;
            }
        }
    }
}

async fn record_route(client: &mut RouteGuideClient<Channel>, features: &[Feature], points: usize) {
    tracing::info!("*** RecordRoute: {} points", points);
    if features.is_empty() {
        tracing::warn!("No features to sample a route from");
        return;
    }

    // Sample up front; the thread-local RNG cannot cross the spawn below.
    let route: Vec<(Point, Duration)> = {
        let mut rng = rand::rng();
        (0..points)
            .map(|_| {
                let feature = &features[rng.random_range(0..features.len())];
                let point = Point::from(Location::from_optional(feature.location.as_ref()));
                let pause = Duration::from_millis(rng.random_range(250..500));
                (point, pause)
            })
            .collect()
    };

    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        for (point, pause) in route {
            tracing::info!("Visiting point {}", Location::from(&point));
            if tx.send(point).await.is_err() {
                // The call already ended; nothing more will be read.
                return;
            }
            tokio::time::sleep(pause).await;
        }
    });

    match client.record_route(ReceiverStream::new(rx)).await {
        Ok(response) => {
            let summary = response.into_inner();
            tracing::info!(
                "Finished trip with {} points. Passed {} features. Travelled {} meters. It took {} seconds.",
                summary.point_count,
                summary.feature_count,
                summary.distance,
                summary.elapsed_time
            );
        }
        Err(status) => tracing::warn!("RecordRoute failed: {}", status),
    }
}

async fn route_chat(client: &mut RouteGuideClient<Channel>) {
    tracing::info!("*** RouteChat");

    let notes: Vec<RouteNote> = [
        ("First", 0, 0),
        ("Second", 0, 1),
        ("Third", 1, 0),
        ("Fourth", 0, 0),
    ]
    .into_iter()
    .map(|(message, latitude, longitude)| RouteNote {
        location: Some(Point {
            latitude,
            longitude,
        }),
        message: message.to_string(),
    })
    .collect();

    for note in &notes {
        tracing::info!(
            "Sending \"{}\" at {}",
            note.message,
            Location::from_optional(note.location.as_ref())
        );
    }

    let mut inbound = match client.route_chat(tokio_stream::iter(notes)).await {
        Ok(response) => response.into_inner(),
        Err(status) => {
            tracing::warn!("RPC failed: {}", status);
            return;
        }
    };

    while let Some(item) = inbound.next().await {
        match item {
            Ok(note) => tracing::info!(
                "Got message \"{}\" at {}",
                note.message,
                Location::from_optional(note.location.as_ref())
            ),
            Err(status) => {
                tracing::warn!("RouteChat failed: {}", status);
                return;
            }
        }
    }
    tracing::info!("Finished RouteChat");
}
