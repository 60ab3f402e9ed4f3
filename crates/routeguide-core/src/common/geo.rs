//! Great-circle distance and rectangle membership.

use crate::{
    proto::Rectangle,
    types::{Bounds, Location},
};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Returns the distance between two locations in metres, computed with the
/// haversine formula.
///
/// See <http://www.movable-type.co.uk/scripts/latlong.html>.
pub fn distance_meters(start: Location, end: Location) -> f64 {
    let phi1 = start.latitude_degrees().to_radians();
    let phi2 = end.latitude_degrees().to_radians();
    let delta_lat = phi2 - phi1;
    let delta_lon = end.longitude_degrees().to_radians() - start.longitude_degrees().to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Whether `location` lies inside `rect`, edges included. The rectangle's
/// corners may be given in either order.
pub fn rectangle_contains(rect: &Rectangle, location: Location) -> bool {
    Bounds::from(rect).contains(location)
}
