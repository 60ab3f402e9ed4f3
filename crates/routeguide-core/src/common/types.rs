//! # Coordinate Types
//!
//! Locations travel over the wire as [`Point`]s in the E7 representation:
//! degrees multiplied by [`COORD_FACTOR`] and stored as `i32`. Keeping the
//! scaled integers (instead of converting to floating point) gives exact
//! equality, hashing and ordering, which both the feature lookup and the note
//! registry rely on.
//!
//! - [`Location`] - `Copy` value type with structural `Eq`/`Hash`/`Ord`, used
//!   as a map key and as the input to the geo math.
//! - [`Bounds`] - a [`Rectangle`] normalized to left/right/top/bottom edges.
//!
//! Message fields are optional in proto3, so an absent `Point` reads as the
//! origin `(0, 0)`. No range validation is applied to coordinates.

use crate::proto::{Point, Rectangle};

/// Scale between degrees and the E7 integer representation.
pub const COORD_FACTOR: f64 = 1e7;

/// A latitude/longitude pair in E7 scaled integers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub latitude: i32,
    pub longitude: i32,
}

impl Location {
    pub const fn new(latitude: i32, longitude: i32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a location from degrees, rounding to the nearest E7 unit.
    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: (latitude * COORD_FACTOR).round() as i32,
            longitude: (longitude * COORD_FACTOR).round() as i32,
        }
    }

    pub fn latitude_degrees(&self) -> f64 {
        f64::from(self.latitude) / COORD_FACTOR
    }

    pub fn longitude_degrees(&self) -> f64 {
        f64::from(self.longitude) / COORD_FACTOR
    }

    /// Reads an optional message field, treating `None` as the origin.
    pub fn from_optional(point: Option<&Point>) -> Self {
        point.map(Self::from).unwrap_or_default()
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "({}, {})",
            self.latitude_degrees(),
            self.longitude_degrees()
        )
    }
}

impl From<&Point> for Location {
    fn from(point: &Point) -> Self {
        Self::new(point.latitude, point.longitude)
    }
}

impl From<Point> for Location {
    fn from(point: Point) -> Self {
        Self::from(&point)
    }
}

impl From<Location> for Point {
    fn from(location: Location) -> Self {
        Point {
            latitude: location.latitude,
            longitude: location.longitude,
        }
    }
}

/// An inclusive bounding box with normalized edges.
///
/// The two corners of a [`Rectangle`] carry no guarantee about which one is
/// the low corner, so every edge is taken as an axis-wise min or max.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn from_corners(a: Location, b: Location) -> Self {
        Self {
            left: a.longitude.min(b.longitude),
            right: a.longitude.max(b.longitude),
            top: a.latitude.max(b.latitude),
            bottom: a.latitude.min(b.latitude),
        }
    }

    /// Inclusive containment on both axes.
    pub fn contains(&self, location: Location) -> bool {
        location.longitude >= self.left
            && location.longitude <= self.right
            && location.latitude >= self.bottom
            && location.latitude <= self.top
    }
}

impl From<&Rectangle> for Bounds {
    fn from(rect: &Rectangle) -> Self {
        Self::from_corners(
            Location::from_optional(rect.lo.as_ref()),
            Location::from_optional(rect.hi.as_ref()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrees_round_trip_through_e7() {
        let loc = Location::from_degrees(38.0, -122.5);
        assert_eq!(loc, Location::new(380_000_000, -1_225_000_000));
        assert_eq!(loc.latitude_degrees(), 38.0);
        assert_eq!(loc.longitude_degrees(), -122.5);
    }

    #[test]
    fn missing_point_reads_as_origin() {
        assert_eq!(Location::from_optional(None), Location::new(0, 0));
    }

    #[test]
    fn bounds_normalize_swapped_corners() {
        let a = Location::new(10, -20);
        let b = Location::new(-10, 20);
        let bounds = Bounds::from_corners(a, b);
        assert_eq!(bounds, Bounds::from_corners(b, a));
        assert_eq!(
            bounds,
            Bounds {
                left: -20,
                right: 20,
                top: 10,
                bottom: -10
            }
        );
    }

    #[test]
    fn bounds_edges_are_inclusive() {
        let bounds = Bounds::from_corners(Location::new(0, 0), Location::new(10, 10));
        assert!(bounds.contains(Location::new(0, 0)));
        assert!(bounds.contains(Location::new(10, 10)));
        assert!(bounds.contains(Location::new(0, 10)));
        assert!(!bounds.contains(Location::new(11, 5)));
        assert!(!bounds.contains(Location::new(5, -1)));
    }
}
