//! Read-only index over the feature database.
//!
//! The database is an ordered list of named locations, loaded once at startup
//! and never mutated afterwards, so the index needs no synchronization and is
//! shared between calls behind an `Arc`.
//!
//! ## File format
//!
//! [`load_features`] accepts either a bare JSON array of features or the same
//! array wrapped in a `{"feature": [...]}` object:
//!
//! ```json
//! [{ "location": { "latitude": 407838351, "longitude": -746143763 },
//!    "name": "Patriots Path, Mendham, NJ 07945, USA" }]
//! ```
//!
//! A missing `name` reads as empty and a missing `location` as the origin.

use crate::{
    Error, Result,
    geo::rectangle_contains,
    proto::{Feature, Point, Rectangle},
    types::Location,
};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path};

/// Whether `feature` names something. An unnamed feature is the sentinel for
/// "nothing at this location".
pub fn exists(feature: &Feature) -> bool {
    !feature.name.is_empty()
}

/// Immutable, ordered collection of features.
#[derive(Debug, Clone, Default)]
pub struct FeatureIndex {
    features: Vec<Feature>,
}

impl FeatureIndex {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Returns the first feature stored at exactly `location`, or an unnamed
    /// feature at `location` if there is none.
    pub fn lookup(&self, location: Location) -> Feature {
        self.features
            .iter()
            .find(|feature| Location::from_optional(feature.location.as_ref()) == location)
            .cloned()
            .unwrap_or_else(|| Feature {
                name: String::new(),
                location: Some(location.into()),
            })
    }

    /// Lazily yields every named feature inside `rect`, in storage order.
    pub fn query<'a>(&'a self, rect: &'a Rectangle) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features.iter().filter(move |feature| {
            exists(feature)
                && rectangle_contains(rect, Location::from_optional(feature.location.as_ref()))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl From<Vec<Feature>> for FeatureIndex {
    fn from(features: Vec<Feature>) -> Self {
        Self::new(features)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureDatabase {
    Bare(Vec<FeatureRecord>),
    Wrapped { feature: Vec<FeatureRecord> },
}

#[derive(Deserialize)]
struct FeatureRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: Option<PointRecord>,
}

#[derive(Deserialize)]
struct PointRecord {
    #[serde(default)]
    latitude: i32,
    #[serde(default)]
    longitude: i32,
}

impl From<FeatureRecord> for Feature {
    fn from(record: FeatureRecord) -> Self {
        let location = record.location.map_or_else(Point::default, |p| Point {
            latitude: p.latitude,
            longitude: p.longitude,
        });
        Feature {
            name: record.name,
            location: Some(location),
        }
    }
}

impl FeatureDatabase {
    fn into_features(self) -> Vec<Feature> {
        let records = match self {
            FeatureDatabase::Bare(records) | FeatureDatabase::Wrapped { feature: records } => {
                records
            }
        };
        records.into_iter().map(Feature::from).collect()
    }
}

/// Parses a feature database from its JSON text.
///
/// # Errors
///
/// Returns [`Error::FeatureDatabase`] if the text is not one of the accepted
/// shapes.
pub fn parse_features(json: &str) -> Result<Vec<Feature>> {
    serde_json::from_str::<FeatureDatabase>(json)
        .map(FeatureDatabase::into_features)
        .map_err(|e| Error::FeatureDatabase {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
}

/// Loads the feature database at `path`, preserving file order.
///
/// # Errors
///
/// Returns [`Error::FeatureDatabase`] if the file cannot be opened or parsed.
pub fn load_features(path: impl AsRef<Path>) -> Result<Vec<Feature>> {
    let path = path.as_ref();
    let db_error = |reason: String| Error::FeatureDatabase {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path).map_err(|e| db_error(e.to_string()))?;
    serde_json::from_reader::<_, FeatureDatabase>(BufReader::new(file))
        .map(FeatureDatabase::into_features)
        .map_err(|e| db_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(name: &str, latitude: i32, longitude: i32) -> Feature {
        Feature {
            name: name.to_string(),
            location: Some(Point {
                latitude,
                longitude,
            }),
        }
    }

    fn rect(lo: (i32, i32), hi: (i32, i32)) -> Rectangle {
        Rectangle {
            lo: Some(Point {
                latitude: lo.0,
                longitude: lo.1,
            }),
            hi: Some(Point {
                latitude: hi.0,
                longitude: hi.1,
            }),
        }
    }

    #[test]
    fn lookup_returns_stored_feature() {
        let pier = Location::from_degrees(38.0, -122.5);
        let index = FeatureIndex::new(vec![feature("Pier", pier.latitude, pier.longitude)]);

        let found = index.lookup(pier);
        assert_eq!(found.name, "Pier");
        assert_eq!(Location::from_optional(found.location.as_ref()), pier);
    }

    #[test]
    fn lookup_miss_returns_unnamed_feature_at_query_point() {
        let index = FeatureIndex::new(vec![feature("Pier", 380_000_000, -1_225_000_000)]);
        let origin = Location::new(0, 0);

        let found = index.lookup(origin);
        assert!(!exists(&found));
        assert_eq!(found.location, Some(Point::from(origin)));

        let odd = Location::new(-1, 123_456_789);
        assert_eq!(Location::from_optional(index.lookup(odd).location.as_ref()), odd);
    }

    #[test]
    fn lookup_returns_first_match_in_storage_order() {
        let index = FeatureIndex::new(vec![feature("first", 5, 5), feature("second", 5, 5)]);
        assert_eq!(index.lookup(Location::new(5, 5)).name, "first");
    }

    #[test]
    fn query_filters_by_bounds_and_skips_unnamed() {
        let index = FeatureIndex::new(vec![
            feature("a", 1, 1),
            feature("", 2, 2),
            feature("b", 20, 20),
            feature("c", 10, 0),
        ]);

        let bounds = rect((10, 10), (0, 0));
        let names: Vec<_> = index
            .query(&bounds)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn query_with_no_matches_is_empty() {
        let index = FeatureIndex::new(vec![feature("a", 1, 1)]);
        assert_eq!(index.query(&rect((50, 50), (60, 60))).count(), 0);
    }

    #[test]
    fn parses_bare_and_wrapped_databases() {
        let bare = r#"[
            {"location": {"latitude": 407838351, "longitude": -746143763}, "name": "Patriots Path"},
            {"location": {"latitude": 0}, "name": ""},
            {"name": "Nowhere"}
        ]"#;
        let features = parse_features(bare).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0], feature("Patriots Path", 407_838_351, -746_143_763));
        assert_eq!(features[1], feature("", 0, 0));
        assert_eq!(features[2], feature("Nowhere", 0, 0));

        let wrapped = r#"{"feature": [{"location": {"latitude": 1, "longitude": 2}, "name": "x"}]}"#;
        assert_eq!(parse_features(wrapped).unwrap(), vec![feature("x", 1, 2)]);
    }

    #[test]
    fn malformed_database_is_reported() {
        assert!(matches!(
            parse_features("{\"nope\": 1}"),
            Err(Error::FeatureDatabase { .. })
        ));
        assert!(matches!(
            load_features("/definitely/not/here.json"),
            Err(Error::FeatureDatabase { .. })
        ));
    }
}
