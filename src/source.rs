//! Region source: GeoJSON feature collections.
//!
//! Only the parts of GeoJSON the generator needs are modeled: `Polygon` and
//! `MultiPolygon` geometries plus a flat property map. Ids and display names
//! are read from configurable property keys.

use std::fs;
use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::DataLoadError;
use crate::region::{Region, RegionStore};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Option<Geometry>,
}

/// Positions may carry a third (elevation) ordinate, which is ignored.
type Ring = Vec<Vec<f64>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    #[serde(other)]
    Other,
}

/// Read the configured source file under `input_dir` into a [`RegionStore`].
pub fn load_regions(input_dir: &Path, config: &SourceConfig) -> Result<RegionStore, DataLoadError> {
    let path = input_dir.join(&config.file);
    info!(path = %path.display(), "loading regions");

    let text = fs::read_to_string(&path).map_err(|source| DataLoadError::Read {
        path: path.clone(),
        source,
    })?;
    let store = parse_regions(&text, config).map_err(|err| match err {
        ParseFailure::Json(source) => DataLoadError::Parse {
            path: path.clone(),
            source,
        },
        ParseFailure::Data(err) => err,
    })?;
    if store.is_empty() {
        return Err(DataLoadError::Empty(path));
    }

    info!(regions = store.len(), "regions loaded");
    Ok(store)
}

enum ParseFailure {
    Json(serde_json::Error),
    Data(DataLoadError),
}

impl From<DataLoadError> for ParseFailure {
    fn from(err: DataLoadError) -> Self {
        ParseFailure::Data(err)
    }
}

fn parse_regions(text: &str, config: &SourceConfig) -> Result<RegionStore, ParseFailure> {
    let collection: FeatureCollection = serde_json::from_str(text).map_err(ParseFailure::Json)?;

    let mut regions = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();
        let id = property_string(&properties, &config.id_property).ok_or_else(|| {
            DataLoadError::MissingProperty {
                index,
                property: config.id_property.clone(),
            }
        })?;
        let name = property_string(&properties, &config.name_property).ok_or_else(|| {
            DataLoadError::MissingProperty {
                index,
                property: config.name_property.clone(),
            }
        })?;

        let geometry = match feature.geometry {
            Some(Geometry::Polygon { coordinates }) => MultiPolygon::new(vec![to_polygon(&id, coordinates)?]),
            Some(Geometry::MultiPolygon { coordinates }) => MultiPolygon::new(
                coordinates
                    .into_iter()
                    .map(|rings| to_polygon(&id, rings))
                    .collect::<Result<_, _>>()?,
            ),
            Some(Geometry::Other) => {
                return Err(DataLoadError::UnsupportedGeometry {
                    id,
                    kind: "non-polygonal".into(),
                }
                .into())
            }
            None => {
                warn!(id = %id, "feature has no geometry");
                MultiPolygon::new(vec![])
            }
        };

        debug!(id = %id, name = %name, polygons = geometry.0.len(), "region");
        regions.push(Region::new(id, name, geometry));
    }

    Ok(RegionStore::new(regions)?)
}

/// String form of a property; numbers are accepted for numeric codes.
fn property_string(properties: &Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A closed linear ring needs at least four positions.
const MIN_RING_POSITIONS: usize = 4;

fn to_polygon(id: &str, rings: Vec<Ring>) -> Result<Polygon<f64>, DataLoadError> {
    let mut rings = rings
        .into_iter()
        .map(|ring| to_line_string(id, ring))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings.next().ok_or_else(|| DataLoadError::MalformedGeometry {
        id: id.to_string(),
        reason: "polygon without rings".into(),
    })?;
    Ok(Polygon::new(exterior, rings.collect()))
}

fn to_line_string(id: &str, ring: Ring) -> Result<LineString<f64>, DataLoadError> {
    if ring.len() < MIN_RING_POSITIONS {
        return Err(DataLoadError::MalformedGeometry {
            id: id.to_string(),
            reason: format!("ring with {} positions", ring.len()),
        });
    }
    ring.into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(DataLoadError::MalformedGeometry {
                id: id.to_string(),
                reason: format!("position with {} ordinates", position.len()),
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SourceConfig {
        SourceConfig::default()
    }

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"kommunekode": "0101", "navn": "København"},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"kommunekode": 147, "navn": "Frederiksberg"},
                "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[3,0],[4,0],[4,1],[3,1],[3,0]]],
                    [[[5,0],[6,0],[6,1],[5,1],[5,0]], [[5.2,0.2],[5.8,0.2],[5.8,0.8],[5.2,0.8],[5.2,0.2]]]
                ]}
            }
        ]
    }"#;

    fn parse(text: &str) -> Result<RegionStore, DataLoadError> {
        parse_regions(text, &config()).map_err(|err| match err {
            ParseFailure::Json(e) => panic!("unexpected json error: {}", e),
            ParseFailure::Data(e) => e,
        })
    }

    #[test]
    fn test_parse_polygon_and_multipolygon() {
        let store = parse(SAMPLE).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.ids(), vec!["0101".to_string(), "147".to_string()]);

        let kbh = store.get("0101").unwrap();
        assert_eq!(kbh.name, "København");
        assert_eq!(kbh.geometry.0.len(), 1);

        let frb = store.get("147").unwrap();
        assert_eq!(frb.geometry.0.len(), 2);
        assert_eq!(frb.geometry.0[1].interiors().len(), 1);
    }

    #[test]
    fn test_missing_property_is_reported() {
        let text = r#"{"features": [{"properties": {"navn": "X"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}]}"#;
        assert!(matches!(
            parse(text),
            Err(DataLoadError::MissingProperty { index: 0, property }) if property == "kommunekode"
        ));
    }

    #[test]
    fn test_unsupported_geometry_is_rejected() {
        let text = r#"{"features": [{"properties": {"kommunekode": "1", "navn": "X"},
            "geometry": {"type": "Point", "coordinates": [0, 0]}}]}"#;
        assert!(matches!(
            parse(text),
            Err(DataLoadError::UnsupportedGeometry { id, .. }) if id == "1"
        ));
    }

    #[test]
    fn test_elevation_is_ignored_and_short_positions_rejected() {
        let text = r#"{"features": [{"properties": {"kommunekode": "1", "navn": "X"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0,5],[1,0,5],[1,1,5],[0,0,5]]]}}]}"#;
        let store = parse(text).unwrap();
        assert_eq!(store.get("1").unwrap().geometry.0[0].exterior().0.len(), 4);

        let text = r#"{"features": [{"properties": {"kommunekode": "1", "navn": "X"},
            "geometry": {"type": "Polygon", "coordinates": [[[0],[1,0],[1,1],[0,0]]]}}]}"#;
        assert!(matches!(
            parse(text),
            Err(DataLoadError::MalformedGeometry { id, .. }) if id == "1"
        ));
    }

    #[test]
    fn test_short_and_empty_rings_are_rejected() {
        let empty_part = r#"{"features": [{"properties": {"kommunekode": "2", "navn": "Y"},
            "geometry": {"type": "MultiPolygon", "coordinates": [
                [[[10,0],[11,0],[11,1],[10,1],[10,0]]],
                [[]]
            ]}}]}"#;
        assert!(matches!(
            parse(empty_part),
            Err(DataLoadError::MalformedGeometry { id, reason }) if id == "2" && reason == "ring with 0 positions"
        ));

        let triangle_open = r#"{"features": [{"properties": {"kommunekode": "3", "navn": "Z"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[0,1]]]}}]}"#;
        assert!(matches!(
            parse(triangle_open),
            Err(DataLoadError::MalformedGeometry { id, .. }) if id == "3"
        ));

        let short_hole = r#"{"features": [{"properties": {"kommunekode": "4", "navn": "W"},
            "geometry": {"type": "Polygon", "coordinates": [
                [[0,0],[4,0],[4,4],[0,4],[0,0]],
                [[1,1],[2,1]]
            ]}}]}"#;
        assert!(matches!(
            parse(short_hole),
            Err(DataLoadError::MalformedGeometry { id, .. }) if id == "4"
        ));

        let no_rings = r#"{"features": [{"properties": {"kommunekode": "5", "navn": "V"},
            "geometry": {"type": "MultiPolygon", "coordinates": [[]]}}]}"#;
        assert!(matches!(
            parse(no_rings),
            Err(DataLoadError::MalformedGeometry { id, reason }) if id == "5" && reason == "polygon without rings"
        ));
    }

    #[test]
    fn test_null_geometry_loads_empty() {
        let text = r#"{"features": [{"properties": {"kommunekode": "1", "navn": "X"}, "geometry": null}]}"#;
        let store = parse(text).unwrap();
        assert!(store.get("1").unwrap().geometry.0.is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config();
        fs::write(dir.path().join(&cfg.file), SAMPLE).unwrap();
        let store = load_regions(dir.path(), &cfg).unwrap();
        assert_eq!(store.len(), 2);

        let missing = load_regions(&dir.path().join("nope"), &cfg);
        assert!(matches!(missing, Err(DataLoadError::Read { .. })));
    }

    #[test]
    fn test_bad_json_and_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config();
        let path = dir.path().join(&cfg.file);

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_regions(dir.path(), &cfg),
            Err(DataLoadError::Parse { .. })
        ));

        fs::write(&path, r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(matches!(
            load_regions(dir.path(), &cfg),
            Err(DataLoadError::Empty(_))
        ));
    }
}
