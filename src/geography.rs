// 🌎 Geography Reference + Geo Joiner
//
// State and county boundaries are loaded once from GeoJSON exports of the
// census cartographic boundary files and never mutated afterwards.
//
// Join keys:
//   states   → STUSPS
//   counties → (STUSPS, NAME)

use crate::db::RegionKey;
use crate::error::{ImpactError, Result};
use crate::join::inner_join;
use crate::metrics::RegionRow;
use crate::scope::Level;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Highest state FIPS kept: the 50 states plus DC, no territories
pub const MAX_STATE_FIPS: u32 = 56;

/// Attribute columns consumed by the join and left out of feature properties
pub const ATTRIBUTE_JOIN_KEYS: [&str; 2] = ["state_code", "county_name"];

// ============================================================================
// BOUNDARIES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub key: RegionKey,
    pub id: Option<geojson::feature::Id>,
    pub geometry: Geometry,
    /// The boundary file's own attributes (GEOID, NAME, STUSPS, ...)
    pub properties: JsonObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySet {
    pub level: Level,
    pub boundaries: Vec<Boundary>,
    /// Features dropped at load: outside the 50 states + DC, or no usable key
    pub skipped: usize,
}

fn string_property(properties: &JsonObject, name: &str) -> Option<String> {
    match properties.get(name)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn fips_property(properties: &JsonObject, name: &str) -> Option<u32> {
    string_property(properties, name)?.trim().parse().ok()
}

impl BoundarySet {
    /// Keep the features of `collection` that belong to the 50 states + DC
    /// and carry the join key for `level`.
    pub fn from_collection(level: Level, collection: FeatureCollection) -> Self {
        let mut boundaries = Vec::with_capacity(collection.features.len());
        let mut skipped = 0;

        for feature in collection.features {
            match Self::boundary_from_feature(level, feature) {
                Some(boundary) => boundaries.push(boundary),
                None => skipped += 1,
            }
        }

        BoundarySet {
            level,
            boundaries,
            skipped,
        }
    }

    fn boundary_from_feature(level: Level, feature: Feature) -> Option<Boundary> {
        let properties = feature.properties?;
        let geometry = feature.geometry?;

        let fips_field = match level {
            Level::State => "GEOID",
            Level::County => "STATEFP",
        };
        if fips_property(&properties, fips_field)? > MAX_STATE_FIPS {
            return None;
        }

        let state_code = string_property(&properties, "STUSPS")?;
        let key = match level {
            Level::State => RegionKey::state(&state_code),
            Level::County => RegionKey::county(&state_code, &string_property(&properties, "NAME")?),
        };

        Some(Boundary {
            key,
            id: feature.id,
            geometry,
            properties,
        })
    }

    pub fn load(level: Level, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ImpactError::Geography(format!("failed to read {}: {}", path.display(), e)))?;

        let geojson: GeoJson = content
            .parse()
            .map_err(|e| ImpactError::Geography(format!("failed to parse {}: {}", path.display(), e)))?;

        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => {
                return Err(ImpactError::Geography(format!(
                    "{} is not a FeatureCollection",
                    path.display()
                )))
            }
        };

        let set = Self::from_collection(level, collection);
        info!(
            level = level.as_str(),
            path = %path.display(),
            boundaries = set.len(),
            skipped = set.skipped,
            "loaded boundaries"
        );
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

/// Both boundary sets, shared read-only by every request
#[derive(Debug, Clone, PartialEq)]
pub struct GeographyReference {
    pub states: BoundarySet,
    pub counties: BoundarySet,
}

impl GeographyReference {
    pub fn load(states_path: &Path, counties_path: &Path) -> Result<Self> {
        Ok(GeographyReference {
            states: BoundarySet::load(Level::State, states_path)?,
            counties: BoundarySet::load(Level::County, counties_path)?,
        })
    }

    pub fn from_collections(states: FeatureCollection, counties: FeatureCollection) -> Self {
        GeographyReference {
            states: BoundarySet::from_collection(Level::State, states),
            counties: BoundarySet::from_collection(Level::County, counties),
        }
    }

    pub fn boundaries(&self, level: Level) -> &BoundarySet {
        match level {
            Level::State => &self.states,
            Level::County => &self.counties,
        }
    }
}

// ============================================================================
// GEO JOIN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoJoin {
    pub collection: FeatureCollection,
    /// Attribute rows with no boundary
    pub unmatched_rows: usize,
    /// Boundaries with no attribute row
    pub unmatched_boundaries: usize,
}

/// Serialize a row into feature properties without its join keys
fn row_properties<R: RegionRow>(row: &R) -> Result<JsonObject> {
    match serde_json::to_value(row)? {
        JsonValue::Object(mut map) => {
            for key in ATTRIBUTE_JOIN_KEYS {
                map.remove(key);
            }
            Ok(map)
        }
        other => Err(ImpactError::validation(format!(
            "attribute row serialized to {} instead of an object",
            other
        ))),
    }
}

/// Inner join of attribute rows onto boundaries.
///
/// Features follow boundary order. Each carries the boundary geometry, the
/// boundary's own properties and every attribute column except
/// `state_code` / `county_name`.
pub fn join_to_geography<R: RegionRow>(rows: &[R], boundaries: &BoundarySet) -> Result<GeoJoin> {
    let attributes = rows
        .iter()
        .map(|row| -> Result<(RegionKey, JsonObject)> { Ok((row.region(), row_properties(row)?)) })
        .collect::<Result<Vec<_>>>()?;

    let outcome = inner_join(
        boundaries.boundaries.iter().collect::<Vec<_>>(),
        attributes,
        |b| b.key.clone(),
        |(key, _)| key.clone(),
        |boundary, (_, attrs)| {
            let mut properties = boundary.properties.clone();
            properties.extend(attrs);
            Feature {
                bbox: None,
                geometry: Some(boundary.geometry.clone()),
                id: boundary.id.clone(),
                properties: Some(properties),
                foreign_members: None,
            }
        },
    );

    if outcome.unmatched_right > 0 {
        warn!(
            level = boundaries.level.as_str(),
            unmatched_rows = outcome.unmatched_right,
            "attribute rows without a boundary were dropped"
        );
    }

    Ok(GeoJoin {
        collection: FeatureCollection {
            bbox: None,
            features: outcome.matched,
            foreign_members: None,
        },
        unmatched_rows: outcome.unmatched_right,
        unmatched_boundaries: outcome.unmatched_left,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{reference, states_collection};
    use super::*;
    use crate::metrics::{EmploymentShareRow, IncomeRow};

    fn share_row(state: &str, county: Option<&str>, total: f64) -> EmploymentShareRow {
        EmploymentShareRow {
            state_code: state.to_string(),
            county_name: county.map(str::to_string),
            total_employment: total,
            industry_employment: total / 10.0,
            current_industry_share: 10.0,
            reduced_industry_share: 8.5,
        }
    }

    #[test]
    fn test_load_filters_territories_and_keyless_features() {
        let geo = reference();

        assert_eq!(geo.states.len(), 3);
        assert_eq!(geo.states.skipped, 1);
        assert!(!geo.states.boundaries.iter().any(|b| b.key == RegionKey::state("PR")));

        assert_eq!(geo.counties.len(), 4);
        assert_eq!(geo.counties.skipped, 1);
        assert!(geo.counties.boundaries.iter().any(|b| b.key == RegionKey::county("TX", "Harris")));
    }

    #[test]
    fn test_state_join_is_inner_both_ways() {
        let geo = reference();
        // NV has a boundary but no row; WA has a row but no boundary
        let rows = vec![share_row("CA", None, 100.0), share_row("TX", None, 200.0), share_row("WA", None, 50.0)];

        let joined = join_to_geography(&rows, geo.boundaries(Level::State)).unwrap();

        assert_eq!(joined.collection.features.len(), 2);
        assert!(joined.collection.features.len() <= rows.len().min(geo.states.len()));
        assert_eq!(joined.unmatched_rows, 1);
        assert_eq!(joined.unmatched_boundaries, 1);
    }

    #[test]
    fn test_feature_properties_drop_join_keys() {
        let geo = reference();
        let rows = vec![share_row("CA", None, 100.0)];

        let joined = join_to_geography(&rows, &geo.states).unwrap();
        let props = joined.collection.features[0].properties.as_ref().unwrap();

        for key in ATTRIBUTE_JOIN_KEYS {
            assert!(!props.contains_key(key), "{} leaked into properties", key);
        }
        assert_eq!(props["STUSPS"], "CA");
        assert_eq!(props["total_employment"], 100.0);
        assert_eq!(props["reduced_industry_share"], 8.5);
        assert!(joined.collection.features[0].geometry.is_some());
    }

    #[test]
    fn test_county_join_uses_state_and_name() {
        let geo = reference();
        let rows = vec![
            share_row("CA", Some("Alameda"), 40.0),
            // Same county name in the wrong state must not match
            share_row("TX", Some("Alameda"), 10.0),
        ];

        let joined = join_to_geography(&rows, &geo.counties).unwrap();

        assert_eq!(joined.collection.features.len(), 1);
        let props = joined.collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props["GEOID"], "06001");
        assert_eq!(joined.unmatched_rows, 1);
    }

    #[test]
    fn test_state_rows_do_not_match_county_boundaries() {
        let geo = reference();
        let joined = join_to_geography(&[share_row("CA", None, 1.0)], &geo.counties).unwrap();
        assert!(joined.collection.features.is_empty());
    }

    #[test]
    fn test_round_trip_recovers_row() {
        let geo = reference();
        let original = vec![share_row("CA", Some("Alameda"), 40.0), share_row("TX", Some("Harris"), 120.0)];

        let joined = join_to_geography(&original, &geo.counties).unwrap();

        for feature in &joined.collection.features {
            let mut props = feature.properties.clone().unwrap();
            let state = props["STUSPS"].clone();
            let name = props["NAME"].clone();
            props.insert("state_code".to_string(), state);
            props.insert("county_name".to_string(), name);

            let recovered: EmploymentShareRow = serde_json::from_value(JsonValue::Object(props)).unwrap();
            assert!(original.contains(&recovered));
        }
    }

    #[test]
    fn test_income_rows_join_with_non_finite_as_null() {
        let geo = reference();
        let row = IncomeRow {
            state_code: "TX".to_string(),
            county_name: None,
            total_income: 100.0,
            population: 0.0,
            industry_wage: 10.0,
            industry_employment: 1.0,
            per_capita_income: f64::INFINITY,
            per_capita_industry_wage: 10.0,
            total_reduced_income: 98.5,
            per_capita_reduced_income: f64::INFINITY,
            change_in_per_capita_income: f64::NAN,
        };

        let joined = join_to_geography(&[row], &geo.states).unwrap();
        let props = joined.collection.features[0].properties.as_ref().unwrap();
        assert!(props["per_capita_income"].is_null());
        assert!(props["change_in_per_capita_income"].is_null());
        assert_eq!(props["per_capita_industry_wage"], 10.0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states.geojson");
        fs::write(&path, GeoJson::from(states_collection()).to_string()).unwrap();

        let set = BoundarySet::load(Level::State, &path).unwrap();
        assert_eq!(set.len(), 3);

        let missing = BoundarySet::load(Level::State, &dir.path().join("nope.geojson")).unwrap_err();
        assert!(matches!(missing, ImpactError::Geography(_)));
    }

    #[test]
    fn test_load_rejects_bare_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("point.geojson");
        fs::write(&path, r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#).unwrap();

        let err = BoundarySet::load(Level::County, &path).unwrap_err();
        assert!(err.to_string().contains("FeatureCollection"));
    }
}
