//! Vector layer input for the geolocator.
//!
//! Layers are read from GeoJSON or, for paths ending in `.shp`, from an ESRI
//! shapefile. Either way they are reduced to a [`KeyedLayer`]: one geometry
//! per feature plus the single property the caller keys on.

use geojson::{Feature, FeatureCollection, JsonValue};
use std::path::Path;
use tracing::debug;

use crate::crs::Crs;
use crate::error::{PipelineError, Result};
use crate::shp;

#[derive(Debug, Clone)]
pub struct KeyedFeature {
    pub key: Option<String>,
    pub geometry: Option<geo::Geometry<f64>>,
}

#[derive(Debug, Clone)]
pub struct KeyedLayer {
    pub crs: Crs,
    pub features: Vec<KeyedFeature>,
}

/// Reads the layer at `path`, choosing the format by extension.
pub fn read_layer(path: &Path, key_property: &str) -> Result<KeyedLayer> {
    if shp::is_shapefile(path) {
        shp::read_shapefile(path, key_property)
    } else {
        keyed_from_collection(read_feature_collection(path)?, key_property)
    }
}

/// Converts a GeoJSON collection, resolving its declared CRS.
pub fn keyed_from_collection(
    collection: FeatureCollection,
    key_property: &str,
) -> Result<KeyedLayer> {
    let crs = crs_of(&collection)?;
    let mut features = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let key = property_string(&feature, key_property);
        let geometry = match feature.geometry {
            Some(g) => Some(geo::Geometry::<f64>::try_from(g.value)?),
            None => None,
        };
        features.push(KeyedFeature { key, geometry });
    }
    Ok(KeyedLayer { crs, features })
}

pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection> {
    let content = std::fs::read_to_string(path)?;
    let collection: FeatureCollection = content.parse()?;
    debug!(path = %path.display(), features = collection.features.len(), "GeoJSON loaded");
    Ok(collection)
}

/// The CRS a collection declares through the legacy `crs` member.
///
/// RFC 7946 drops that member and fixes coordinates to CRS84, so a missing
/// declaration means WGS84. Exports from desktop GIS tools still write it,
/// typically as `{"type": "name", "properties": {"name": "EPSG:2229"}}`.
pub fn crs_of(collection: &FeatureCollection) -> Result<Crs> {
    let Some(crs) = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
    else {
        return Ok(Crs::Wgs84);
    };

    if crs.get("type").and_then(JsonValue::as_str) != Some("name") {
        return Err(PipelineError::Crs(format!(
            "only named CRS declarations are supported, got {crs}"
        )));
    }
    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| PipelineError::Crs(format!("CRS declaration without a name: {crs}")))?;
    Crs::parse(name)
}

/// A property as text: strings verbatim, numbers and booleans formatted,
/// null or absent as `None`.
pub fn property_string(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
