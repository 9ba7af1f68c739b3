//! Station geolocation: assigns transit stations to the ZIP polygon that
//! contains them and counts stations per ZIP.
//!
//! Both layers carry their CRS. Points are reprojected into the polygon CRS
//! before any containment test, and [`assign_stations`] refuses to compare
//! layers whose CRS differ.

use geo::{BoundingRect, Contains, Coord, MultiPolygon, Point, Rect};
use geojson::FeatureCollection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::crs::Crs;
use crate::error::{PipelineError, Result};
use crate::geo_io::{KeyedLayer, keyed_from_collection, read_layer};
use crate::zip::normalize_zip;

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: Option<String>,
    pub point: Point<f64>,
}

#[derive(Debug, Clone)]
pub struct StationLayer {
    pub crs: Crs,
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone)]
pub struct ZipPolygon {
    pub zip_code: String,
    pub geometry: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl ZipPolygon {
    pub fn new(zip_code: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        let bbox = geometry.bounding_rect();
        Self {
            zip_code: zip_code.into(),
            geometry,
            bbox,
        }
    }

    /// Strict interior containment: a point on the boundary is not contained.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        let Some(bbox) = self.bbox else {
            return false;
        };
        let (min, max) = (bbox.min(), bbox.max());
        if point.x() < min.x || point.x() > max.x || point.y() < min.y || point.y() > max.y {
            return false;
        }
        self.geometry.contains(point)
    }
}

#[derive(Debug, Clone)]
pub struct ZipLayer {
    pub crs: Crs,
    pub polygons: Vec<ZipPolygon>,
}

/// Where one station landed. `zip_code` is `None` for stations outside every
/// polygon or exactly on a boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct StationAssignment {
    pub station_id: Option<String>,
    pub zip_code: Option<String>,
}

impl StationLayer {
    /// Builds the layer from point features. Features without a point
    /// geometry are skipped.
    pub fn from_layer(layer: KeyedLayer) -> Self {
        let mut stations = Vec::with_capacity(layer.features.len());
        let mut skipped = 0usize;

        for feature in layer.features {
            match feature.geometry {
                Some(geo::Geometry::Point(point)) => stations.push(Station {
                    id: feature.key,
                    point,
                }),
                _ => {
                    skipped += 1;
                    warn!(
                        station_id = ?feature.key,
                        "Station feature has no point geometry, skipping"
                    );
                }
            }
        }

        info!(stations = stations.len(), skipped, crs = %layer.crs, "Station layer loaded");
        Self {
            crs: layer.crs,
            stations,
        }
    }

    pub fn from_collection(collection: FeatureCollection, id_property: &str) -> Result<Self> {
        Ok(Self::from_layer(keyed_from_collection(collection, id_property)?))
    }

    /// Returns a copy with every point reprojected into `target`.
    pub fn to_crs(&self, target: Crs) -> Self {
        if self.crs == target {
            return self.clone();
        }
        let stations = self
            .stations
            .iter()
            .map(|s| Station {
                id: s.id.clone(),
                point: Point::from(self.crs.transform(Coord::from(s.point), target)),
            })
            .collect();
        Self {
            crs: target,
            stations,
        }
    }
}

impl ZipLayer {
    /// Builds the layer from Polygon / MultiPolygon features keyed by their
    /// ZIP code. Any other geometry type is an error.
    pub fn from_layer(layer: KeyedLayer) -> Result<Self> {
        let mut polygons = Vec::with_capacity(layer.features.len());

        for feature in layer.features {
            let Some(zip) = feature.key else {
                warn!("ZIP polygon without a ZIP code, skipping");
                continue;
            };
            let zip = normalize_zip(&zip);
            let multi = match feature.geometry {
                Some(geo::Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
                Some(geo::Geometry::MultiPolygon(mp)) => mp,
                Some(_) => {
                    return Err(PipelineError::Geometry(format!(
                        "ZIP {zip} is not a polygon"
                    )));
                }
                None => {
                    warn!(zip = %zip, "ZIP feature without geometry, skipping");
                    continue;
                }
            };
            polygons.push(ZipPolygon::new(zip, multi));
        }

        info!(polygons = polygons.len(), crs = %layer.crs, "ZIP polygon layer loaded");
        Ok(Self {
            crs: layer.crs,
            polygons,
        })
    }

    pub fn from_collection(collection: FeatureCollection, zip_property: &str) -> Result<Self> {
        Self::from_layer(keyed_from_collection(collection, zip_property)?)
    }
}

/// Reads stations from GeoJSON, or from a shapefile when `path` ends in `.shp`.
pub fn load_stations(path: &Path, id_property: &str) -> Result<StationLayer> {
    Ok(StationLayer::from_layer(read_layer(path, id_property)?))
}

/// Reads ZIP polygons from GeoJSON, or from a shapefile when `path` ends in
/// `.shp`.
pub fn load_zip_polygons(path: &Path, zip_property: &str) -> Result<ZipLayer> {
    ZipLayer::from_layer(read_layer(path, zip_property)?)
}

/// Assigns every station to the first ZIP polygon that strictly contains it.
///
/// Fails with [`PipelineError::Crs`] when the layers are in different CRS.
pub fn assign_stations(stations: &StationLayer, zips: &ZipLayer) -> Result<Vec<StationAssignment>> {
    if stations.crs != zips.crs {
        return Err(PipelineError::Crs(format!(
            "station layer is {} but ZIP layer is {}; reproject before joining",
            stations.crs, zips.crs
        )));
    }

    let assignments: Vec<StationAssignment> = stations
        .stations
        .iter()
        .map(|station| StationAssignment {
            station_id: station.id.clone(),
            zip_code: zips
                .polygons
                .iter()
                .find(|p| p.contains(&station.point))
                .map(|p| p.zip_code.clone()),
        })
        .collect();

    let unlocated = assignments.iter().filter(|a| a.zip_code.is_none()).count();
    if unlocated > 0 {
        warn!(unlocated, "Stations outside every ZIP polygon");
    }
    Ok(assignments)
}

/// Counts located stations per ZIP. ZIPs without stations are absent.
pub fn count_by_zip(assignments: &[StationAssignment]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for zip in assignments.iter().filter_map(|a| a.zip_code.as_ref()) {
        *counts.entry(zip.clone()).or_insert(0) += 1;
    }
    counts
}

/// Result of locating a station layer against ZIP polygons.
#[derive(Debug, Clone)]
pub struct Geolocation {
    pub stations: StationLayer,
    pub assignments: Vec<StationAssignment>,
    pub counts: BTreeMap<String, u32>,
}

/// Loads both layers, reprojects stations into the polygon CRS, assigns and
/// counts.
#[tracing::instrument]
pub fn geolocate(
    stations_path: &Path,
    zcta_path: &Path,
    id_property: &str,
    zip_property: &str,
) -> Result<Geolocation> {
    let zips = load_zip_polygons(zcta_path, zip_property)?;
    let stations = load_stations(stations_path, id_property)?.to_crs(zips.crs);
    let assignments = assign_stations(&stations, &zips)?;
    let counts = count_by_zip(&assignments);

    info!(
        stations = assignments.len(),
        zips_with_stations = counts.len(),
        "Stations geolocated"
    );
    Ok(Geolocation {
        stations,
        assignments,
        counts,
    })
}

#[derive(Debug, Serialize)]
struct StationExportRow<'a> {
    station_id: Option<&'a str>,
    lon: f64,
    lat: f64,
}

const STATION_EXPORT_HEADER: [&str; 3] = ["station_id", "lon", "lat"];

/// Writes `station_id,lon,lat` in WGS84 degrees, whatever the source CRS.
pub fn export_stations(path: &Path, layer: &StationLayer) -> Result<()> {
    let geographic = layer.to_crs(Crs::Wgs84);
    let rows: Vec<StationExportRow<'_>> = geographic
        .stations
        .iter()
        .map(|s| StationExportRow {
            station_id: s.id.as_deref(),
            lon: s.point.x(),
            lat: s.point.y(),
        })
        .collect();
    crate::output::write_records(path, &STATION_EXPORT_HEADER, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two unit-ish squares sharing the meridian lon = -118.2.
    fn zip_layer() -> ZipLayer {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"ZCTA5CE20":"90012"},
             "geometry":{"type":"Polygon","coordinates":[[[-118.3,34.0],[-118.2,34.0],[-118.2,34.1],[-118.3,34.1],[-118.3,34.0]]]}},
            {"type":"Feature","properties":{"ZCTA5CE20":"90033"},
             "geometry":{"type":"MultiPolygon","coordinates":[[[[-118.2,34.0],[-118.1,34.0],[-118.1,34.1],[-118.2,34.1],[-118.2,34.0]]]]}}
        ]}"#;
        ZipLayer::from_collection(json.parse().unwrap(), "ZCTA5CE20").unwrap()
    }

    fn station_layer(points: &[(&str, f64, f64)], crs_name: Option<&str>) -> StationLayer {
        let features: Vec<String> = points
            .iter()
            .map(|(id, x, y)| {
                format!(
                    r#"{{"type":"Feature","properties":{{"STOP_ID":"{id}"}},"geometry":{{"type":"Point","coordinates":[{x},{y}]}}}}"#
                )
            })
            .collect();
        let crs = crs_name
            .map(|n| format!(r#""crs":{{"type":"name","properties":{{"name":"{n}"}}}},"#))
            .unwrap_or_default();
        let json = format!(
            r#"{{"type":"FeatureCollection",{crs}"features":[{}]}}"#,
            features.join(",")
        );
        StationLayer::from_collection(json.parse().unwrap(), "STOP_ID").unwrap()
    }

    #[test]
    fn stations_are_assigned_to_containing_polygon() {
        let stations = station_layer(
            &[("a", -118.25, 34.05), ("b", -118.15, 34.05), ("c", -118.26, 34.02)],
            None,
        );
        let assignments = assign_stations(&stations, &zip_layer()).unwrap();
        let zips: Vec<Option<&str>> = assignments.iter().map(|a| a.zip_code.as_deref()).collect();
        assert_eq!(zips, vec![Some("90012"), Some("90033"), Some("90012")]);
    }

    #[test]
    fn boundary_and_outside_points_are_unassigned() {
        let stations = station_layer(&[("edge", -118.2, 34.05), ("far", -117.0, 33.0)], None);
        let assignments = assign_stations(&stations, &zip_layer()).unwrap();
        assert!(assignments.iter().all(|a| a.zip_code.is_none()));
        assert!(count_by_zip(&assignments).is_empty());
    }

    #[test]
    fn counts_skip_unlocated_and_omit_empty_zips() {
        let stations = station_layer(
            &[("a", -118.25, 34.05), ("b", -118.22, 34.07), ("c", -117.0, 33.0)],
            None,
        );
        let counts = count_by_zip(&assign_stations(&stations, &zip_layer()).unwrap());
        assert_eq!(counts.get("90012"), Some(&2));
        assert_eq!(counts.get("90033"), None);
        assert_eq!(counts.values().sum::<u32>(), 2);
    }

    #[test]
    fn mismatched_crs_is_refused() {
        let stations = station_layer(&[("a", 6_480_000.0, 1_840_000.0)], Some("EPSG:2229"));
        let err = assign_stations(&stations, &zip_layer()).unwrap_err();
        assert!(matches!(err, PipelineError::Crs(_)));
    }

    #[test]
    fn projected_stations_are_located_after_reprojection() {
        let inside = Crs::Wgs84.transform(Coord { x: -118.25, y: 34.05 }, Crs::CaliforniaZone5Ft);
        let other = Crs::Wgs84.transform(Coord { x: -118.15, y: 34.05 }, Crs::CaliforniaZone5Ft);
        let stations = station_layer(
            &[("a", inside.x, inside.y), ("b", other.x, other.y)],
            Some("urn:ogc:def:crs:EPSG::2229"),
        );
        assert_eq!(stations.crs, Crs::CaliforniaZone5Ft);

        let zips = zip_layer();
        let assignments = assign_stations(&stations.to_crs(zips.crs), &zips).unwrap();
        assert_eq!(assignments[0].zip_code.as_deref(), Some("90012"));
        assert_eq!(assignments[1].zip_code.as_deref(), Some("90033"));
    }

    #[test]
    fn non_point_station_features_are_skipped() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"STOP_ID":1},"geometry":null},
            {"type":"Feature","properties":{"STOP_ID":2},"geometry":{"type":"Point","coordinates":[-118.25,34.05]}}
        ]}"#;
        let layer = StationLayer::from_collection(json.parse().unwrap(), "STOP_ID").unwrap();
        assert_eq!(layer.stations.len(), 1);
        assert_eq!(layer.stations[0].id.as_deref(), Some("2"));
    }

    #[test]
    fn non_polygon_zip_feature_is_an_error() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"ZCTA5CE20":"90012"},"geometry":{"type":"Point","coordinates":[0,0]}}
        ]}"#;
        let err = ZipLayer::from_collection(json.parse().unwrap(), "ZCTA5CE20").unwrap_err();
        assert!(matches!(err, PipelineError::Geometry(_)));
    }

    #[test]
    fn export_writes_wgs84_coordinates() {
        let projected = Crs::Wgs84.transform(Coord { x: -118.25, y: 34.05 }, Crs::WebMercator);
        let layer = station_layer(&[("80214", projected.x, projected.y)], Some("EPSG:3857"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.csv");
        export_stations(&path, &layer).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let record = rdr.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "80214");
        let lon: f64 = record[1].parse().unwrap();
        let lat: f64 = record[2].parse().unwrap();
        assert!((lon + 118.25).abs() < 1e-9);
        assert!((lat - 34.05).abs() < 1e-9);
    }

    #[test]
    fn geolocate_reads_files_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let stations_path = dir.path().join("stations.geojson");
        let zcta_path = dir.path().join("zcta.geojson");
        std::fs::write(
            &stations_path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"STOP_ID":"a"},"geometry":{"type":"Point","coordinates":[-118.25,34.05]}}
            ]}"#,
        )
        .unwrap();
        std::fs::write(
            &zcta_path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"ZCTA5CE20":"90012"},
                 "geometry":{"type":"Polygon","coordinates":[[[-118.3,34.0],[-118.2,34.0],[-118.2,34.1],[-118.3,34.1],[-118.3,34.0]]]}}
            ]}"#,
        )
        .unwrap();

        let located = geolocate(&stations_path, &zcta_path, "STOP_ID", "ZCTA5CE20").unwrap();
        assert_eq!(located.counts.get("90012"), Some(&1));
        assert_eq!(located.stations.crs, Crs::Wgs84);
    }
}
