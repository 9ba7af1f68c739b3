//! ESRI shapefile input.
//!
//! TIGER/Line ZCTA boundaries and the LA Metro rail station layer are
//! published as shapefiles. The CRS comes from the `.prj` sidecar next to the
//! `.shp`; attributes come from the `.dbf`.

use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use std::path::Path;
use tracing::debug;

use crate::crs::Crs;
use crate::error::{PipelineError, Result};
use crate::geo_io::{KeyedFeature, KeyedLayer};

pub fn is_shapefile(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("shp"))
}

/// CRS declared by the `.prj` sidecar of `path`. A shapefile without one
/// cannot be placed and is rejected.
pub fn sidecar_crs(path: &Path) -> Result<Crs> {
    let prj = path.with_extension("prj");
    let wkt = std::fs::read_to_string(&prj)
        .map_err(|e| PipelineError::Crs(format!("cannot read {}: {e}", prj.display())))?;
    Crs::from_wkt(&wkt)
}

pub fn read_shapefile(path: &Path, key_property: &str) -> Result<KeyedLayer> {
    let crs = sidecar_crs(path)?;
    let mut reader = shapefile::Reader::from_path(path)?;

    let mut features = Vec::new();
    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item?;
        features.push(KeyedFeature {
            key: record.get(key_property).and_then(field_string),
            geometry: shape_geometry(shape),
        });
    }

    debug!(path = %path.display(), features = features.len(), crs = %crs, "Shapefile loaded");
    Ok(KeyedLayer { crs, features })
}

/// A `.dbf` attribute as text. Character fields are trimmed of the padding
/// dBase stores them with; blank and null values are `None`.
pub(crate) fn field_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        FieldValue::Numeric(Some(n)) => Some(n.to_string()),
        FieldValue::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

fn ring<P>(ring: &PolygonRing<P>, xy: impl Fn(&P) -> Coord<f64>) -> (bool, LineString<f64>) {
    match ring {
        PolygonRing::Outer(points) => (true, points.iter().map(&xy).collect()),
        PolygonRing::Inner(points) => (false, points.iter().map(&xy).collect()),
    }
}

/// Groups rings in file order: each outer ring opens a polygon and the inner
/// rings after it are its holes. An inner ring with no outer ring before it
/// is kept as a polygon of its own.
pub(crate) fn polygons_from_rings(
    rings: impl IntoIterator<Item = (bool, LineString<f64>)>,
) -> MultiPolygon<f64> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for (outer, line) in rings {
        match (outer, polygons.last_mut()) {
            (false, Some((_, holes))) => holes.push(line),
            _ => polygons.push((line, Vec::new())),
        }
    }
    MultiPolygon::new(
        polygons
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    )
}

/// Points and polygons in any of their M/Z flavours; `None` for everything
/// else, which the layer builders report.
fn shape_geometry(shape: Shape) -> Option<Geometry<f64>> {
    match shape {
        Shape::Point(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::PointM(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::PointZ(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::Polygon(p) => Some(Geometry::MultiPolygon(polygons_from_rings(
            p.rings()
                .iter()
                .map(|r| ring(r, |pt: &shapefile::Point| Coord { x: pt.x, y: pt.y })),
        ))),
        Shape::PolygonM(p) => Some(Geometry::MultiPolygon(polygons_from_rings(
            p.rings()
                .iter()
                .map(|r| ring(r, |pt: &shapefile::PointM| Coord { x: pt.x, y: pt.y })),
        ))),
        Shape::PolygonZ(p) => Some(Geometry::MultiPolygon(polygons_from_rings(
            p.rings()
                .iter()
                .map(|r| ring(r, |pt: &shapefile::PointZ| Coord { x: pt.x, y: pt.y })),
        ))),
        _ => None,
    }
}
