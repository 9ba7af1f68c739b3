//! Coordinate reference systems understood by the geolocator.
//!
//! Only the projections that ZIP boundary and transit station files for
//! Southern California actually ship in are supported. Anything else is
//! rejected up front rather than compared in the wrong units.

use geo::Coord;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fmt;

use crate::error::{PipelineError, Result};

/// GRS80 / WGS84 semi-major axis in metres.
const SEMI_MAJOR: f64 = 6_378_137.0;
/// GRS80 inverse flattening.
const INV_FLATTENING: f64 = 298.257_222_101;
/// One US survey foot in metres.
const US_SURVEY_FOOT: f64 = 1200.0 / 3937.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326 / OGC CRS84, longitude-latitude degrees.
    Wgs84,
    /// EPSG:4269, NAD83 geographic degrees. Treated as coincident with WGS84.
    Nad83,
    /// EPSG:3857, spherical web mercator metres.
    WebMercator,
    /// EPSG:2229, NAD83 / California zone 5, US survey feet.
    CaliforniaZone5Ft,
}

impl Crs {
    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 => Ok(Crs::Wgs84),
            4269 => Ok(Crs::Nad83),
            3857 | 900913 => Ok(Crs::WebMercator),
            2229 => Ok(Crs::CaliforniaZone5Ft),
            other => Err(PipelineError::Crs(format!("unsupported CRS EPSG:{other}"))),
        }
    }

    /// Parses names such as `EPSG:2229`, `urn:ogc:def:crs:EPSG::4269`,
    /// `urn:ogc:def:crs:EPSG:6.6:4326` and `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn parse(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.ends_with("CRS84") {
            return Ok(Crs::Wgs84);
        }

        let upper = trimmed.to_ascii_uppercase();
        if !upper.contains("EPSG") {
            return Err(PipelineError::Crs(format!("unrecognised CRS name '{trimmed}'")));
        }
        let code = upper
            .rsplit(':')
            .next()
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| PipelineError::Crs(format!("unrecognised CRS name '{trimmed}'")))?;
        Self::from_epsg(code)
    }

    /// Reads an ESRI `.prj` / OGC WKT1 definition.
    ///
    /// The outermost `AUTHORITY["EPSG", ...]` wins when present. ESRI files
    /// carry no authority, so they are recognised by the names ESRI and GDAL
    /// write for each supported system.
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let wkt = wkt.trim();
        if let Some(code) = outer_epsg_authority(wkt) {
            return Self::from_epsg(code);
        }

        let name: String = wkt
            .to_ascii_uppercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let unsupported = || {
            let head: String = wkt.chars().take(60).collect();
            PipelineError::Crs(format!("unsupported WKT CRS {head}..."))
        };

        if name.starts_with("PROJCS") {
            if ["MERCATOR_AUXILIARY_SPHERE", "PSEUDO_MERCATOR", "POPULAR_VISUALISATION"]
                .iter()
                .any(|n| name.contains(n))
            {
                return Ok(Crs::WebMercator);
            }
            let zone_5 = name.contains("FIPS_0405")
                || name.contains("CALIFORNIA_ZONE_5")
                || name.contains("CALIFORNIA_V_");
            if zone_5 && (name.contains("FEET") || name.contains("FTUS")) {
                return Ok(Crs::CaliforniaZone5Ft);
            }
            Err(unsupported())
        } else if name.starts_with("GEOGCS") {
            if name.contains("WGS_1984") || name.contains("WGS_84") {
                Ok(Crs::Wgs84)
            } else if name.contains("NORTH_AMERICAN_1983") || name.contains("NAD83") {
                Ok(Crs::Nad83)
            } else {
                Err(unsupported())
            }
        } else {
            Err(unsupported())
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::Nad83 => 4269,
            Crs::WebMercator => 3857,
            Crs::CaliforniaZone5Ft => 2229,
        }
    }

    /// Converts a coordinate in this CRS to longitude/latitude degrees.
    pub fn to_lon_lat(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Crs::Wgs84 | Crs::Nad83 => c,
            Crs::WebMercator => Coord {
                x: (c.x / SEMI_MAJOR).to_degrees(),
                y: (2.0 * (c.y / SEMI_MAJOR).exp().atan() - FRAC_PI_2).to_degrees(),
            },
            Crs::CaliforniaZone5Ft => CA_ZONE_5.inverse(c),
        }
    }

    /// Converts longitude/latitude degrees into this CRS.
    pub fn project_lon_lat(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Crs::Wgs84 | Crs::Nad83 => c,
            Crs::WebMercator => Coord {
                x: SEMI_MAJOR * c.x.to_radians(),
                y: SEMI_MAJOR * (FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln(),
            },
            Crs::CaliforniaZone5Ft => CA_ZONE_5.forward(c),
        }
    }

    /// Reprojects `c` from this CRS into `target` via geographic coordinates.
    pub fn transform(&self, c: Coord<f64>, target: Crs) -> Coord<f64> {
        if *self == target {
            return c;
        }
        target.project_lon_lat(self.to_lon_lat(c))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// EPSG code of the outermost WKT1 object. Its `AUTHORITY` is the last one,
/// directly inside the top-level brackets.
fn outer_epsg_authority(wkt: &str) -> Option<u32> {
    const TAG: &str = "AUTHORITY[\"EPSG\"";
    let upper = wkt.to_ascii_uppercase();
    let at = upper.rfind(TAG)?;
    let depth = upper[..at].chars().fold(0i32, |d, c| match c {
        '[' => d + 1,
        ']' => d - 1,
        _ => d,
    });
    if depth != 1 {
        return None;
    }
    let digits: String = upper[at + TAG.len()..]
        .trim_start_matches([',', ' ', '"'])
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Ellipsoidal Lambert conformal conic with two standard parallels.
struct LambertConic {
    lat_1: f64,
    lat_2: f64,
    lat_0: f64,
    lon_0: f64,
    false_easting_ft: f64,
    false_northing_ft: f64,
}

const CA_ZONE_5: LambertConic = LambertConic {
    lat_1: 35.466_666_666_666_67,
    lat_2: 34.033_333_333_333_33,
    lat_0: 33.5,
    lon_0: -118.0,
    false_easting_ft: 2_000_000.0,
    false_northing_ft: 500_000.0,
};

struct ConicParams {
    e: f64,
    n: f64,
    af: f64,
    rho_0: f64,
}

impl LambertConic {
    fn eccentricity() -> f64 {
        let f = 1.0 / INV_FLATTENING;
        (f * (2.0 - f)).sqrt()
    }

    fn m(phi: f64, e: f64) -> f64 {
        phi.cos() / (1.0 - (e * phi.sin()).powi(2)).sqrt()
    }

    fn t(phi: f64, e: f64) -> f64 {
        let es = e * phi.sin();
        (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
    }

    fn params(&self) -> ConicParams {
        let e = Self::eccentricity();
        let (phi_1, phi_2, phi_0) = (
            self.lat_1.to_radians(),
            self.lat_2.to_radians(),
            self.lat_0.to_radians(),
        );
        let (m1, m2) = (Self::m(phi_1, e), Self::m(phi_2, e));
        let (t1, t2) = (Self::t(phi_1, e), Self::t(phi_2, e));
        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let af = SEMI_MAJOR * m1 / (n * t1.powf(n));
        let rho_0 = af * Self::t(phi_0, e).powf(n);
        ConicParams { e, n, af, rho_0 }
    }

    fn forward(&self, c: Coord<f64>) -> Coord<f64> {
        let p = self.params();
        let rho = p.af * Self::t(c.y.to_radians(), p.e).powf(p.n);
        let theta = p.n * (c.x - self.lon_0).to_radians();
        Coord {
            x: self.false_easting_ft + rho * theta.sin() / US_SURVEY_FOOT,
            y: self.false_northing_ft + (p.rho_0 - rho * theta.cos()) / US_SURVEY_FOOT,
        }
    }

    fn inverse(&self, c: Coord<f64>) -> Coord<f64> {
        let p = self.params();
        let x = (c.x - self.false_easting_ft) * US_SURVEY_FOOT;
        let y = p.rho_0 - (c.y - self.false_northing_ft) * US_SURVEY_FOOT;
        let sign = p.n.signum();
        let rho = sign * (x * x + y * y).sqrt();
        let theta = (sign * x).atan2(sign * y);
        let t = (rho / p.af).powf(1.0 / p.n);

        let mut phi = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..15 {
            let es = p.e * phi.sin();
            let next = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(p.e / 2.0)).atan();
            let done = (next - phi).abs() < 1e-12;
            phi = next;
            if done {
                break;
            }
        }

        Coord {
            x: (theta / p.n).to_degrees() + self.lon_0,
            y: phi.to_degrees(),
        }
    }
}
