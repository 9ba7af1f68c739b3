//! Pipeline configuration.
//!
//! Every constant the pipeline depends on lives in [`PipelineConfig`]. The
//! defaults target Los Angeles County; a TOML file can override any subset:
//!
//! ```toml
//! county_code = "059"
//! request_delay_ms = 500
//! commute_csv = "out/orange_commute.csv"
//! ```
//!
//! The Census API key is not part of the file. It is read from the process
//! environment once by the binary and passed around as an [`ApiKey`].

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Environment variable holding the Census API key.
pub const API_KEY_ENV: &str = "CENSUS_API_KEY";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub state_code: String,
    pub county_code: String,

    /// ZCTA to county relationship file, URL or local path.
    pub crosswalk_url: String,

    pub commute_url: String,
    pub commute_variable: String,
    pub income_url: String,
    pub income_variable: String,

    /// Fixed pause between consecutive ACS requests.
    pub request_delay_ms: u64,

    pub commute_csv: PathBuf,
    pub income_csv: PathBuf,
    pub final_csv: PathBuf,
    pub final_clean_csv: PathBuf,
    pub summary_json: PathBuf,
    pub stations_csv: PathBuf,

    /// Station points and ZIP polygons: GeoJSON, or a shapefile when the
    /// path ends in `.shp` (its `.prj` and `.dbf` must sit next to it).
    pub stations_layer: PathBuf,
    pub zcta_layer: PathBuf,
    pub station_id_property: String,
    pub zip_property: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            state_code: "06".to_string(),
            county_code: "037".to_string(),
            crosswalk_url:
                "https://www2.census.gov/geo/docs/maps-data/data/rel/zcta_county_rel_10.txt"
                    .to_string(),
            commute_url: "https://api.census.gov/data/2022/acs/acs5/subject".to_string(),
            commute_variable: "S0801_C02_001E".to_string(),
            income_url: "https://api.census.gov/data/2022/acs/acs5".to_string(),
            income_variable: "B19013_001E".to_string(),
            request_delay_ms: 200,
            commute_csv: PathBuf::from("data/la_county_commute_zips.csv"),
            income_csv: PathBuf::from("data/la_county_income_zips.csv"),
            final_csv: PathBuf::from("data/final_data.csv"),
            final_clean_csv: PathBuf::from("data/final_data_cleaned.csv"),
            summary_json: PathBuf::from("data/analysis_summary.json"),
            stations_csv: PathBuf::from("data/metro_stations.csv"),
            stations_layer: PathBuf::from("data/230711_All_MetroRail_Stations.shp"),
            zcta_layer: PathBuf::from("data/tl_2020_us_zcta520.shp"),
            station_id_property: "STOP_ID".to_string(),
            zip_property: "ZCTA5CE20".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Loads overrides from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.state_code.is_empty() || self.county_code.is_empty() {
            return Err(PipelineError::Config(
                "state_code and county_code must not be empty".into(),
            ));
        }
        if self.commute_variable.is_empty() || self.income_variable.is_empty() {
            return Err(PipelineError::Config(
                "ACS variable codes must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// The Census API access key. `Debug` never prints the value.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Reads the key from [`API_KEY_ENV`]. Empty values count as absent.
    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
