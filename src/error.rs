//! Error taxonomy for the dataset pipeline.
//!
//! Stage-level failures (a reference download that does not succeed, an
//! unreadable artifact, an unsupported projection) surface as
//! [`PipelineError`] and halt the stage. Record-level failures inside the
//! ACS fetcher never reach this type; they become placeholder rows.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A reference or geometry download answered with a non-2xx status.
    #[error("download failed for {url}: HTTP {status}")]
    Download { url: String, status: StatusCode },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// A tabular input lacks a column the stage depends on.
    #[error("{source_name} is missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },

    #[error("CRS error: {0}")]
    Crs(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PipelineError {
    pub(crate) fn missing_column(source_name: impl Into<String>, column: &str) -> Self {
        PipelineError::MissingColumn {
            source_name: source_name.into(),
            column: column.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
