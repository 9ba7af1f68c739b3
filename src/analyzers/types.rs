//! Data types produced by the analysis stage.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Descriptive statistics for one numeric column, over its non-null values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub(crate) column: String,
    pub(crate) count: usize,
    pub(crate) missing: usize,
    pub(crate) mean: Option<f64>,
    pub(crate) std: Option<f64>,
    pub(crate) min: Option<f64>,
    pub(crate) median: Option<f64>,
    pub(crate) max: Option<f64>,
}

/// Pairwise-complete Pearson correlations. `values[i][j]` pairs
/// `variables[i]` with `variables[j]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub(crate) variables: Vec<String>,
    pub(crate) values: Vec<Vec<Option<f64>>>,
}

/// One regression term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub(crate) term: String,
    pub(crate) estimate: f64,
    pub(crate) std_error: Option<f64>,
    pub(crate) t_value: Option<f64>,
}

/// Ordinary least squares fit of commute time on income and station count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OlsFit {
    pub(crate) dependent: String,
    pub(crate) observations: usize,
    pub(crate) coefficients: Vec<Coefficient>,
    pub(crate) r_squared: Option<f64>,
    pub(crate) adj_r_squared: Option<f64>,
}

/// Everything the analysis stage reports, written as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) rows: usize,
    pub(crate) columns: Vec<ColumnSummary>,
    pub(crate) correlations: CorrelationMatrix,
    pub(crate) has_station_commute_correlation: Option<f64>,
    pub(crate) regression: Option<OlsFit>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.variables.iter().position(|v| v == a)?;
        let j = self.variables.iter().position(|v| v == b)?;
        self.values[i][j]
    }
}

impl OlsFit {
    pub fn coefficient(&self, term: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.term == term)
    }
}

impl AnalysisSummary {
    pub fn rows(&self) -> usize {
        self.rows
    }
}
