use chrono::Utc;
use std::path::Path;
use tracing::info;

use crate::analyzers::describe::{correlations, describe, has_station_correlation};
use crate::analyzers::regression::ols;
use crate::analyzers::types::AnalysisSummary;
use crate::assemble::FinalRow;
use crate::clean::rows_from_table;
use crate::error::Result;
use crate::output::write_json;
use crate::table::Table;

/// Runs every analysis over already-cleaned rows.
pub fn summarize(rows: &[FinalRow]) -> AnalysisSummary {
    let summary = AnalysisSummary {
        generated_at: Utc::now(),
        rows: rows.len(),
        columns: describe(rows),
        correlations: correlations(rows),
        has_station_commute_correlation: has_station_correlation(rows),
        regression: ols(rows),
    };

    for column in &summary.columns {
        info!(
            column = %column.column,
            count = column.count,
            missing = column.missing,
            mean = ?column.mean,
            median = ?column.median,
            "Column summary"
        );
    }
    match &summary.regression {
        Some(fit) => {
            for c in &fit.coefficients {
                info!(
                    term = %c.term,
                    estimate = c.estimate,
                    std_error = ?c.std_error,
                    t = ?c.t_value,
                    "OLS coefficient"
                );
            }
            info!(
                n = fit.observations,
                r_squared = ?fit.r_squared,
                adj_r_squared = ?fit.adj_r_squared,
                "OLS fit"
            );
        }
        None => info!("Not enough complete rows for a regression"),
    }
    summary
}

/// Reads the cleaned artifact at `clean_csv`, analyzes it and writes the
/// summary to `summary_json`.
#[tracing::instrument]
pub fn analyze_file(clean_csv: &Path, summary_json: &Path) -> Result<AnalysisSummary> {
    let table = Table::read_csv(clean_csv)?;
    let rows = rows_from_table(&table, &clean_csv.display().to_string())?;
    let summary = summarize(&rows);
    write_json(summary_json, &summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_file_writes_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clean.csv");
        let output = dir.path().join("summary.json");
        std::fs::write(
            &input,
            "zip_code,station_count,mean_commute_time,median_income\n\
             90001,0,33.1,40000\n90002,1,30.2,55000\n90003,0,29.8,62000\n\
             90004,3,25.9,75000\n90005,2,27.4,90000\n90006,0,,\n",
        )
        .unwrap();

        let summary = analyze_file(&input, &output).unwrap();
        assert_eq!(summary.rows, 6);
        assert_eq!(summary.regression.as_ref().unwrap().observations, 5);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["rows"], 6);
        assert_eq!(json["columns"][0]["column"], "mean_commute_time");
        assert_eq!(json["columns"][0]["missing"], 1);
        assert!(json["regression"]["coefficients"].is_array());
        assert!(json["generated_at"].is_string());
    }

    #[test]
    fn summary_without_regression_serializes_null() {
        let summary = summarize(&[]);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["regression"].is_null());
        assert_eq!(json["rows"], 0);
    }
}
