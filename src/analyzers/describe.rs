use crate::analyzers::types::{ColumnSummary, CorrelationMatrix};
use crate::analyzers::utility::{mean, median, pearson, sample_stddev};
use crate::assemble::FinalRow;

/// Variables analyzed, in report order.
pub(crate) static VARIABLES: &[&str] = &["mean_commute_time", "median_income", "station_count"];

pub(crate) fn variable(row: &FinalRow, name: &str) -> Option<f64> {
    match name {
        "mean_commute_time" => row.mean_commute_time,
        "median_income" => row.median_income,
        "station_count" => Some(row.station_count as f64),
        _ => None,
    }
}

fn summarize_column(rows: &[FinalRow], name: &str) -> ColumnSummary {
    let values: Vec<f64> = rows.iter().filter_map(|r| variable(r, name)).collect();
    let (min, max) = if values.is_empty() {
        (None, None)
    } else {
        (
            values.iter().copied().reduce(f64::min),
            values.iter().copied().reduce(f64::max),
        )
    };

    ColumnSummary {
        column: name.to_string(),
        count: values.len(),
        missing: rows.len() - values.len(),
        mean: (!values.is_empty()).then(|| mean(&values)),
        std: sample_stddev(&values),
        min,
        median: median(&values),
        max,
    }
}

/// Count, mean, sample deviation, min, median and max per variable.
pub fn describe(rows: &[FinalRow]) -> Vec<ColumnSummary> {
    VARIABLES
        .iter()
        .map(|name| summarize_column(rows, name))
        .collect()
}

fn paired(rows: &[FinalRow], a: &str, b: &str) -> (Vec<f64>, Vec<f64>) {
    rows.iter()
        .filter_map(|r| Some((variable(r, a)?, variable(r, b)?)))
        .unzip()
}

/// Pearson correlations over rows where both variables are present.
pub fn correlations(rows: &[FinalRow]) -> CorrelationMatrix {
    let values = VARIABLES
        .iter()
        .map(|a| {
            VARIABLES
                .iter()
                .map(|b| {
                    let (xs, ys) = paired(rows, a, b);
                    pearson(&xs, &ys)
                })
                .collect()
        })
        .collect();

    CorrelationMatrix {
        variables: VARIABLES.iter().map(|v| v.to_string()).collect(),
        values,
    }
}

/// Correlation between "ZIP has at least one station" and commute time.
pub fn has_station_correlation(rows: &[FinalRow]) -> Option<f64> {
    let (flags, commute): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|r| {
            let has_station = if r.station_count > 0 { 1.0 } else { 0.0 };
            Some((has_station, r.mean_commute_time?))
        })
        .unzip();
    pearson(&flags, &commute)
}
