//! Dataset assembly: left-joins station counts and the two ACS attribute
//! tables onto the ZIP universe.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::acs::{AttributeRow, read_attribute_csv};
use crate::error::Result;
use crate::zip::normalize_zip;

/// One row of the merged dataset. `station_count` is always defined; the two
/// economic fields are null when the source had nothing for the ZIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRow {
    pub zip_code: String,
    pub station_count: u32,
    pub mean_commute_time: Option<f64>,
    pub median_income: Option<f64>,
}

impl FinalRow {
    /// CSV header of the merged and cleaned artifacts.
    pub const HEADER: [&'static str; 4] =
        ["zip_code", "station_count", "mean_commute_time", "median_income"];
}

/// Value per normalized ZIP. The first row for a ZIP wins.
fn index_by_zip(rows: &[AttributeRow]) -> HashMap<String, Option<f64>> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        index
            .entry(normalize_zip(&row.zip_code))
            .or_insert(row.value);
    }
    index
}

/// Builds one [`FinalRow`] per distinct ZIP of `universe`, in universe order.
pub fn assemble(
    universe: &[String],
    station_counts: &BTreeMap<String, u32>,
    commute: &[AttributeRow],
    income: &[AttributeRow],
) -> Vec<FinalRow> {
    let commute = index_by_zip(commute);
    let income = index_by_zip(income);
    let station_counts: HashMap<String, u32> = station_counts
        .iter()
        .map(|(zip, count)| (normalize_zip(zip), *count))
        .collect();

    let mut seen = HashSet::with_capacity(universe.len());
    let rows: Vec<FinalRow> = universe
        .iter()
        .map(|zip| normalize_zip(zip))
        .filter(|zip| seen.insert(zip.clone()))
        .map(|zip| FinalRow {
            station_count: station_counts.get(&zip).copied().unwrap_or(0),
            mean_commute_time: commute.get(&zip).copied().flatten(),
            median_income: income.get(&zip).copied().flatten(),
            zip_code: zip,
        })
        .collect();

    info!(
        zips = rows.len(),
        with_stations = rows.iter().filter(|r| r.station_count > 0).count(),
        with_commute = rows.iter().filter(|r| r.mean_commute_time.is_some()).count(),
        with_income = rows.iter().filter(|r| r.median_income.is_some()).count(),
        "Final dataset assembled"
    );
    rows
}

/// Reads the commute and income artifacts and assembles them with
/// `station_counts` onto `universe`.
#[tracing::instrument(skip(universe, station_counts))]
pub fn build_final_dataset(
    universe: &[String],
    station_counts: &BTreeMap<String, u32>,
    commute_csv: &Path,
    commute_column: &str,
    income_csv: &Path,
    income_column: &str,
) -> Result<Vec<FinalRow>> {
    let commute = read_attribute_csv(commute_csv, commute_column)?;
    let income = read_attribute_csv(income_csv, income_column)?;
    Ok(assemble(universe, station_counts, &commute, &income))
}
