//! ZCTA to county crosswalk.
//!
//! The Census relationship file lists one row per (ZCTA, county) overlap, so a
//! ZCTA straddling two counties appears twice. The loader reduces it to the
//! distinct set of ZCTAs touching one target county: the ZIP universe every
//! downstream table is joined against.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::fetch::{HttpClient, read_source};
use crate::zip::normalize_zip;

const REQUIRED_COLUMNS: [&str; 3] = ["ZCTA5", "STATE", "COUNTY"];

#[derive(Debug, Deserialize)]
struct CrosswalkRecord {
    #[serde(rename = "ZCTA5")]
    zcta: String,
    #[serde(rename = "STATE")]
    state: String,
    #[serde(rename = "COUNTY")]
    county: String,
}

/// Parses the comma-delimited crosswalk and returns the distinct ZCTAs of
/// `state`/`county`, each exactly once, in first-seen order.
pub fn parse_crosswalk(bytes: &[u8], state: &str, county: &str) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(PipelineError::missing_column("crosswalk", column));
        }
    }

    let mut seen = HashSet::new();
    let mut zips = Vec::new();
    let mut rows = 0usize;

    for result in rdr.deserialize() {
        let record: CrosswalkRecord = result?;
        rows += 1;
        if record.state != state || record.county != county {
            continue;
        }
        let zip = normalize_zip(&record.zcta);
        if seen.insert(zip.clone()) {
            zips.push(zip);
        }
    }

    info!(rows, matched = zips.len(), state, county, "Crosswalk filtered");
    Ok(zips)
}

/// Downloads (or reads) the crosswalk and returns the county's ZIP universe.
///
/// A non-2xx response is returned as [`PipelineError::Download`]; nothing is
/// retried.
#[tracing::instrument(skip(client))]
pub async fn load_county_zips<C: HttpClient>(
    client: &C,
    source: &str,
    state: &str,
    county: &str,
) -> Result<Vec<String>> {
    let bytes = read_source(client, source).await?;
    parse_crosswalk(&bytes, state, county)
}

/// Writes the ZIP universe as a single-column `zip_code` CSV.
pub fn write_zip_universe(path: &Path, zips: &[String]) -> Result<()> {
    crate::output::ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["zip_code"])?;
    for zip in zips {
        writer.write_record([zip])?;
    }
    writer.flush()?;
    Ok(())
}
