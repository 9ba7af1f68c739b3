//! American Community Survey attribute fetcher.
//!
//! One parameterized fetcher serves every ZIP-level ACS variable. It issues a
//! single request per ZIP code, in order, with a fixed pause between requests,
//! and always yields one row per input ZIP. A ZIP whose request fails or
//! returns an unusable payload gets a placeholder row with a null value.
//!
//! The pause is a courtesy rate limit only: there is no retry and no backoff
//! on 429 or 5xx answers.

use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::fetch::{HttpClient, get_request};
use crate::zip::normalize_zip;

/// Column holding the ACS display name in attribute artifacts.
pub const NAME_COLUMN: &str = "NAME";
pub const ZIP_COLUMN: &str = "zip_code";

/// An ACS estimate and the column it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct AcsVariable {
    pub code: String,
    pub column: String,
    /// Fixed correction applied after numeric coercion.
    pub scale_divisor: Option<f64>,
}

impl AcsVariable {
    /// Mean travel time to work. The subject table returns this estimate
    /// thousand-scaled, so it is divided by 1000.
    pub fn mean_commute(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            column: "mean_commute_minutes".to_string(),
            scale_divisor: Some(1000.0),
        }
    }

    pub fn median_household_income(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            column: "median_household_income".to_string(),
            scale_divisor: None,
        }
    }
}

/// An ACS endpoint paired with the variable queried from it.
#[derive(Debug, Clone)]
pub struct AcsSource {
    pub url: String,
    pub variable: AcsVariable,
}

/// One fetched ZIP: display name, numeric value (or null) and the input ZIP.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub name: String,
    pub value: Option<f64>,
    pub zip_code: String,
}

impl AttributeRow {
    /// The row recorded for a ZIP whose request produced nothing usable.
    pub fn placeholder(zip: &str) -> Self {
        Self {
            name: format!("ZCTA5 {zip}"),
            value: None,
            zip_code: zip.to_string(),
        }
    }
}

/// Coerces an ACS cell to a number. Strings are parsed, numbers pass through,
/// everything else (and non-finite results) is null.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Extracts `(name, value)` from an ACS JSON payload.
///
/// A usable payload is an array of arrays: a header row followed by a data
/// row whose first two cells are the display name and the estimate. Returns
/// `None` for anything shorter or not decodable.
pub fn parse_payload(body: &[u8]) -> Option<(String, Option<f64>)> {
    let table: Vec<Vec<Value>> = serde_json::from_slice(body).ok()?;
    let row = table.get(1)?;
    if row.len() < 2 {
        return None;
    }
    let name = match &row[0] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some((name, coerce_numeric(&row[1])))
}

async fn fetch_one<C: HttpClient>(client: &C, source: &AcsSource, zip: &str) -> AttributeRow {
    let get = format!("{NAME_COLUMN},{}", source.variable.code);
    let geography = format!("zip code tabulation area:{zip}");

    let params = [("get", get.as_str()), ("for", geography.as_str())];
    let req = match get_request(&source.url, &params) {
        Ok(req) => req,
        Err(e) => {
            warn!(zip, error = %e, "ACS request could not be built");
            return AttributeRow::placeholder(zip);
        }
    };

    let resp = match client.execute(req).await {
        Ok(resp) => resp,
        Err(e) => {
            // The URL carries the API key.
            warn!(zip, error = %e.without_url(), "ACS request failed");
            return AttributeRow::placeholder(zip);
        }
    };

    let status = resp.status();
    if !status.is_success() {
        warn!(zip, status = status.as_u16(), "ACS returned an error status");
        return AttributeRow::placeholder(zip);
    }

    let body = match resp.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!(zip, error = %e.without_url(), "ACS response body could not be read");
            return AttributeRow::placeholder(zip);
        }
    };

    match parse_payload(&body) {
        Some((name, value)) => {
            debug!(zip, ?value, "ACS value received");
            AttributeRow {
                name,
                value,
                zip_code: zip.to_string(),
            }
        }
        None => {
            warn!(zip, bytes = body.len(), "ACS payload malformed or empty");
            AttributeRow::placeholder(zip)
        }
    }
}

/// Fetches `source.variable` for every ZIP in `zips`.
///
/// Returns exactly `zips.len()` rows in input order. `delay` is slept between
/// consecutive requests. The variable's scale divisor, if any, is applied
/// once the whole batch has been collected.
#[tracing::instrument(
    skip(client, zips),
    fields(url = %source.url, variable = %source.variable.code, zips = zips.len())
)]
pub async fn fetch_attribute<C: HttpClient>(
    client: &C,
    source: &AcsSource,
    zips: &[String],
    delay: Duration,
) -> Vec<AttributeRow> {
    let mut rows = Vec::with_capacity(zips.len());

    for (i, zip) in zips.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        rows.push(fetch_one(client, source, zip).await);
    }

    if let Some(divisor) = source.variable.scale_divisor {
        for row in &mut rows {
            row.value = row.value.map(|v| v / divisor);
        }
    }

    let missing = rows.iter().filter(|r| r.value.is_none()).count();
    info!(
        total = rows.len(),
        with_value = rows.len() - missing,
        missing,
        "ACS attribute fetch complete"
    );
    rows
}

/// Writes attribute rows with header `NAME,<column>,zip_code`.
pub fn write_attribute_csv(path: &Path, column: &str, rows: &[AttributeRow]) -> Result<()> {
    crate::output::ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([NAME_COLUMN, column, ZIP_COLUMN])?;
    for row in rows {
        let value = row.value.map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([row.name.as_str(), value.as_str(), row.zip_code.as_str()])?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "Attribute CSV written");
    Ok(())
}

/// Reads an attribute artifact back, keyed by normalized `zip_code`.
///
/// `column` must be present; a missing `NAME` column yields placeholder names.
/// Non-numeric cells become null.
pub fn read_attribute_csv(path: &Path, column: &str) -> Result<Vec<AttributeRow>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let source_name = path.display().to_string();

    let position = |name: &str| headers.iter().position(|h| h == name);
    let zip_idx = position(ZIP_COLUMN)
        .ok_or_else(|| PipelineError::missing_column(&source_name, ZIP_COLUMN))?;
    let value_idx =
        position(column).ok_or_else(|| PipelineError::missing_column(&source_name, column))?;
    let name_idx = position(NAME_COLUMN);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let zip_code = normalize_zip(record.get(zip_idx).unwrap_or_default());
        let value = record
            .get(value_idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite());
        let name = name_idx
            .and_then(|i| record.get(i))
            .map(str::to_string)
            .unwrap_or_else(|| format!("ZCTA5 {zip_code}"));
        rows.push(AttributeRow {
            name,
            value,
            zip_code,
        });
    }
    Ok(rows)
}
