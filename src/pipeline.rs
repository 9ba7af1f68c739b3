//! Stage orchestration.
//!
//! Each stage reads its inputs from the previous stage's artifacts and writes
//! its own, so stages can be run one at a time from the CLI or chained by
//! [`run_all`]. Execution is strictly sequential.

use std::collections::BTreeMap;
use tracing::info;

use crate::acs::{AcsSource, AcsVariable, AttributeRow, fetch_attribute, write_attribute_csv};
use crate::analyzers::analyzer::analyze_file;
use crate::analyzers::types::AnalysisSummary;
use crate::assemble::{FinalRow, build_final_dataset};
use crate::clean::clean_final_data;
use crate::config::PipelineConfig;
use crate::crosswalk::load_county_zips;
use crate::error::Result;
use crate::fetch::HttpClient;
use crate::output::write_records;
use crate::stations::{Geolocation, export_stations, geolocate};

pub fn commute_source(config: &PipelineConfig) -> AcsSource {
    AcsSource {
        url: config.commute_url.clone(),
        variable: AcsVariable::mean_commute(&config.commute_variable),
    }
}

pub fn income_source(config: &PipelineConfig) -> AcsSource {
    AcsSource {
        url: config.income_url.clone(),
        variable: AcsVariable::median_household_income(&config.income_variable),
    }
}

/// Loads the county's ZIP universe from the crosswalk.
pub async fn zip_universe<C: HttpClient>(
    client: &C,
    config: &PipelineConfig,
) -> Result<Vec<String>> {
    let zips = load_county_zips(
        client,
        &config.crosswalk_url,
        &config.state_code,
        &config.county_code,
    )
    .await?;
    info!(zips = zips.len(), "ZIP universe loaded");
    Ok(zips)
}

/// Fetches `source` for `zips` and writes the attribute artifact.
pub async fn fetch_and_write<C: HttpClient>(
    client: &C,
    config: &PipelineConfig,
    source: &AcsSource,
    zips: &[String],
    path: &std::path::Path,
) -> Result<Vec<AttributeRow>> {
    let rows = fetch_attribute(client, source, zips, config.request_delay()).await;
    write_attribute_csv(path, &source.variable.column, &rows)?;
    Ok(rows)
}

/// Locates stations in ZIP polygons and exports the station list.
pub fn locate_stations(config: &PipelineConfig) -> Result<Geolocation> {
    let located = geolocate(
        &config.stations_layer,
        &config.zcta_layer,
        &config.station_id_property,
        &config.zip_property,
    )?;
    export_stations(&config.stations_csv, &located.stations)?;
    Ok(located)
}

/// Assembles the merged dataset from the attribute artifacts and writes it.
pub fn build(
    config: &PipelineConfig,
    universe: &[String],
    station_counts: &BTreeMap<String, u32>,
) -> Result<Vec<FinalRow>> {
    let rows = build_final_dataset(
        universe,
        station_counts,
        &config.commute_csv,
        &commute_source(config).variable.column,
        &config.income_csv,
        &income_source(config).variable.column,
    )?;
    write_records(&config.final_csv, &FinalRow::HEADER, &rows)?;
    Ok(rows)
}

pub fn clean(config: &PipelineConfig) -> Result<Vec<FinalRow>> {
    clean_final_data(&config.final_csv, &config.final_clean_csv)
}

pub fn analyze(config: &PipelineConfig) -> Result<AnalysisSummary> {
    analyze_file(&config.final_clean_csv, &config.summary_json)
}

/// Runs every stage in order. Any stage-level error stops the run.
///
/// `download` fetches the crosswalk; `acs` queries the Census API and is the
/// only client that should carry the API key.
#[tracing::instrument(skip(download, acs, config))]
pub async fn run_all<D: HttpClient, A: HttpClient>(
    download: &D,
    acs: &A,
    config: &PipelineConfig,
) -> Result<AnalysisSummary> {
    let universe = zip_universe(download, config).await?;

    let commute = commute_source(config);
    fetch_and_write(acs, config, &commute, &universe, &config.commute_csv).await?;
    let income = income_source(config);
    fetch_and_write(acs, config, &income, &universe, &config.income_csv).await?;

    let located = locate_stations(config)?;
    build(config, &universe, &located.counts)?;
    clean(config)?;
    analyze(config)
}
