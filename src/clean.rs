//! Post-merge normalization of the final dataset.
//!
//! Cleaning is idempotent and non-destructive: it reads one artifact and
//! writes another, and running it over its own output changes nothing.

use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::utility::median;
use crate::assemble::FinalRow;
use crate::error::Result;
use crate::table::Table;
use crate::zip::normalize_zip;

pub const ZCTA_NAME_COLUMN: &str = "zcta_name";
pub const ZIP_COLUMN: &str = "zip_code";
pub const STATION_COUNT_COLUMN: &str = "station_count";
pub const COMMUTE_COLUMN: &str = "mean_commute_time";
pub const INCOME_COLUMN: &str = "median_income";

/// No real ZIP-level mean commute comes close to this many minutes.
pub const COMMUTE_SANITY_MINUTES: f64 = 100.0;
const COMMUTE_SCALE: f64 = 1000.0;

/// Collapses the display-name columns a join may leave behind into a single
/// `zcta_name`. When both `NAME_x` and `NAME_y` exist the later join
/// (`NAME_y`) wins.
pub fn reconcile_name_columns(table: &mut Table) {
    let has_x = table.has_column("NAME_x");
    let has_y = table.has_column("NAME_y");

    match (has_x, has_y) {
        (true, true) => {
            table.drop_column("NAME_x");
            table.rename("NAME_y", ZCTA_NAME_COLUMN);
        }
        (true, false) => {
            table.rename("NAME_x", ZCTA_NAME_COLUMN);
        }
        (false, true) => {
            table.rename("NAME_y", ZCTA_NAME_COLUMN);
        }
        (false, false) => {
            if !table.has_column(ZCTA_NAME_COLUMN) {
                table.rename("NAME", ZCTA_NAME_COLUMN);
            }
        }
    }
}

/// Divides the whole column by 1000 when the batch median of non-null values
/// exceeds [`COMMUTE_SANITY_MINUTES`]. Returns whether it rescaled.
///
/// The decision is made for the batch, never per row, so a second pass over
/// already-corrected data leaves it untouched.
pub fn fix_commute_units(values: &mut [Option<f64>]) -> bool {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let Some(mid) = median(&present) else {
        return false;
    };
    if mid <= COMMUTE_SANITY_MINUTES {
        return false;
    }
    for value in values.iter_mut().flatten() {
        *value /= COMMUTE_SCALE;
    }
    true
}

/// Replaces non-positive incomes (ACS suppression codes such as
/// `-666666666`) with null. Returns how many values were nulled.
pub fn null_invalid_income(values: &mut [Option<f64>]) -> usize {
    let mut nulled = 0;
    for value in values.iter_mut() {
        if value.is_some_and(|v| v <= 0.0) {
            *value = None;
            nulled += 1;
        }
    }
    nulled
}

fn parse_station_count(cell: &str) -> u32 {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
        .unwrap_or(0)
}

/// Applies every cleaning rule to a merged table.
///
/// Requires `mean_commute_time` and `median_income`. `zip_code` is
/// re-normalized and `station_count` rewritten as a non-null integer when
/// those columns are present.
pub fn clean_table(mut table: Table, source_name: &str) -> Result<Table> {
    reconcile_name_columns(&mut table);

    let commute_idx = table.require_column(COMMUTE_COLUMN, source_name)?;
    let income_idx = table.require_column(INCOME_COLUMN, source_name)?;

    let mut commute = table.numeric_column(commute_idx);
    let rescaled = fix_commute_units(&mut commute);
    table.set_numeric_column(commute_idx, &commute);

    let mut income = table.numeric_column(income_idx);
    let nulled = null_invalid_income(&mut income);
    table.set_numeric_column(income_idx, &income);

    if let Some(zip_idx) = table.column(ZIP_COLUMN) {
        for row in 0..table.len() {
            let zip = normalize_zip(table.cell(row, zip_idx));
            table.set_cell(row, zip_idx, zip);
        }
    }
    if let Some(count_idx) = table.column(STATION_COUNT_COLUMN) {
        for row in 0..table.len() {
            let count = parse_station_count(table.cell(row, count_idx));
            table.set_cell(row, count_idx, count.to_string());
        }
    }

    debug!(rescaled, income_nulled = nulled, rows = table.len(), "Table cleaned");
    Ok(table)
}

/// Typed view of a cleaned table.
pub fn rows_from_table(table: &Table, source_name: &str) -> Result<Vec<FinalRow>> {
    let zip_idx = table.require_column(ZIP_COLUMN, source_name)?;
    let count_idx = table.require_column(STATION_COUNT_COLUMN, source_name)?;
    let commute = table.numeric_column(table.require_column(COMMUTE_COLUMN, source_name)?);
    let income = table.numeric_column(table.require_column(INCOME_COLUMN, source_name)?);

    Ok((0..table.len())
        .map(|row| FinalRow {
            zip_code: normalize_zip(table.cell(row, zip_idx)),
            station_count: parse_station_count(table.cell(row, count_idx)),
            mean_commute_time: commute[row],
            median_income: income[row],
        })
        .collect())
}

/// Cleans the merged artifact at `input` into a new artifact at `output`.
/// `input` is never modified.
#[tracing::instrument]
pub fn clean_final_data(input: &Path, output: &Path) -> Result<Vec<FinalRow>> {
    let source_name = input.display().to_string();
    let table = clean_table(Table::read_csv(input)?, &source_name)?;
    table.write_csv(output)?;
    info!(rows = table.len(), output = %output.display(), "Cleaned dataset written");
    rows_from_table(&table, &source_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> Table {
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn both_name_variants_keep_the_later_one() {
        let mut t = table("zip_code,NAME_x,NAME_y\n90001,old,new\n");
        reconcile_name_columns(&mut t);
        assert_eq!(t.headers(), ["zip_code", "zcta_name"]);
        assert_eq!(t.cell(0, 1), "new");
    }

    #[test]
    fn single_name_variant_is_renamed() {
        let mut t = table("zip_code,NAME_x\n90001,only\n");
        reconcile_name_columns(&mut t);
        assert_eq!(t.headers(), ["zip_code", "zcta_name"]);

        let mut t = table("zip_code,NAME\n90001,bare\n");
        reconcile_name_columns(&mut t);
        assert_eq!(t.headers(), ["zip_code", "zcta_name"]);
    }

    #[test]
    fn scaled_batch_is_divided() {
        let mut values = vec![Some(27300.0), Some(31500.0), None, Some(42100.0)];
        assert!(fix_commute_units(&mut values));
        assert_eq!(values, vec![Some(27.3), Some(31.5), None, Some(42.1)]);
    }

    #[test]
    fn unit_fix_is_idempotent() {
        let mut once = vec![Some(27300.0), Some(31500.0), Some(42100.0)];
        fix_commute_units(&mut once);
        let mut twice = once.clone();
        assert!(!fix_commute_units(&mut twice));
        assert_eq!(once, twice);
    }

    #[test]
    fn single_large_value_in_a_clean_batch_is_left_alone() {
        let mut values = vec![Some(28.0), Some(2730.0), Some(33.0)];
        assert!(!fix_commute_units(&mut values));
        assert_eq!(values[1], Some(2730.0));
    }

    #[test]
    fn all_null_commute_is_untouched() {
        let mut values: Vec<Option<f64>> = vec![None, None];
        assert!(!fix_commute_units(&mut values));
    }

    #[test]
    fn suppression_codes_become_null_not_zero() {
        let mut values = vec![Some(-666_666_666.0), Some(0.0), Some(55_000.0), None];
        assert_eq!(null_invalid_income(&mut values), 2);
        assert_eq!(values, vec![None, None, Some(55_000.0), None]);
    }

    #[test]
    fn clean_table_applies_all_rules() {
        let t = table(
            "zip_code,station_count,mean_commute_time,median_income,NAME_y\n\
             90001,2.0,30100,-666666666,ZCTA5 90001\n\
             2108,,28500,80000,ZCTA5 02108\n\
             90003,0,n/a,abc,ZCTA5 90003\n",
        );
        let cleaned = clean_table(t, "final.csv").unwrap();

        let rows = rows_from_table(&cleaned, "final.csv").unwrap();
        assert_eq!(rows[0].mean_commute_time, Some(30.1));
        assert_eq!(rows[0].median_income, None);
        assert_eq!(rows[0].station_count, 2);
        assert_eq!(rows[1].zip_code, "02108");
        assert_eq!(rows[1].station_count, 0);
        assert_eq!(rows[2].mean_commute_time, None);
        assert_eq!(rows[2].median_income, None);
        assert!(cleaned.has_column("zcta_name"));
        assert_eq!(cleaned.cell(0, 1), "2");
    }

    #[test]
    fn clean_table_twice_equals_once() {
        let t = table(
            "zip_code,station_count,mean_commute_time,median_income\n\
             90001,1,30100,52000\n90002,0,25000,-1\n",
        );
        let once = clean_table(t, "final.csv").unwrap();
        let twice = clean_table(once.clone(), "final.csv").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_income_column_is_an_error() {
        let t = table("zip_code,mean_commute_time\n90001,30\n");
        assert!(clean_table(t, "final.csv").is_err());
    }

    #[test]
    fn clean_final_data_leaves_input_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("final_data.csv");
        let output = dir.path().join("final_data_cleaned.csv");
        let original = "zip_code,station_count,mean_commute_time,median_income\n\
                        90001,1,30100,52000\n90002,0,25000,-666666666\n";
        std::fs::write(&input, original).unwrap();

        let rows = clean_final_data(&input, &output).unwrap();

        assert_eq!(std::fs::read_to_string(&input).unwrap(), original);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].median_income, None);
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.contains("90001,1,30.1,52000"));
    }
}
