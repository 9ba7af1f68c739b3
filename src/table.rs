//! A header-aware, all-text CSV table.
//!
//! The cleaner operates on merged artifacts whose exact column set depends on
//! how they were produced, so it works on column names rather than a fixed
//! record type.

use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Rows shorter than `headers` are padded with empty cells. Longer rows
    /// are truncated and a warning names the first such row.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let mut truncated = 0usize;
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                if r.len() > width {
                    if truncated == 0 {
                        warn!(
                            row = i,
                            cells = r.len(),
                            width,
                            "Row wider than header, extra cells dropped"
                        );
                    }
                    truncated += 1;
                }
                r.resize(width, String::new());
                r
            })
            .collect();
        if truncated > 1 {
            warn!(rows = truncated, width, "Rows wider than header were truncated");
        }
        Self { headers, rows }
    }



    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self::new(headers, rows))
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        crate::output::ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn require_column(&self, name: &str, source_name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| PipelineError::missing_column(source_name, name))
    }

    /// Renames `from` to `to`. Returns whether `from` existed.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        match self.column(from) {
            Some(idx) => {
                self.headers[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes the column `name`. Returns whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column(name) else {
            return false;
        };
        self.headers.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        &self.rows[row][col]
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: String) {
        self.rows[row][col] = value;
    }

    /// Parses column `col` as numbers. Blank or non-numeric cells are `None`.
    pub fn numeric_column(&self, col: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|r| r[col].trim().parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect()
    }

    /// Writes `values` back into column `col`; `None` becomes an empty cell.
    pub fn set_numeric_column(&mut self, col: usize, values: &[Option<f64>]) {
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[col] = value.map(|v| v.to_string()).unwrap_or_default();
        }
    }
}
