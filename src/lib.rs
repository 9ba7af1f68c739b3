pub mod acs;
pub mod analyzers;
pub mod assemble;
pub mod clean;
pub mod config;
pub mod crosswalk;
pub mod crs;
pub mod error;
pub mod fetch;
pub mod geo_io;
pub mod output;
pub mod pipeline;
pub mod shp;
pub mod stations;
pub mod table;
#[cfg(test)]
mod test_support;
pub mod zip;

pub use error::{PipelineError, Result};
