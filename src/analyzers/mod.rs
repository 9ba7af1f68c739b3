//! Analysis of the cleaned ZIP-level dataset.
//!
//! This module computes descriptive statistics and pairwise correlations,
//! fits commute time against income and station count by ordinary least
//! squares, and writes the results as a JSON summary.

pub mod analyzer;
pub mod describe;
pub mod regression;
pub mod types;
pub mod utility;
