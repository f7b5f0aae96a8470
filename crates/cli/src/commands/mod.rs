//! CLI commands for experiment analysis.

pub mod analyze;
pub mod outliers;

pub use analyze::{run_analyze, AnalyzeArgs};
pub use outliers::{run_outliers, OutliersArgs};
