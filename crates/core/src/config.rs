use crate::stats::VarianceAssumption;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Largest decimal precision an f64 can render meaningfully.
pub const MAX_DISPLAY_PRECISION: u32 = 15;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

/// Location of the experiment's input tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: String,
    pub assignments_file: String,
    pub money_file: String,
    pub cash_file: String,
    pub platforms_file: String,
    pub cheaters_file: String,
    /// Additional tables carried through cleaning (filtered when they
    /// have a user id column, passed through otherwise).
    pub extra_tables: Vec<String>,
}

/// Which transaction table feeds the outlier detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierSource {
    RealMoney,
    #[default]
    VirtualCurrency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// IQR multiplier for the upper outlier fence. Higher is more conservative.
    pub outlier_multiplier: f64,
    pub outlier_source: OutlierSource,
    pub confidence_level: f64,
    /// Alpha for the significance test.
    pub significance_level: f64,
    pub variance: VarianceAssumption,
    /// Decimal places used when rendering aggregates.
    pub display_precision: u32,
    pub segment_by_platform: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub formats: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: "data".to_string(),
            assignments_file: "ABgroup.csv".to_string(),
            money_file: "Money.csv".to_string(),
            cash_file: "Cash.csv".to_string(),
            platforms_file: "Platforms.csv".to_string(),
            cheaters_file: "Cheaters.csv".to_string(),
            extra_tables: Vec::new(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            outlier_multiplier: 3.0,
            outlier_source: OutlierSource::VirtualCurrency,
            confidence_level: 0.95,
            significance_level: 0.05,
            variance: VarianceAssumption::Pooled,
            display_precision: 2,
            segment_by_platform: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "reports".to_string(),
            formats: vec!["text".to_string()],
        }
    }
}

impl AnalysisConfig {
    /// Checks that every tunable lies in its valid range.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier <= 0.0 {
            bail!(
                "analysis.outlier_multiplier must be a positive number, got {}",
                self.outlier_multiplier
            );
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            bail!(
                "analysis.confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            );
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            bail!(
                "analysis.significance_level must lie in (0, 1), got {}",
                self.significance_level
            );
        }
        if self.display_precision > MAX_DISPLAY_PRECISION {
            bail!(
                "analysis.display_precision must be at most {MAX_DISPLAY_PRECISION}, got {}",
                self.display_precision
            );
        }
        Ok(())
    }
}

impl AppConfig {
    /// Validates the analysis section.
    ///
    /// # Errors
    ///
    /// Returns an error if any analysis parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()
    }
}
