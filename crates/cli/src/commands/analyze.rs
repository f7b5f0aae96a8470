//! Analyze CLI command.
//!
//! Loads the experiment tables, runs the full pipeline and writes the
//! report in the requested formats.

use abtest_analysis::{ExperimentAnalysis, ReportExporter, ReportFormat, ReportFormatter};
use abtest_core::{AppConfig, ConfigLoader, TracingSink, VarianceAssumption};
use abtest_data::{CsvDatasetSource, DatasetSource, TableFiles};
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

/// Arguments for the analyze command.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Config profile layered over the base file (e.g. "strict" reads Config.strict.toml)
    #[arg(long)]
    pub profile: Option<String>,

    /// Directory holding the input CSV tables
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Directory the report files are written to
    #[arg(short, long)]
    pub output: Option<String>,

    /// Report formats, comma separated (text, json, csv)
    #[arg(short, long, value_delimiter = ',')]
    pub format: Vec<String>,

    /// IQR multiplier for the outlier fence
    #[arg(long)]
    pub multiplier: Option<f64>,

    /// Confidence level for the intervals (e.g. 0.95)
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Use Welch's unequal-variance t-test
    #[arg(long)]
    pub welch: bool,

    /// Skip the per-platform breakdown
    #[arg(long)]
    pub no_platform: bool,
}

impl AnalyzeArgs {
    /// Command-line flags take precedence over every config layer.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.data_dir {
            config.data.dir.clone_from(dir);
        }
        if let Some(dir) = &self.output {
            config.output.dir.clone_from(dir);
        }
        if !self.format.is_empty() {
            config.output.formats.clone_from(&self.format);
        }
        if let Some(multiplier) = self.multiplier {
            config.analysis.outlier_multiplier = multiplier;
        }
        if let Some(confidence) = self.confidence {
            config.analysis.confidence_level = confidence;
        }
        if self.welch {
            config.analysis.variance = VarianceAssumption::Welch;
        }
        if self.no_platform {
            config.analysis.segment_by_platform = false;
        }
    }
}

/// Builds the CSV source described by the data section.
pub fn dataset_source(config: &AppConfig) -> CsvDatasetSource {
    let data = &config.data;
    CsvDatasetSource::new(&data.dir)
        .with_files(TableFiles {
            assignments: data.assignments_file.clone(),
            money: data.money_file.clone(),
            cash: data.cash_file.clone(),
            platforms: data.platforms_file.clone(),
            cheaters: data.cheaters_file.clone(),
        })
        .with_extra_tables(data.extra_tables.clone())
}

/// Loads the layered config, then applies the command-line overrides.
///
/// # Errors
/// Returns an error if the config cannot be parsed or is out of range.
pub fn resolve_config(args: &AnalyzeArgs) -> Result<AppConfig> {
    let mut config = match &args.profile {
        Some(profile) => ConfigLoader::load_with_profile(&args.config, profile)?,
        None => ConfigLoader::load(&args.config)?,
    };
    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Runs the analyze command.
///
/// # Errors
/// Returns an error if loading, analysis or writing the report fails.
pub fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let formats = config
        .output
        .formats
        .iter()
        .map(|f| ReportFormat::parse(f))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        data_dir = %config.data.dir,
        multiplier = config.analysis.outlier_multiplier,
        confidence = config.analysis.confidence_level,
        variance = ?config.analysis.variance,
        "Starting analysis"
    );

    let data = dataset_source(&config)
        .load()
        .with_context(|| format!("Failed to load experiment data from {}", config.data.dir))?;

    let report = ExperimentAnalysis::new(config.analysis.clone())
        .run(&data, &TracingSink)
        .context("Analysis failed")?;

    println!("{}", ReportFormatter::to_text(&report));

    let written = ReportExporter::export(&report, Path::new(&config.output.dir), &formats)?;
    for path in written {
        println!("Report saved: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: AnalyzeArgs,
    }

    fn parse(argv: &[&str]) -> AnalyzeArgs {
        TestCli::parse_from(std::iter::once("abtest").chain(argv.iter().copied())).args
    }

    #[test]
    fn flags_override_config() {
        let args = parse(&[
            "--data-dir",
            "/tmp/exp",
            "--multiplier",
            "1.5",
            "--confidence",
            "0.99",
            "--welch",
            "--no-platform",
            "--format",
            "json,csv",
        ]);
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.data.dir, "/tmp/exp");
        assert_eq!(config.analysis.outlier_multiplier, 1.5);
        assert_eq!(config.analysis.confidence_level, 0.99);
        assert_eq!(config.analysis.variance, VarianceAssumption::Welch);
        assert!(!config.analysis.segment_by_platform);
        assert_eq!(config.output.formats, vec!["json", "csv"]);
    }

    #[test]
    fn no_flags_keep_config() {
        let args = parse(&[]);
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.analysis.outlier_multiplier, 3.0);
        assert_eq!(config.analysis.variance, VarianceAssumption::Pooled);
        assert_eq!(config.output.formats, vec!["text"]);
    }

    #[test]
    fn out_of_range_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("Config.toml");
        let path = config_path.to_str().unwrap();

        let args = parse(&["--config", path, "--confidence", "1.2"]);
        assert!(resolve_config(&args).is_err());

        let args = parse(&["--config", path, "--multiplier", "2"]);
        assert_eq!(resolve_config(&args).unwrap().analysis.outlier_multiplier, 2.0);
    }
}
