use crate::formatter::ReportFormatter;
use crate::report::AnalysisReport;
use anyhow::{bail, Context, Result};
use csv::Writer;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Output formats understood by [`ReportExporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    /// # Errors
    /// Returns error for an unknown format name.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => bail!("unknown report format '{other}' (expected text, json or csv)"),
        }
    }

    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Text => "ab_test_report.txt",
            Self::Json => "ab_test_report.json",
            Self::Csv => "ab_test_summary.csv",
        }
    }
}

pub struct ReportExporter;

impl ReportExporter {
    /// Writes one file per format into `dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns error if the directory or any file cannot be written.
    pub fn export(
        report: &AnalysisReport,
        dir: &Path,
        formats: &[ReportFormat],
    ) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;

        let mut written = Vec::with_capacity(formats.len());
        for format in formats {
            let path = dir.join(format.file_name());
            match format {
                ReportFormat::Text => {
                    std::fs::write(&path, ReportFormatter::to_text(report))
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                ReportFormat::Json => Self::write_json(&path, report)?,
                ReportFormat::Csv => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
                    Self::write_summary_csv(file, report)?;
                }
            }
            tracing::info!(path = %path.display(), "Report written");
            written.push(path);
        }
        Ok(written)
    }

    /// # Errors
    /// Returns error if serialization or writing fails.
    pub fn write_json(path: &Path, report: &AnalysisReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Flat per-group (and per-segment) summary.
    ///
    /// Format: metric,group,platform,count,mean,std_dev,median
    ///
    /// # Errors
    /// Returns error if writing fails.
    pub fn write_summary_csv<W: Write>(out: W, report: &AnalysisReport) -> Result<()> {
        let precision = report.settings.display_precision;
        let mut writer = Writer::from_writer(out);

        writer.write_record(["metric", "group", "platform", "count", "mean", "std_dev", "median"])?;

        for breakdown in &report.breakdowns {
            let segments = breakdown.by_group_platform.iter().flatten();
            for aggregate in breakdown.by_group.iter().chain(segments) {
                let rounded = aggregate.rounded(precision);
                writer.write_record(&[
                    rounded.metric.label().to_string(),
                    rounded.group.to_string(),
                    rounded.platform.map(|p| p.to_string()).unwrap_or_default(),
                    rounded.count.to_string(),
                    rounded.mean.to_string(),
                    rounded.std_dev.map(|sd| sd.to_string()).unwrap_or_default(),
                    rounded.median.to_string(),
                ])?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}
