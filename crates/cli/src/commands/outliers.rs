//! Outliers CLI command.
//!
//! Runs only the cheater filter and prints the outlier audit: quartiles,
//! fence and flagged users. Useful for tuning the multiplier. The audited
//! transaction table is streamed into per-user totals, so only the
//! assignment and cheater tables are held in memory.

use super::analyze::dataset_source;
use abtest_analysis::{detect_outliers_in_totals, outlier_kind};
use abtest_core::{AppConfig, ConfigLoader, OutlierSource, TracingSink};
use abtest_data::UserId;
use anyhow::{Context, Result};
use clap::Args;
use std::collections::HashSet;

/// Arguments for the outliers command.
#[derive(Args, Debug, Clone)]
pub struct OutliersArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Config profile layered over the base file
    #[arg(long)]
    pub profile: Option<String>,

    /// Directory holding the input CSV tables
    #[arg(long)]
    pub data_dir: Option<String>,

    /// IQR multiplier for the outlier fence
    #[arg(long)]
    pub multiplier: Option<f64>,

    /// Detect on real-money totals instead of the configured source
    #[arg(long)]
    pub real_money: bool,

    /// Number of flagged user ids to list
    #[arg(long, default_value = "20")]
    pub show: usize,
}

impl OutliersArgs {
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.data_dir {
            config.data.dir.clone_from(dir);
        }
        if let Some(multiplier) = self.multiplier {
            config.analysis.outlier_multiplier = multiplier;
        }
        if self.real_money {
            config.analysis.outlier_source = OutlierSource::RealMoney;
        }
    }
}

/// Loads the layered config, then applies the command-line overrides.
///
/// # Errors
/// Returns an error if the config cannot be parsed or is out of range.
pub fn resolve_config(args: &OutliersArgs) -> Result<AppConfig> {
    let mut config = match &args.profile {
        Some(profile) => ConfigLoader::load_with_profile(&args.config, profile)?,
        None => ConfigLoader::load(&args.config)?,
    };
    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Runs the outliers command.
///
/// # Errors
/// Returns an error if the config is invalid or the data cannot be loaded.
pub fn run_outliers(args: OutliersArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let multiplier = config.analysis.outlier_multiplier;
    let kind = outlier_kind(config.analysis.outlier_source);
    let source = dataset_source(&config);
    let load_context = || format!("Failed to load experiment data from {}", config.data.dir);

    let users = source.load_assignments().with_context(load_context)?.len();
    let cheater_ids: HashSet<UserId> = source
        .load_cheater_flags()
        .with_context(load_context)?
        .into_iter()
        .filter(|flag| flag.is_cheater)
        .map(|flag| flag.user_id)
        .collect();

    let mut totals = source.stream_totals(kind).with_context(load_context)?;
    let spenders_flagged = totals.remove_users(&cheater_ids);
    tracing::info!(
        known_cheaters = cheater_ids.len(),
        spenders_flagged,
        "Dropped known cheaters before detection"
    );
    let detection = detect_outliers_in_totals(&totals, kind, multiplier, &TracingSink);

    println!("\n═══════════════════════════════════════════════════════════════");
    println!("                    SPENDING OUTLIER AUDIT                      ");
    println!("═══════════════════════════════════════════════════════════════");
    println!("Users:                 {users}");
    println!("Known Cheaters:        {} flagged", cheater_ids.len());
    println!("Source:                {kind}");
    println!("Spenders Considered:   {}", detection.users_considered);

    match (detection.quartiles, detection.threshold) {
        (Some(q), Some(threshold)) => {
            println!("Q1:                    {:.2}", q.q1);
            println!("Q3:                    {:.2}", q.q3);
            println!("IQR:                   {:.2}", q.iqr());
            println!("Threshold:             {threshold:.2} (Q3 + {multiplier} x IQR)");
            println!("Flagged:               {}", detection.count());
            for id in detection.outlier_ids.iter().take(args.show) {
                println!("  {id}");
            }
            if detection.count() > args.show {
                println!("  ... and {} more", detection.count() - args.show);
            }
        }
        _ => println!("No {kind} transactions; nothing to detect"),
    }
    println!("═══════════════════════════════════════════════════════════════");

    Ok(())
}
