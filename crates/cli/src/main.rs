use clap::{Parser, Subcommand};

mod commands;

use commands::{AnalyzeArgs, OutliersArgs};

#[derive(Parser)]
#[command(name = "abtest")]
#[command(
    about = "A/B experiment analysis: cheater removal, ARPU/ARPPU, significance",
    long_about = None
)]
struct Cli {
    /// Optional log file path (appends instead of logging to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and write the report
    Analyze(AnalyzeArgs),
    /// Show only the spending-outlier audit
    Outliers(OutliersArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }

    match cli.command {
        Commands::Analyze(args) => commands::run_analyze(args)?,
        Commands::Outliers(args) => commands::run_outliers(args)?,
    }

    Ok(())
}
