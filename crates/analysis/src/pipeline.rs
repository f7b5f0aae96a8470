//! End-to-end analysis run: validate, clean, aggregate, test, recommend.

use crate::aggregation::{compute, Metric};
use crate::cleaning::clean;
use crate::error::AnalysisError;
use crate::hypothesis::{compare_groups, select_pair};
use crate::report::{
    determine_recommendation, group_distribution, platform_distribution, AnalysisReport,
    MetricComparison,
};
use abtest_core::stats::MIN_SAMPLE_SIZE;
use abtest_core::{AnalysisConfig, MemorySink, OutlierSource, ReportSink, StatsError, Tee};
use abtest_data::{ExperimentData, TransactionKind};
use chrono::Utc;

pub const STAGE_PIPELINE: &str = "pipeline";

/// Transaction table feeding the outlier detector.
#[must_use]
pub const fn outlier_kind(source: OutlierSource) -> TransactionKind {
    match source {
        OutlierSource::RealMoney => TransactionKind::RealMoney,
        OutlierSource::VirtualCurrency => TransactionKind::VirtualCurrency,
    }
}

/// Runs the whole analysis over an in-memory dataset.
///
/// Stages run strictly in sequence and each consumes the complete output
/// of the previous one. The input dataset is never mutated.
pub struct ExperimentAnalysis {
    config: AnalysisConfig,
}

impl ExperimentAnalysis {
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// # Errors
    /// * `Config` if the analysis settings are out of range
    /// * `Dataset` for input errors (duplicates, invalid amounts)
    /// * `TooFewGroups` if fewer than two groups survive cleaning
    /// * `Stats` with `InsufficientSample` if a compared group has fewer
    ///   than two users for some metric
    pub fn run(
        &self,
        data: &ExperimentData,
        sink: &dyn ReportSink,
    ) -> Result<AnalysisReport, AnalysisError> {
        self.config
            .validate()
            .map_err(|e| AnalysisError::Config(e.to_string()))?;
        data.validate()?;

        let collector = MemorySink::new();
        let sink = Tee {
            first: sink,
            second: &collector,
        };

        sink.info(
            STAGE_PIPELINE,
            &format!(
                "Analyzing {} users, {} real-money and {} currency transactions",
                data.user_count(),
                data.money.len(),
                data.cash.len()
            ),
        );

        let cleaning = clean(
            data,
            outlier_kind(self.config.outlier_source),
            self.config.outlier_multiplier,
            &sink,
        );
        let cleaned = &cleaning.data;

        let group_distribution = group_distribution(cleaned);
        for share in &group_distribution {
            sink.info(
                STAGE_PIPELINE,
                &format!("Group '{}': {} users ({:.1}%)", share.label, share.count, share.pct),
            );
        }
        let platform_distribution = platform_distribution(cleaned);

        let pair = select_pair(&cleaned.groups(), &sink)?;
        let platforms = self
            .config
            .segment_by_platform
            .then_some(cleaned.platforms.as_slice());

        let mut breakdowns = Vec::with_capacity(Metric::ALL.len());
        let mut comparisons = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            let breakdown = compute(
                metric,
                cleaned.transactions(metric.kind()),
                &cleaned.assignments,
                platforms,
            );
            for aggregate in &breakdown.by_group {
                sink.info(
                    STAGE_PIPELINE,
                    &format!(
                        "{metric} '{}': mean {:.4}, n={}",
                        aggregate.group, aggregate.mean, aggregate.count
                    ),
                );
            }

            let engine = compare_groups(
                &breakdown,
                &pair,
                self.config.confidence_level,
                self.config.significance_level,
                self.config.variance,
                &sink,
            )?;
            let comparison = MetricComparison::new(&breakdown, &pair, engine).ok_or_else(|| {
                AnalysisError::Stats {
                    metric,
                    source: StatsError::InsufficientSample {
                        required: MIN_SAMPLE_SIZE,
                        actual: 0,
                    },
                }
            })?;

            comparisons.push(comparison);
            breakdowns.push(breakdown);
        }

        let recommendation = determine_recommendation(&comparisons);
        sink.info(STAGE_PIPELINE, &format!("Recommendation: {recommendation}"));

        Ok(AnalysisReport {
            generated_at: Utc::now(),
            settings: self.config.clone(),
            original_users: cleaning.original_users,
            retained_users: cleaning.retained_users(),
            known_cheaters: cleaning.known_cheaters.clone(),
            outlier_detection: cleaning.detection.clone(),
            outliers: cleaning.outliers.clone(),
            pair,
            group_distribution,
            platform_distribution,
            breakdowns,
            comparisons,
            recommendation,
            warnings: collector.warnings(),
            cleaned: cleaning.data,
        })
    }
}
