//! Report assembly: per-metric comparisons, distributions and the
//! implementation recommendation.

use crate::aggregation::{GroupAggregate, Metric, MetricBreakdown};
use crate::cleaning::{CleaningStage, OutlierDetection};
use crate::hypothesis::{GroupComparison, GroupPair, SignificanceResult};
use abtest_core::{AnalysisConfig, ConfidenceInterval, SinkEvent};
use abtest_data::{ExperimentData, Group, Platform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Baseline and treatment side by side for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub baseline: GroupAggregate,
    pub treatment: GroupAggregate,
    pub baseline_interval: ConfidenceInterval,
    pub treatment_interval: ConfidenceInterval,
    /// Relative change of the treatment mean in percent; `None` when the
    /// baseline mean is zero
    pub lift_pct: Option<f64>,
    pub significance: SignificanceResult,
}

impl MetricComparison {
    /// Joins the aggregates of the compared pair with the engine output.
    ///
    /// Returns `None` if either group is missing from the breakdown.
    #[must_use]
    pub fn new(
        breakdown: &MetricBreakdown,
        pair: &GroupPair,
        engine: GroupComparison,
    ) -> Option<Self> {
        let baseline = breakdown.group(&pair.baseline)?.clone();
        let treatment = breakdown.group(&pair.treatment)?.clone();
        Some(Self {
            metric: breakdown.metric,
            lift_pct: relative_lift(baseline.mean, treatment.mean),
            baseline,
            treatment,
            baseline_interval: engine.baseline_interval,
            treatment_interval: engine.treatment_interval,
            significance: engine.significance,
        })
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.lift_pct.is_some_and(|lift| lift > 0.0)
    }
}

/// `(treatment - baseline) / baseline * 100`.
#[must_use]
pub fn relative_lift(baseline: f64, treatment: f64) -> Option<f64> {
    (baseline != 0.0).then(|| (treatment - baseline) / baseline * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ImplementPermanently,
    ImplementWithModifications,
    DoNotImplement,
}

impl Recommendation {
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Recommendation::ImplementPermanently => {
                "Implement permanently: significant improvement on several metrics"
            }
            Recommendation::ImplementWithModifications => {
                "Implement with modifications: improvement is positive but only partly significant"
            }
            Recommendation::DoNotImplement => {
                "Do not implement: no meaningful improvement detected"
            }
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Recommendation::ImplementPermanently => "IMPLEMENT PERMANENTLY",
            Recommendation::ImplementWithModifications => "IMPLEMENT WITH MODIFICATIONS",
            Recommendation::DoNotImplement => "DO NOT IMPLEMENT",
        };
        f.write_str(label)
    }
}

/// Decision rule over the metric comparisons.
///
/// * at least 2 significant and 2 positive: implement permanently
/// * at least 1 significant and 2 positive: implement with modifications
/// * otherwise: do not implement
#[must_use]
pub fn determine_recommendation(comparisons: &[MetricComparison]) -> Recommendation {
    let significant = comparisons
        .iter()
        .filter(|c| c.significance.is_significant)
        .count();
    let positive = comparisons.iter().filter(|c| c.is_positive()).count();

    match (significant, positive) {
        (s, p) if s >= 2 && p >= 2 => Recommendation::ImplementPermanently,
        (s, p) if s >= 1 && p >= 2 => Recommendation::ImplementWithModifications,
        _ => Recommendation::DoNotImplement,
    }
}

/// Count and percentage of users with one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub label: String,
    pub count: usize,
    pub pct: f64,
}

fn shares(labels: impl IntoIterator<Item = String>) -> Vec<Share> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in labels {
        let count = counts.entry(label.clone()).or_insert(0);
        if *count == 0 {
            order.push(label);
        }
        *count += 1;
    }

    let total: usize = counts.values().sum();
    order
        .into_iter()
        .map(|label| {
            let count = counts[&label];
            Share {
                pct: count as f64 / total as f64 * 100.0,
                label,
                count,
            }
        })
        .collect()
}

/// Users per group, in assignment order.
#[must_use]
pub fn group_distribution(data: &ExperimentData) -> Vec<Share> {
    shares(data.assignments.iter().map(|a| a.group.to_string()))
}

/// Users per platform among assigned users with a known platform.
#[must_use]
pub fn platform_distribution(data: &ExperimentData) -> Vec<Share> {
    let mut platforms: Vec<Platform> = data
        .users()
        .into_iter()
        .filter_map(|user| user.platform)
        .collect();
    platforms.sort();
    shares(platforms.into_iter().map(|p| p.to_string()))
}

/// Everything an analysis run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub settings: AnalysisConfig,
    pub original_users: usize,
    pub retained_users: usize,
    pub known_cheaters: CleaningStage,
    pub outlier_detection: OutlierDetection,
    pub outliers: CleaningStage,
    pub pair: GroupPair,
    pub group_distribution: Vec<Share>,
    pub platform_distribution: Vec<Share>,
    pub breakdowns: Vec<MetricBreakdown>,
    pub comparisons: Vec<MetricComparison>,
    pub recommendation: Recommendation,
    /// Warnings raised by any stage during the run
    pub warnings: Vec<SinkEvent>,
    /// Cleaned tables the metrics were computed from
    #[serde(skip)]
    pub cleaned: ExperimentData,
}

impl AnalysisReport {
    #[must_use]
    pub fn breakdown(&self, metric: Metric) -> Option<&MetricBreakdown> {
        self.breakdowns.iter().find(|b| b.metric == metric)
    }

    #[must_use]
    pub fn comparison(&self, metric: Metric) -> Option<&MetricComparison> {
        self.comparisons.iter().find(|c| c.metric == metric)
    }

    #[must_use]
    pub fn baseline(&self) -> &Group {
        &self.pair.baseline
    }

    #[must_use]
    pub fn treatment(&self) -> &Group {
        &self.pair.treatment
    }
}
