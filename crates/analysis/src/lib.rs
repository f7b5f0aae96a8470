//! A/B experiment analysis: cheater removal, revenue metrics, significance
//! testing and the resulting recommendation.
//!
//! Every stage takes an explicit [`abtest_core::ReportSink`] for its audit
//! trail. [`ExperimentAnalysis`] chains the stages in order.

pub mod aggregation;
pub mod cleaning;
pub mod error;
pub mod export;
pub mod formatter;
pub mod hypothesis;
pub mod pipeline;
pub mod report;

pub use aggregation::{
    compute, compute_arppu, compute_arpu, compute_spend, round_to, GroupAggregate, Metric,
    MetricBreakdown, UserValue,
};
pub use cleaning::{
    clean, detect_outliers, detect_outliers_in_totals, remove_flagged, remove_outliers,
    CleaningOutcome, CleaningStage, OutlierDetection, TableRemoval,
};
pub use error::AnalysisError;
pub use export::{ReportExporter, ReportFormat};
pub use formatter::ReportFormatter;
pub use hypothesis::{
    compare_groups, group_interval, select_pair, significance_test, GroupComparison, GroupPair,
    SignificanceResult, DEFAULT_ALPHA,
};
pub use pipeline::{outlier_kind, ExperimentAnalysis};
pub use report::{
    determine_recommendation, group_distribution, platform_distribution, relative_lift,
    AnalysisReport, MetricComparison, Recommendation, Share,
};
