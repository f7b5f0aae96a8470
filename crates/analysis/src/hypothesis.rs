//! Confidence intervals and two-group significance testing per metric.

use crate::aggregation::{Metric, MetricBreakdown};
use crate::error::AnalysisError;
use abtest_core::stats::{t_confidence_interval, two_sample_t_test};
use abtest_core::{ConfidenceInterval, ReportSink, VarianceAssumption};
use abtest_data::Group;
use serde::{Deserialize, Serialize};

pub const STAGE_STATISTICS: &str = "statistics";

/// Default significance threshold.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// The two groups a comparison runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPair {
    pub baseline: Group,
    pub treatment: Group,
    /// Groups present in the data but left out of the comparison
    pub ignored: Vec<Group>,
}

/// Picks the first two groups in encounter order.
///
/// The `control` group (if among the two) becomes the baseline, otherwise
/// the first one does. Any further groups are ignored with a warning.
///
/// # Errors
/// Returns `TooFewGroups` when fewer than two groups are present.
pub fn select_pair(groups: &[Group], sink: &dyn ReportSink) -> Result<GroupPair, AnalysisError> {
    let [first, second, rest @ ..] = groups else {
        return Err(AnalysisError::TooFewGroups(groups.len()));
    };

    if !rest.is_empty() {
        let ignored: Vec<&str> = rest.iter().map(Group::as_str).collect();
        sink.warn(
            STAGE_STATISTICS,
            &format!(
                "{} groups found; comparing '{first}' and '{second}', ignoring {}",
                groups.len(),
                ignored.join(", ")
            ),
        );
    }

    let (baseline, treatment) = if second.is_control() && !first.is_control() {
        (second.clone(), first.clone())
    } else {
        (first.clone(), second.clone())
    };

    Ok(GroupPair {
        baseline,
        treatment,
        ignored: rest.to_vec(),
    })
}

/// Result of a two-sample t-test between two groups on one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub metric: Metric,
    /// Sample A: the statistic is oriented as `mean(first) - mean(second)`
    pub first: Group,
    pub second: Group,
    pub statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub alpha: f64,
    pub is_significant: bool,
    pub variance: VarianceAssumption,
}

/// Two-sample t-test of `sample_a` against `sample_b`.
///
/// `is_significant` is `p_value < alpha`.
///
/// # Errors
/// Fails with `InsufficientSample` when either sample has fewer than two
/// observations.
pub fn significance_test(
    metric: Metric,
    (first, sample_a): (&Group, &[f64]),
    (second, sample_b): (&Group, &[f64]),
    alpha: f64,
    variance: VarianceAssumption,
) -> Result<SignificanceResult, AnalysisError> {
    let outcome = two_sample_t_test(sample_a, sample_b, variance)
        .map_err(|source| AnalysisError::Stats { metric, source })?;

    Ok(SignificanceResult {
        metric,
        first: first.clone(),
        second: second.clone(),
        statistic: outcome.statistic,
        degrees_of_freedom: outcome.degrees_of_freedom,
        p_value: outcome.p_value,
        alpha,
        is_significant: outcome.p_value < alpha,
        variance,
    })
}

/// Interval for one group of a breakdown, on full-precision values.
///
/// # Errors
/// Fails with `InsufficientSample` when the group has fewer than two users.
pub fn group_interval(
    breakdown: &MetricBreakdown,
    group: &Group,
    confidence_level: f64,
) -> Result<ConfidenceInterval, AnalysisError> {
    t_confidence_interval(&breakdown.sample(group), confidence_level).map_err(|source| {
        AnalysisError::Stats {
            metric: breakdown.metric,
            source,
        }
    })
}

/// Everything the statistical engine produces for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupComparison {
    pub metric: Metric,
    pub baseline_interval: ConfidenceInterval,
    pub treatment_interval: ConfidenceInterval,
    /// Treatment tested against baseline
    pub significance: SignificanceResult,
}

/// Intervals for both groups of `pair` and the treatment-vs-baseline test.
///
/// # Errors
/// Propagates `InsufficientSample` for either group.
pub fn compare_groups(
    breakdown: &MetricBreakdown,
    pair: &GroupPair,
    confidence_level: f64,
    alpha: f64,
    variance: VarianceAssumption,
    sink: &dyn ReportSink,
) -> Result<GroupComparison, AnalysisError> {
    let baseline_sample = breakdown.sample(&pair.baseline);
    let treatment_sample = breakdown.sample(&pair.treatment);

    let baseline_interval = group_interval(breakdown, &pair.baseline, confidence_level)?;
    let treatment_interval = group_interval(breakdown, &pair.treatment, confidence_level)?;
    let significance = significance_test(
        breakdown.metric,
        (&pair.treatment, treatment_sample.as_slice()),
        (&pair.baseline, baseline_sample.as_slice()),
        alpha,
        variance,
    )?;

    sink.info(
        STAGE_STATISTICS,
        &format!(
            "{}: t={:.4}, p={:.4}, significant={}",
            breakdown.metric,
            significance.statistic,
            significance.p_value,
            significance.is_significant
        ),
    );

    Ok(GroupComparison {
        metric: breakdown.metric,
        baseline_interval,
        treatment_interval,
        significance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::compute_arpu;
    use abtest_core::{MemorySink, TracingSink};
    use abtest_data::{GroupAssignment, Transaction, UserId};

    fn groups(labels: &[&str]) -> Vec<Group> {
        labels.iter().map(|l| Group::new(*l)).collect()
    }

    // ============================================
    // Pair selection
    // ============================================

    #[test]
    fn two_groups_select_without_warning() {
        let sink = MemorySink::new();
        let pair = select_pair(&groups(&["control", "test"]), &sink).unwrap();
        assert_eq!(pair.baseline, Group::control());
        assert_eq!(pair.treatment, Group::test());
        assert!(pair.ignored.is_empty());
        assert!(sink.warnings().is_empty());
    }

    #[test]
    fn control_becomes_baseline_regardless_of_order() {
        let pair = select_pair(&groups(&["test", "Control"]), &TracingSink).unwrap();
        assert_eq!(pair.baseline, Group::new("Control"));
        assert_eq!(pair.treatment, Group::test());
    }

    #[test]
    fn extra_groups_are_ignored_with_warning() {
        let sink = MemorySink::new();
        let pair = select_pair(&groups(&["a", "b", "c", "d"]), &sink).unwrap();

        assert_eq!(pair.baseline, Group::new("a"));
        assert_eq!(pair.treatment, Group::new("b"));
        assert_eq!(pair.ignored, groups(&["c", "d"]));

        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("ignoring c, d"));
    }

    #[test]
    fn single_group_is_an_error() {
        let err = select_pair(&groups(&["control"]), &TracingSink).unwrap_err();
        assert!(matches!(err, AnalysisError::TooFewGroups(1)));
    }

    // ============================================
    // Significance
    // ============================================

    #[test]
    fn significance_is_symmetric() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        let (ga, gb) = (Group::new("a"), Group::new("b"));

        for variance in [VarianceAssumption::Pooled, VarianceAssumption::Welch] {
            let ab = significance_test(
                Metric::Arpu,
                (&ga, &a[..]),
                (&gb, &b[..]),
                DEFAULT_ALPHA,
                variance,
            )
            .unwrap();
            let ba = significance_test(
                Metric::Arpu,
                (&gb, &b[..]),
                (&ga, &a[..]),
                DEFAULT_ALPHA,
                variance,
            )
            .unwrap();
            assert!((ab.p_value - ba.p_value).abs() < 1e-12);
            assert!((ab.statistic + ba.statistic).abs() < 1e-12);
        }
    }

    #[test]
    fn significance_uses_strict_alpha() {
        let (ga, gb) = (Group::new("a"), Group::new("b"));
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [6.0, 7.0, 8.0, 9.0, 10.0];

        let result = significance_test(
            Metric::Arpu,
            (&ga, &a[..]),
            (&gb, &b[..]),
            DEFAULT_ALPHA,
            Default::default(),
        )
        .unwrap();
        assert!((result.statistic + 5.0).abs() < 1e-9);
        assert_eq!(result.degrees_of_freedom, 8.0);
        assert!(result.is_significant, "p = {}", result.p_value);

        let strict =
            significance_test(Metric::Arpu, (&ga, &a[..]), (&gb, &b[..]), 0.001, Default::default())
                .unwrap();
        assert!(!strict.is_significant, "p = {}", strict.p_value);
    }

    #[test]
    fn tiny_sample_fails_with_metric_attached() {
        let (ga, gb) = (Group::new("a"), Group::new("b"));
        let err = significance_test(
            Metric::Arppu,
            (&ga, &[1.0][..]),
            (&gb, &[1.0, 2.0][..]),
            DEFAULT_ALPHA,
            Default::default(),
        )
        .unwrap_err();

        assert!(err.is_insufficient_sample());
        assert!(err.to_string().starts_with("ARPPU"));
    }

    // ============================================
    // Group comparison
    // ============================================

    #[test]
    fn compare_groups_orients_treatment_against_baseline() {
        let users: Vec<GroupAssignment> = (1..=8)
            .map(|id| GroupAssignment {
                user_id: UserId(id),
                group: if id <= 4 { Group::control() } else { Group::test() },
            })
            .collect();
        let money = vec![
            Transaction::real_money(3, 5.0),
            Transaction::real_money(4, 10.0),
            Transaction::real_money(6, 5.0),
            Transaction::real_money(7, 10.0),
            Transaction::real_money(8, 15.0),
        ];
        let arpu = compute_arpu(&money, &users, None);
        let pair = select_pair(&arpu.groups, &TracingSink).unwrap();

        let comparison = compare_groups(
            &arpu,
            &pair,
            0.95,
            DEFAULT_ALPHA,
            VarianceAssumption::Pooled,
            &TracingSink,
        )
        .unwrap();

        assert_eq!(comparison.baseline_interval.mean, 3.75);
        assert_eq!(comparison.treatment_interval.mean, 7.5);
        assert!(comparison.baseline_interval.contains(3.75));
        assert!(comparison.significance.statistic > 0.0);
        assert_eq!(comparison.significance.first, Group::test());
        assert!(!comparison.significance.is_significant);
    }
}
