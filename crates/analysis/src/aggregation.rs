//! Revenue and spending metrics per experiment group.
//!
//! ARPU and currency spend right-join per-user totals onto the full
//! population: users without transactions count as zero. ARPPU keeps only
//! positive payments, sums them per user and inner-joins: non-payers are
//! absent from the sample, not zero-filled.
//!
//! Aggregates are stored at full precision. Use [`GroupAggregate::rounded`]
//! for display.

use abtest_core::stats::{mean, median, sample_std_dev};
use abtest_data::{
    Group, GroupAssignment, Platform, PlatformRecord, Transaction, TransactionKind, UserId,
    UserTotals,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Metrics compared between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Average revenue per user
    Arpu,
    /// Average revenue per paying user
    Arppu,
    /// In-game currency spent per user
    CurrencySpend,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Arpu, Metric::Arppu, Metric::CurrencySpend];

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Metric::Arpu => "ARPU",
            Metric::Arppu => "ARPPU",
            Metric::CurrencySpend => "Currency Spend",
        }
    }

    /// Transaction table the metric is computed from.
    #[must_use]
    pub const fn kind(&self) -> TransactionKind {
        match self {
            Metric::Arpu | Metric::Arppu => TransactionKind::RealMoney,
            Metric::CurrencySpend => TransactionKind::VirtualCurrency,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-user metric value after the join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserValue {
    pub user_id: UserId,
    pub group: Group,
    pub platform: Option<Platform>,
    pub value: f64,
}

/// Summary of per-user values for one group (and optionally platform).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub metric: Metric,
    pub group: Group,
    pub platform: Option<Platform>,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` when `count < 2`
    pub std_dev: Option<f64>,
    pub median: f64,
}

impl GroupAggregate {
    /// Summarizes a non-empty sample.
    #[must_use]
    pub fn from_values(
        metric: Metric,
        group: Group,
        platform: Option<Platform>,
        values: &[f64],
    ) -> Option<Self> {
        Some(Self {
            metric,
            group,
            platform,
            count: values.len(),
            mean: mean(values)?,
            std_dev: sample_std_dev(values),
            median: median(values)?,
        })
    }

    /// Copy with mean, std dev and median rounded for display.
    #[must_use]
    pub fn rounded(&self, precision: u32) -> Self {
        Self {
            mean: round_to(self.mean, precision),
            std_dev: self.std_dev.map(|sd| round_to(sd, precision)),
            median: round_to(self.median, precision),
            ..self.clone()
        }
    }
}

/// Rounds half away from zero to `precision` decimal places.
#[must_use]
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10_f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// One metric computed over the population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricBreakdown {
    pub metric: Metric,
    /// Groups present in the sample, in assignment-table order
    pub groups: Vec<Group>,
    pub by_group: Vec<GroupAggregate>,
    /// (group, platform) breakdown when platform data was supplied
    pub by_group_platform: Option<Vec<GroupAggregate>>,
    /// Full-precision per-user values the aggregates were built from
    #[serde(skip)]
    pub values: Vec<UserValue>,
}

impl MetricBreakdown {
    #[must_use]
    pub fn group(&self, group: &Group) -> Option<&GroupAggregate> {
        self.by_group.iter().find(|a| &a.group == group)
    }

    #[must_use]
    pub fn segment(&self, group: &Group, platform: Platform) -> Option<&GroupAggregate> {
        self.by_group_platform
            .as_ref()?
            .iter()
            .find(|a| &a.group == group && a.platform == Some(platform))
    }

    /// Full-precision per-user values of one group.
    #[must_use]
    pub fn sample(&self, group: &Group) -> Vec<f64> {
        self.values
            .iter()
            .filter(|v| &v.group == group)
            .map(|v| v.value)
            .collect()
    }
}

/// Average revenue per user: real-money totals, non-payers as zero.
#[must_use]
pub fn compute_arpu(
    transactions: &[Transaction],
    assignments: &[GroupAssignment],
    platforms: Option<&[PlatformRecord]>,
) -> MetricBreakdown {
    let totals = totals_of(transactions, TransactionKind::RealMoney, false);
    let values = zero_filled(&totals, assignments, platforms);
    summarize(Metric::Arpu, values, platforms.is_some())
}

/// Average revenue per paying user: only users with positive real-money
/// payments are in the sample.
#[must_use]
pub fn compute_arppu(
    transactions: &[Transaction],
    assignments: &[GroupAssignment],
    platforms: Option<&[PlatformRecord]>,
) -> MetricBreakdown {
    let totals = totals_of(transactions, TransactionKind::RealMoney, true);
    let values = payers_only(&totals, assignments, platforms);
    summarize(Metric::Arppu, values, platforms.is_some())
}

/// Virtual-currency spend per user, non-spenders as zero.
#[must_use]
pub fn compute_spend(
    transactions: &[Transaction],
    assignments: &[GroupAssignment],
    platforms: Option<&[PlatformRecord]>,
) -> MetricBreakdown {
    let totals = totals_of(transactions, TransactionKind::VirtualCurrency, false);
    let values = zero_filled(&totals, assignments, platforms);
    summarize(Metric::CurrencySpend, values, platforms.is_some())
}

/// Dispatches to the metric's computation.
#[must_use]
pub fn compute(
    metric: Metric,
    transactions: &[Transaction],
    assignments: &[GroupAssignment],
    platforms: Option<&[PlatformRecord]>,
) -> MetricBreakdown {
    match metric {
        Metric::Arpu => compute_arpu(transactions, assignments, platforms),
        Metric::Arppu => compute_arppu(transactions, assignments, platforms),
        Metric::CurrencySpend => compute_spend(transactions, assignments, platforms),
    }
}

fn totals_of(transactions: &[Transaction], kind: TransactionKind, paying_only: bool) -> UserTotals {
    UserTotals::from_transactions(
        transactions
            .iter()
            .filter(|tx| tx.kind == kind && (!paying_only || tx.amount > 0.0)),
    )
}

fn platform_lookup(platforms: Option<&[PlatformRecord]>) -> HashMap<UserId, Platform> {
    platforms
        .unwrap_or_default()
        .iter()
        .map(|p| (p.user_id, p.platform))
        .collect()
}

fn zero_filled(
    totals: &UserTotals,
    assignments: &[GroupAssignment],
    platforms: Option<&[PlatformRecord]>,
) -> Vec<UserValue> {
    let lookup = platform_lookup(platforms);
    assignments
        .iter()
        .map(|a| UserValue {
            user_id: a.user_id,
            group: a.group.clone(),
            platform: lookup.get(&a.user_id).copied(),
            value: totals.get(a.user_id).unwrap_or(0.0),
        })
        .collect()
}

fn payers_only(
    totals: &UserTotals,
    assignments: &[GroupAssignment],
    platforms: Option<&[PlatformRecord]>,
) -> Vec<UserValue> {
    let lookup = platform_lookup(platforms);
    assignments
        .iter()
        .filter_map(|a| {
            totals.get(a.user_id).map(|value| UserValue {
                user_id: a.user_id,
                group: a.group.clone(),
                platform: lookup.get(&a.user_id).copied(),
                value,
            })
        })
        .collect()
}

fn summarize(metric: Metric, values: Vec<UserValue>, segment_by_platform: bool) -> MetricBreakdown {
    let mut groups: Vec<Group> = Vec::new();
    let mut by_group: HashMap<&Group, Vec<f64>> = HashMap::new();
    let mut by_segment: HashMap<(&Group, Platform), Vec<f64>> = HashMap::new();

    for v in &values {
        if !by_group.contains_key(&v.group) {
            groups.push(v.group.clone());
        }
        by_group.entry(&v.group).or_default().push(v.value);
        if let Some(platform) = v.platform {
            by_segment
                .entry((&v.group, platform))
                .or_default()
                .push(v.value);
        }
    }

    let group_aggregates = groups
        .iter()
        .filter_map(|g| {
            let sample = by_group.get(g)?;
            GroupAggregate::from_values(metric, g.clone(), None, sample)
        })
        .collect();

    let segment_aggregates = segment_by_platform.then(|| {
        let mut keys: Vec<_> = by_segment.keys().copied().collect();
        let order = |g: &Group| groups.iter().position(|x| x == g).unwrap_or(usize::MAX);
        keys.sort_by_key(|(g, p)| (order(g), *p));
        keys.into_iter()
            .filter_map(|key| {
                GroupAggregate::from_values(metric, key.0.clone(), Some(key.1), &by_segment[&key])
            })
            .collect()
    });

    MetricBreakdown {
        metric,
        groups,
        by_group: group_aggregates,
        by_group_platform: segment_aggregates,
        values,
    }
}
