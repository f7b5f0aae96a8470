//! Cheater removal.
//!
//! Two stages, always in this order:
//! 1. Users flagged in the known-cheater table are dropped from every
//!    user-keyed table.
//! 2. Spending outliers are detected on the already cleaned data (so known
//!    fraud does not inflate the fence) and dropped the same way.
//!
//! Only the upper tail is filtered: a user is an outlier when their total
//! spend exceeds `Q3 + multiplier * IQR`. Low spenders are never flagged.
//! Removal is monotone; the retained population can only shrink.

use abtest_core::{Quartiles, ReportSink};
use abtest_data::{
    tables, ExperimentData, RawTable, Transaction, TransactionKind, UserId, UserKeyed, UserTotals,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const STAGE_KNOWN_CHEATERS: &str = "known_cheaters";
pub const STAGE_OUTLIERS: &str = "spending_outliers";

/// Rows removed from one table by one cleaning stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRemoval {
    pub table: String,
    pub before: usize,
    pub after: usize,
}

impl TableRemoval {
    #[must_use]
    pub fn removed(&self) -> usize {
        self.before - self.after
    }

    /// Share of rows removed, in percent (0 for an empty table).
    #[must_use]
    pub fn removed_pct(&self) -> f64 {
        if self.before == 0 {
            0.0
        } else {
            self.removed() as f64 / self.before as f64 * 100.0
        }
    }
}

/// Audit record of one cleaning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningStage {
    pub stage: String,
    /// Size of the exclusion id set handed to the stage
    pub excluded_ids: usize,
    pub tables: Vec<TableRemoval>,
    /// Tables without a user id column, passed through unchanged
    pub passthrough: Vec<String>,
}

impl CleaningStage {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableRemoval> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Users (assignment rows) before the stage.
    #[must_use]
    pub fn users_before(&self) -> usize {
        self.table(tables::ASSIGNMENTS).map_or(0, |t| t.before)
    }

    /// Users (assignment rows) after the stage.
    #[must_use]
    pub fn users_after(&self) -> usize {
        self.table(tables::ASSIGNMENTS).map_or(0, |t| t.after)
    }
}

/// Result of the upper-tail IQR outlier detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierDetection {
    pub kind: TransactionKind,
    pub multiplier: f64,
    /// Users with at least one transaction of `kind`
    pub users_considered: usize,
    pub quartiles: Option<Quartiles>,
    pub threshold: Option<f64>,
    /// Flagged users, sorted by id
    pub outlier_ids: Vec<UserId>,
}

impl OutlierDetection {
    #[must_use]
    pub fn count(&self) -> usize {
        self.outlier_ids.len()
    }

    #[must_use]
    pub fn id_set(&self) -> HashSet<UserId> {
        self.outlier_ids.iter().copied().collect()
    }
}

/// Everything the cheater filter produced.
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub data: ExperimentData,
    pub original_users: usize,
    pub known_cheaters: CleaningStage,
    pub detection: OutlierDetection,
    pub outliers: CleaningStage,
}

impl CleaningOutcome {
    #[must_use]
    pub fn retained_users(&self) -> usize {
        self.data.user_count()
    }
}

/// Drops every user in `cheater_ids` from all user-keyed tables.
#[must_use]
pub fn remove_flagged(
    data: &ExperimentData,
    cheater_ids: &HashSet<UserId>,
    sink: &dyn ReportSink,
) -> (ExperimentData, CleaningStage) {
    sink.info(
        STAGE_KNOWN_CHEATERS,
        &format!("Removing {} known cheaters", cheater_ids.len()),
    );
    remove_users(STAGE_KNOWN_CHEATERS, data, cheater_ids, sink)
}

/// Drops every user in `outlier_ids` from all user-keyed tables.
///
/// Meant to run on the output of [`remove_flagged`].
#[must_use]
pub fn remove_outliers(
    data: &ExperimentData,
    outlier_ids: &HashSet<UserId>,
    sink: &dyn ReportSink,
) -> (ExperimentData, CleaningStage) {
    sink.info(
        STAGE_OUTLIERS,
        &format!("Removing {} spending outliers", outlier_ids.len()),
    );
    remove_users(STAGE_OUTLIERS, data, outlier_ids, sink)
}

/// Flags users whose summed spend of `kind` exceeds `Q3 + multiplier * IQR`.
///
/// Quartiles use linear interpolation over the per-user sums.
#[must_use]
pub fn detect_outliers(
    transactions: &[Transaction],
    kind: TransactionKind,
    multiplier: f64,
    sink: &dyn ReportSink,
) -> OutlierDetection {
    let totals = UserTotals::from_transactions(transactions.iter().filter(|tx| tx.kind == kind));
    detect_outliers_in_totals(&totals, kind, multiplier, sink)
}

/// Outlier detection over precomputed per-user totals.
#[must_use]
pub fn detect_outliers_in_totals(
    totals: &UserTotals,
    kind: TransactionKind,
    multiplier: f64,
    sink: &dyn ReportSink,
) -> OutlierDetection {
    let Some(quartiles) = Quartiles::from_sample(&totals.values()) else {
        sink.warn(
            STAGE_OUTLIERS,
            &format!("No {kind} transactions; outlier detection skipped"),
        );
        return OutlierDetection {
            kind,
            multiplier,
            users_considered: 0,
            quartiles: None,
            threshold: None,
            outlier_ids: Vec::new(),
        };
    };

    let threshold = quartiles.upper_fence(multiplier);
    let mut outlier_ids: Vec<UserId> = totals
        .iter()
        .filter(|(_, total)| *total > threshold)
        .map(|(id, _)| id)
        .collect();
    outlier_ids.sort_unstable();

    sink.info(
        STAGE_OUTLIERS,
        &format!(
            "{kind} spending: Q1={:.2}, Q3={:.2}, IQR={:.2}, threshold={:.2} (k={multiplier})",
            quartiles.q1,
            quartiles.q3,
            quartiles.iqr(),
            threshold
        ),
    );
    sink.info(
        STAGE_OUTLIERS,
        &format!(
            "Detected {} potential cheaters among {} spenders",
            outlier_ids.len(),
            totals.len()
        ),
    );

    OutlierDetection {
        kind,
        multiplier,
        users_considered: totals.len(),
        quartiles: Some(quartiles),
        threshold: Some(threshold),
        outlier_ids,
    }
}

/// Runs both stages: known cheaters first, then outliers detected on the
/// cleaned `kind` transactions.
#[must_use]
pub fn clean(
    data: &ExperimentData,
    kind: TransactionKind,
    multiplier: f64,
    sink: &dyn ReportSink,
) -> CleaningOutcome {
    let original_users = data.user_count();
    let cheater_ids = data.flagged_cheater_ids();
    let (flag_free, known_cheaters) = remove_flagged(data, &cheater_ids, sink);

    let detection = detect_outliers(flag_free.transactions(kind), kind, multiplier, sink);
    let (cleaned, outliers) = remove_outliers(&flag_free, &detection.id_set(), sink);

    sink.info(
        STAGE_OUTLIERS,
        &format!(
            "Retained {} of {} users after cleaning",
            cleaned.user_count(),
            original_users
        ),
    );

    CleaningOutcome {
        data: cleaned,
        original_users,
        known_cheaters,
        detection,
        outliers,
    }
}

fn remove_users(
    stage: &str,
    data: &ExperimentData,
    excluded: &HashSet<UserId>,
    sink: &dyn ReportSink,
) -> (ExperimentData, CleaningStage) {
    let mut removals = Vec::new();
    let mut passthrough = Vec::new();

    let assignments = retain_keyed(tables::ASSIGNMENTS, &data.assignments, excluded, &mut removals);
    let money = retain_keyed(tables::MONEY, &data.money, excluded, &mut removals);
    let cash = retain_keyed(tables::CASH, &data.cash, excluded, &mut removals);
    let platforms = retain_keyed(tables::PLATFORMS, &data.platforms, excluded, &mut removals);
    let cheaters = retain_keyed(tables::CHEATERS, &data.cheaters, excluded, &mut removals);

    let extra = data
        .extra
        .iter()
        .map(|table| match retain_raw(table, excluded) {
            Some((filtered, removal)) => {
                removals.push(removal);
                filtered
            }
            None => {
                sink.warn(
                    stage,
                    &format!(
                        "Table '{}' has no user id column; passed through unfiltered",
                        table.name
                    ),
                );
                passthrough.push(table.name.clone());
                table.clone()
            }
        })
        .collect();

    for removal in &removals {
        sink.info(
            stage,
            &format!(
                "{}: removed {} of {} records ({:.3}%)",
                removal.table,
                removal.removed(),
                removal.before,
                removal.removed_pct()
            ),
        );
    }

    let cleaned = ExperimentData {
        assignments,
        money,
        cash,
        platforms,
        cheaters,
        extra,
    };
    let stage = CleaningStage {
        stage: stage.to_string(),
        excluded_ids: excluded.len(),
        tables: removals,
        passthrough,
    };
    (cleaned, stage)
}

fn retain_keyed<R: UserKeyed + Clone>(
    table: &str,
    rows: &[R],
    excluded: &HashSet<UserId>,
    removals: &mut Vec<TableRemoval>,
) -> Vec<R> {
    let kept: Vec<R> = rows
        .iter()
        .filter(|row| !excluded.contains(&row.user_id()))
        .cloned()
        .collect();
    removals.push(TableRemoval {
        table: table.to_string(),
        before: rows.len(),
        after: kept.len(),
    });
    kept
}

fn retain_raw(table: &RawTable, excluded: &HashSet<UserId>) -> Option<(RawTable, TableRemoval)> {
    let column = table.user_id_column()?;
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            table
                .user_id_at(*i, column)
                .map_or(true, |id| !excluded.contains(&id))
        })
        .map(|(_, row)| row.clone())
        .collect();

    let removal = TableRemoval {
        table: table.name.clone(),
        before: table.rows.len(),
        after: rows.len(),
    };
    Some((
        RawTable::new(table.name.clone(), table.headers.clone(), rows),
        removal,
    ))
}
