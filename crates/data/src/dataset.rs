//! The full set of input tables for one experiment run.

use crate::error::DatasetError;
use crate::models::{
    CheaterFlag, Group, GroupAssignment, PlatformRecord, RawTable, Transaction, TransactionKind,
    User, UserId,
};
use std::collections::{HashMap, HashSet};

/// Canonical table names, used in errors and cleaning audits.
pub mod tables {
    pub const ASSIGNMENTS: &str = "abgroup";
    pub const MONEY: &str = "money";
    pub const CASH: &str = "cash";
    pub const PLATFORMS: &str = "platforms";
    pub const CHEATERS: &str = "cheaters";
}

/// Read-only inputs of an analysis run in the canonical schema.
///
/// The assignment table defines the user population: a user is "retained"
/// while they still have a group assignment.
#[derive(Debug, Clone, Default)]
pub struct ExperimentData {
    pub assignments: Vec<GroupAssignment>,
    /// Real-money transactions
    pub money: Vec<Transaction>,
    /// Virtual-currency transactions
    pub cash: Vec<Transaction>,
    pub platforms: Vec<PlatformRecord>,
    pub cheaters: Vec<CheaterFlag>,
    /// Extra tables carried through cleaning
    pub extra: Vec<RawTable>,
}

impl ExperimentData {
    /// Checks the input-error rules: one group per user, one platform per
    /// user, and finite non-negative amounts.
    ///
    /// # Errors
    /// Returns the first violation found, naming the offending table.
    pub fn validate(&self) -> Result<(), DatasetError> {
        let mut seen = HashSet::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            if !seen.insert(assignment.user_id) {
                return Err(DatasetError::DuplicateAssignment {
                    table: tables::ASSIGNMENTS.to_string(),
                    user_id: assignment.user_id,
                });
            }
        }

        let mut seen = HashSet::with_capacity(self.platforms.len());
        for record in &self.platforms {
            if !seen.insert(record.user_id) {
                return Err(DatasetError::DuplicatePlatform {
                    table: tables::PLATFORMS.to_string(),
                    user_id: record.user_id,
                });
            }
        }

        for (table, column, transactions) in [
            (tables::MONEY, "money", &self.money),
            (tables::CASH, "cash", &self.cash),
        ] {
            if let Some(tx) = transactions.iter().find(|tx| !tx.has_valid_amount()) {
                return Err(DatasetError::InvalidAmount {
                    table: table.to_string(),
                    column: column.to_string(),
                    user_id: tx.user_id,
                    value: tx.amount,
                });
            }
        }

        Ok(())
    }

    /// Transactions of the given kind.
    #[must_use]
    pub fn transactions(&self, kind: TransactionKind) -> &[Transaction] {
        match kind {
            TransactionKind::RealMoney => &self.money,
            TransactionKind::VirtualCurrency => &self.cash,
        }
    }

    /// Number of users in the population (rows of the assignment table).
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.assignments.len()
    }

    #[must_use]
    pub fn user_ids(&self) -> HashSet<UserId> {
        self.assignments.iter().map(|a| a.user_id).collect()
    }

    /// Distinct groups in the order they first appear.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        for assignment in &self.assignments {
            if !groups.contains(&assignment.group) {
                groups.push(assignment.group.clone());
            }
        }
        groups
    }

    /// Ids whose cheater flag is set.
    #[must_use]
    pub fn flagged_cheater_ids(&self) -> HashSet<UserId> {
        self.cheaters
            .iter()
            .filter(|flag| flag.is_cheater)
            .map(|flag| flag.user_id)
            .collect()
    }

    /// Joined view of the population: assignment, platform and flag.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        let platforms: HashMap<UserId, _> = self
            .platforms
            .iter()
            .map(|p| (p.user_id, p.platform))
            .collect();
        let cheaters = self.flagged_cheater_ids();

        self.assignments
            .iter()
            .map(|a| User {
                id: a.user_id,
                group: a.group.clone(),
                platform: platforms.get(&a.user_id).copied(),
                is_known_cheater: cheaters.contains(&a.user_id),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;

    fn assignment(id: u64, group: &str) -> GroupAssignment {
        GroupAssignment {
            user_id: UserId(id),
            group: Group::new(group),
        }
    }

    fn sample() -> ExperimentData {
        ExperimentData {
            assignments: vec![
                assignment(1, "test"),
                assignment(2, "control"),
                assignment(3, "test"),
            ],
            money: vec![Transaction::real_money(1, 5.0)],
            cash: vec![Transaction::virtual_currency(2, 100.0)],
            platforms: vec![PlatformRecord {
                user_id: UserId(1),
                platform: Platform::Pc,
            }],
            cheaters: vec![
                CheaterFlag {
                    user_id: UserId(3),
                    is_cheater: true,
                },
                CheaterFlag {
                    user_id: UserId(2),
                    is_cheater: false,
                },
            ],
            extra: Vec::new(),
        }
    }

    #[test]
    fn valid_dataset_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn duplicate_assignment_is_rejected() {
        let mut data = sample();
        data.assignments.push(assignment(1, "control"));

        let err = data.validate().unwrap_err();
        assert!(matches!(
            err,
            DatasetError::DuplicateAssignment { user_id: UserId(1), .. }
        ));
        assert_eq!(err.table(), Some("abgroup"));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut data = sample();
        data.cash.push(Transaction::virtual_currency(3, -1.0));

        let err = data.validate().unwrap_err();
        match err {
            DatasetError::InvalidAmount { table, column, .. } => {
                assert_eq!(table, "cash");
                assert_eq!(column, "cash");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_finite_amount_is_rejected() {
        let mut data = sample();
        data.money.push(Transaction::real_money(2, f64::NAN));
        assert!(matches!(
            data.validate(),
            Err(DatasetError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn groups_in_encounter_order() {
        assert_eq!(sample().groups(), vec![Group::test(), Group::control()]);
    }

    #[test]
    fn only_set_flags_are_cheaters() {
        let ids = sample().flagged_cheater_ids();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&UserId(3)));
    }

    #[test]
    fn users_join_platform_and_flag() {
        let users = sample().users();
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].platform, Some(Platform::Pc));
        assert_eq!(users[1].platform, None);
        assert!(users[2].is_known_cheater);
    }
}
