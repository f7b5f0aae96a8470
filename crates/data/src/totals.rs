//! Per-user spending totals.
//!
//! `UserTotals` is a mergeable accumulator: totals built from several
//! chunks of a transaction table and merged are identical to totals built
//! from the whole table in one pass.

use crate::models::{Transaction, UserId};
use std::collections::hash_map::{Entry, HashMap};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTotals {
    totals: HashMap<UserId, f64>,
}

impl UserTotals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sums the given transactions per user.
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut totals = Self::new();
        for tx in transactions {
            totals.add(tx.user_id, tx.amount);
        }
        totals
    }

    pub fn add(&mut self, user_id: UserId, amount: f64) {
        *self.totals.entry(user_id).or_insert(0.0) += amount;
    }

    /// Folds another partial aggregate into this one.
    pub fn merge(&mut self, other: UserTotals) {
        for (user_id, amount) in other.totals {
            match self.totals.entry(user_id) {
                Entry::Occupied(mut e) => *e.get_mut() += amount,
                Entry::Vacant(e) => {
                    e.insert(amount);
                }
            }
        }
    }

    /// Drops the given users, returning how many were present.
    pub fn remove_users(&mut self, ids: &HashSet<UserId>) -> usize {
        let before = self.totals.len();
        self.totals.retain(|id, _| !ids.contains(id));
        before - self.totals.len()
    }

    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<f64> {
        self.totals.get(&user_id).copied()
    }

    #[must_use]
    pub fn contains(&self, user_id: UserId) -> bool {
        self.totals.contains_key(&user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UserId, f64)> + '_ {
        self.totals.iter().map(|(id, amount)| (*id, *amount))
    }

    /// All totals, in no particular order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.totals.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_multiple_transactions_per_user() {
        let txs = vec![
            Transaction::real_money(1, 2.5),
            Transaction::real_money(1, 2.5),
            Transaction::real_money(2, 10.0),
        ];
        let totals = UserTotals::from_transactions(&txs);

        assert_eq!(totals.len(), 2);
        assert_eq!(totals.get(UserId(1)), Some(5.0));
        assert_eq!(totals.get(UserId(2)), Some(10.0));
        assert_eq!(totals.get(UserId(3)), None);
    }

    #[test]
    fn chunked_merge_matches_single_pass() {
        let txs: Vec<_> = (0..100)
            .map(|i| Transaction::virtual_currency(i % 7, f64::from(i as u32)))
            .collect();

        let whole = UserTotals::from_transactions(&txs);

        let mut merged = UserTotals::new();
        for chunk in txs.chunks(13) {
            merged.merge(UserTotals::from_transactions(chunk));
        }

        assert_eq!(whole, merged);
    }

    #[test]
    fn remove_users_counts_only_present_ids() {
        let mut totals = UserTotals::from_transactions(&[
            Transaction::virtual_currency(1, 5.0),
            Transaction::virtual_currency(2, 7.0),
        ]);
        let removed = totals.remove_users(&HashSet::from([UserId(2), UserId(3)]));

        assert_eq!(removed, 1);
        assert!(!totals.contains(UserId(2)));
        assert_eq!(totals.get(UserId(1)), Some(5.0));
    }

    #[test]
    fn zero_amount_still_registers_user() {
        let totals = UserTotals::from_transactions(&[Transaction::real_money(9, 0.0)]);
        assert!(totals.contains(UserId(9)));
        assert_eq!(totals.get(UserId(9)), Some(0.0));
    }
}
