//! Spending records in real money and in-game currency.

use super::user::{UserId, UserKeyed};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency a transaction was made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Real-money payment
    RealMoney,
    /// In-game currency spend
    VirtualCurrency,
}

impl TransactionKind {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::RealMoney => "real_money",
            TransactionKind::VirtualCurrency => "virtual_currency",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single payment or currency spend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: UserId,
    /// Non-negative amount in the currency of `kind`
    pub amount: f64,
    pub kind: TransactionKind,
}

impl Transaction {
    #[must_use]
    pub fn real_money(user_id: u64, amount: f64) -> Self {
        Self {
            user_id: UserId(user_id),
            amount,
            kind: TransactionKind::RealMoney,
        }
    }

    #[must_use]
    pub fn virtual_currency(user_id: u64, amount: f64) -> Self {
        Self {
            user_id: UserId(user_id),
            amount,
            kind: TransactionKind::VirtualCurrency,
        }
    }

    /// Returns true if the amount is finite and non-negative.
    #[must_use]
    pub fn has_valid_amount(&self) -> bool {
        self.amount.is_finite() && self.amount >= 0.0
    }
}

impl UserKeyed for Transaction {
    fn user_id(&self) -> UserId {
        self.user_id
    }
}
