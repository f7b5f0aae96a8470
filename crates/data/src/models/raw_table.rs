//! Untyped tables carried alongside the experiment data.

use super::user::UserId;
use serde::{Deserialize, Serialize};

/// Canonical user id column name after loader normalization.
pub const USER_ID_COLUMN: &str = "user_id";

/// A table with no fixed schema, e.g. a lookup table supplied with the
/// experiment export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    #[must_use]
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Index of the canonical user id column, if the table has one.
    #[must_use]
    pub fn user_id_column(&self) -> Option<usize> {
        self.headers.iter().position(|h| h == USER_ID_COLUMN)
    }

    /// User id of a row, if the table is keyed and the cell parses.
    #[must_use]
    pub fn user_id_at(&self, row: usize, column: usize) -> Option<UserId> {
        self.rows.get(row)?.get(column)?.parse().ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
