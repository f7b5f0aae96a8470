use crate::models::UserId;
use thiserror::Error;

/// Input errors. None of these are recovered automatically.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("table '{table}', column '{column}', line {line}: cannot parse '{value}'")]
    Parse {
        table: String,
        column: String,
        line: u64,
        value: String,
    },

    #[error("table '{table}': user {user_id} has more than one group assignment")]
    DuplicateAssignment { table: String, user_id: UserId },

    #[error("table '{table}': user {user_id} has more than one platform")]
    DuplicatePlatform { table: String, user_id: UserId },

    #[error("table '{table}', column '{column}': user {user_id} has invalid amount {value}")]
    InvalidAmount {
        table: String,
        column: String,
        user_id: UserId,
        value: f64,
    },

    #[error("table '{table}', line {line}: unknown platform '{value}'")]
    UnknownPlatform {
        table: String,
        line: u64,
        value: String,
    },

    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in table '{table}': {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },
}

impl DatasetError {
    /// Name of the table the error refers to, when there is one.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::MissingColumn { table, .. }
            | Self::Parse { table, .. }
            | Self::DuplicateAssignment { table, .. }
            | Self::DuplicatePlatform { table, .. }
            | Self::InvalidAmount { table, .. }
            | Self::UnknownPlatform { table, .. }
            | Self::Csv { table, .. } => Some(table),
            Self::Io { .. } => None,
        }
    }
}
