//! Typed input tables for A/B experiment analysis.
//!
//! This crate provides:
//! - Records for group assignments, transactions, platforms and cheater flags
//! - `ExperimentData`, the validated set of tables for one run
//! - CSV loading with column-alias normalization
//! - `UserTotals`, a mergeable per-user spending accumulator

pub mod csv_storage;
pub mod dataset;
pub mod error;
pub mod models;
pub mod totals;

pub use csv_storage::{CsvDatasetSource, DatasetSource, TableFiles};
pub use dataset::{tables, ExperimentData};
pub use error::DatasetError;
pub use totals::UserTotals;

pub use models::{
    CheaterFlag, Group, GroupAssignment, Platform, PlatformRecord, RawTable, Transaction,
    TransactionKind, User, UserId, UserKeyed,
};
