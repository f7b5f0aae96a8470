//! Typed records for the experiment's input tables.
//!
//! Amounts are `f64`; the statistical pipeline works in double precision
//! throughout and rounds only for display.

pub mod raw_table;
pub mod transaction;
pub mod user;

pub use raw_table::{RawTable, USER_ID_COLUMN};
pub use transaction::{Transaction, TransactionKind};
pub use user::{
    CheaterFlag, Group, GroupAssignment, ParsePlatformError, Platform, PlatformRecord, User,
    UserId, UserKeyed,
};
