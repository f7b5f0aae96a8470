//! CSV loading of the experiment tables.
//!
//! Column naming differs between exports (`player_id` vs `user_id`,
//! `money` vs `money_amount`, ...). All aliases are resolved here so the
//! rest of the pipeline only sees the canonical schema.

use crate::dataset::{tables, ExperimentData};
use crate::error::DatasetError;
use crate::models::{
    CheaterFlag, Group, GroupAssignment, Platform, PlatformRecord, RawTable, Transaction,
    TransactionKind, UserId, USER_ID_COLUMN,
};
use crate::totals::UserTotals;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const USER_ID_ALIASES: &[&str] = &["user_id", "player_id"];
const GROUP_ALIASES: &[&str] = &["group", "ab_group"];
const MONEY_ALIASES: &[&str] = &["money", "money_amount", "amount"];
const CASH_ALIASES: &[&str] = &["cash", "cash_amount", "amount"];
const PLATFORM_ALIASES: &[&str] = &["platform"];
const CHEATER_ALIASES: &[&str] = &["cheaters", "cheater", "is_cheater", "flag"];

/// Rows folded into a partial aggregate before it is merged into the total.
pub const STREAM_CHUNK_ROWS: usize = 100_000;

/// Supplies an experiment's tables to the analysis.
pub trait DatasetSource {
    /// # Errors
    /// Returns a `DatasetError` identifying the offending table.
    fn load(&self) -> Result<ExperimentData, DatasetError>;
}

/// File names of the five canonical tables inside a data directory.
#[derive(Debug, Clone)]
pub struct TableFiles {
    pub assignments: String,
    pub money: String,
    pub cash: String,
    pub platforms: String,
    pub cheaters: String,
}

impl Default for TableFiles {
    fn default() -> Self {
        Self {
            assignments: "ABgroup.csv".to_string(),
            money: "Money.csv".to_string(),
            cash: "Cash.csv".to_string(),
            platforms: "Platforms.csv".to_string(),
            cheaters: "Cheaters.csv".to_string(),
        }
    }
}

/// Loads the experiment from a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvDatasetSource {
    dir: PathBuf,
    files: TableFiles,
    extra: Vec<String>,
}

impl CsvDatasetSource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: TableFiles::default(),
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_files(mut self, files: TableFiles) -> Self {
        self.files = files;
        self
    }

    /// Adds pass-through tables by file name.
    #[must_use]
    pub fn with_extra_tables(mut self, extra: Vec<String>) -> Self {
        self.extra = extra;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn open(&self, file: &str) -> Result<File, DatasetError> {
        let path = self.dir.join(file);
        File::open(&path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Streams one transaction table straight into per-user totals
    /// without materializing its rows.
    ///
    /// # Errors
    /// Returns an error on I/O failure, a missing column, an unparsable
    /// cell or an invalid amount.
    pub fn stream_totals(&self, kind: TransactionKind) -> Result<UserTotals, DatasetError> {
        let (file, table) = match kind {
            TransactionKind::RealMoney => (&self.files.money, tables::MONEY),
            TransactionKind::VirtualCurrency => (&self.files.cash, tables::CASH),
        };
        stream_transaction_totals(self.open(file)?, table, kind)
    }

    /// Reads only the group assignment table.
    ///
    /// # Errors
    /// Returns an error on I/O failure, a missing column or an unparsable id.
    pub fn load_assignments(&self) -> Result<Vec<GroupAssignment>, DatasetError> {
        read_assignments(self.open(&self.files.assignments)?, tables::ASSIGNMENTS)
    }

    /// Reads only the cheater flag table.
    ///
    /// # Errors
    /// Returns an error on I/O failure, a missing column or an unparsable flag.
    pub fn load_cheater_flags(&self) -> Result<Vec<CheaterFlag>, DatasetError> {
        read_cheater_flags(self.open(&self.files.cheaters)?, tables::CHEATERS)
    }
}

impl DatasetSource for CsvDatasetSource {
    fn load(&self) -> Result<ExperimentData, DatasetError> {
        info!(dir = %self.dir.display(), "Loading experiment tables");

        let data = ExperimentData {
            assignments: read_assignments(
                self.open(&self.files.assignments)?,
                tables::ASSIGNMENTS,
            )?,
            money: read_transactions(
                self.open(&self.files.money)?,
                tables::MONEY,
                TransactionKind::RealMoney,
            )?,
            cash: read_transactions(
                self.open(&self.files.cash)?,
                tables::CASH,
                TransactionKind::VirtualCurrency,
            )?,
            platforms: read_platforms(self.open(&self.files.platforms)?, tables::PLATFORMS)?,
            cheaters: read_cheater_flags(self.open(&self.files.cheaters)?, tables::CHEATERS)?,
            extra: self
                .extra
                .iter()
                .map(|file| {
                    let name = Path::new(file)
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_lowercase())
                        .unwrap_or_else(|| file.clone());
                    read_raw_table(self.open(file)?, &name)
                })
                .collect::<Result<_, _>>()?,
        };

        info!(
            users = data.assignments.len(),
            money_rows = data.money.len(),
            cash_rows = data.cash.len(),
            platform_rows = data.platforms.len(),
            cheater_rows = data.cheaters.len(),
            extra_tables = data.extra.len(),
            "All tables loaded"
        );

        data.validate()?;
        Ok(data)
    }
}

/// Header lookup with alias resolution.
struct Columns<'a> {
    table: &'a str,
    headers: Vec<String>,
}

impl<'a> Columns<'a> {
    fn read<R: Read>(reader: &mut csv::Reader<R>, table: &'a str) -> Result<Self, DatasetError> {
        let headers = reader
            .headers()
            .map_err(|source| csv_error(table, source))?
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        Ok(Self { table, headers })
    }

    fn find(&self, aliases: &[&str]) -> Result<usize, DatasetError> {
        aliases
            .iter()
            .find_map(|alias| self.headers.iter().position(|h| h == alias))
            .ok_or_else(|| DatasetError::MissingColumn {
                table: self.table.to_string(),
                column: aliases[0].to_string(),
            })
    }
}

fn csv_error(table: &str, source: csv::Error) -> DatasetError {
    DatasetError::Csv {
        table: table.to_string(),
        source,
    }
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    table: &str,
    column: &str,
) -> Result<&'r str, DatasetError> {
    record.get(index).ok_or_else(|| DatasetError::Parse {
        table: table.to_string(),
        column: column.to_string(),
        line: line_of(record),
        value: String::new(),
    })
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    table: &str,
    column: &str,
) -> Result<T, DatasetError> {
    let raw = field(record, index, table, column)?;
    raw.trim().parse().map_err(|_| DatasetError::Parse {
        table: table.to_string(),
        column: column.to_string(),
        line: line_of(record),
        value: raw.to_string(),
    })
}

fn parse_flag(record: &csv::StringRecord, index: usize, table: &str) -> Result<bool, DatasetError> {
    let raw = field(record, index, table, "cheaters")?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Ok(true),
        "0" | "0.0" | "false" | "no" | "" => Ok(false),
        _ => Err(DatasetError::Parse {
            table: table.to_string(),
            column: "cheaters".to_string(),
            line: line_of(record),
            value: raw.to_string(),
        }),
    }
}

fn csv_reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

/// Reads a `(user_id, group)` table.
///
/// # Errors
/// Returns an error on a missing column or an unparsable user id.
pub fn read_assignments<R: Read>(
    source: R,
    table: &str,
) -> Result<Vec<GroupAssignment>, DatasetError> {
    let mut reader = csv_reader(source);
    let columns = Columns::read(&mut reader, table)?;
    let user_col = columns.find(USER_ID_ALIASES)?;
    let group_col = columns.find(GROUP_ALIASES)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| csv_error(table, source))?;
        rows.push(GroupAssignment {
            user_id: parse_field(&record, user_col, table, "user_id")?,
            group: Group::new(field(&record, group_col, table, "group")?),
        });
    }

    debug!(table, rows = rows.len(), "Read group assignments");
    Ok(rows)
}

fn amount_aliases(kind: TransactionKind) -> (&'static [&'static str], &'static str) {
    match kind {
        TransactionKind::RealMoney => (MONEY_ALIASES, "money"),
        TransactionKind::VirtualCurrency => (CASH_ALIASES, "cash"),
    }
}

/// Reads a `(user_id, amount)` transaction table.
///
/// Amount validity is checked by `ExperimentData::validate`.
///
/// # Errors
/// Returns an error on a missing column or an unparsable cell.
pub fn read_transactions<R: Read>(
    source: R,
    table: &str,
    kind: TransactionKind,
) -> Result<Vec<Transaction>, DatasetError> {
    let mut reader = csv_reader(source);
    let columns = Columns::read(&mut reader, table)?;
    let user_col = columns.find(USER_ID_ALIASES)?;
    let (aliases, column) = amount_aliases(kind);
    let amount_col = columns.find(aliases)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| csv_error(table, source))?;
        rows.push(Transaction {
            user_id: parse_field(&record, user_col, table, "user_id")?,
            amount: parse_field(&record, amount_col, table, column)?,
            kind,
        });
    }

    debug!(table, rows = rows.len(), kind = %kind, "Read transactions");
    Ok(rows)
}

/// Folds a transaction table into per-user totals row by row.
///
/// # Errors
/// Returns an error on a missing column, an unparsable cell, or a
/// negative or non-finite amount.
pub fn stream_transaction_totals<R: Read>(
    source: R,
    table: &str,
    kind: TransactionKind,
) -> Result<UserTotals, DatasetError> {
    let mut reader = csv_reader(source);
    let columns = Columns::read(&mut reader, table)?;
    let user_col = columns.find(USER_ID_ALIASES)?;
    let (aliases, column) = amount_aliases(kind);
    let amount_col = columns.find(aliases)?;

    let mut totals = UserTotals::new();
    let mut chunk = UserTotals::new();
    let mut chunk_rows = 0;
    let mut record = csv::StringRecord::new();
    while reader
        .read_record(&mut record)
        .map_err(|source| csv_error(table, source))?
    {
        let user_id: UserId = parse_field(&record, user_col, table, "user_id")?;
        let amount: f64 = parse_field(&record, amount_col, table, column)?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(DatasetError::InvalidAmount {
                table: table.to_string(),
                column: column.to_string(),
                user_id,
                value: amount,
            });
        }
        chunk.add(user_id, amount);
        chunk_rows += 1;
        if chunk_rows == STREAM_CHUNK_ROWS {
            totals.merge(std::mem::take(&mut chunk));
            chunk_rows = 0;
            debug!(table, users = totals.len(), "Folded chunk");
        }
    }
    totals.merge(chunk);

    Ok(totals)
}

/// Reads a `(user_id, platform)` table.
///
/// # Errors
/// Returns an error on a missing column, an unparsable id or an unknown
/// platform name.
pub fn read_platforms<R: Read>(
    source: R,
    table: &str,
) -> Result<Vec<PlatformRecord>, DatasetError> {
    let mut reader = csv_reader(source);
    let columns = Columns::read(&mut reader, table)?;
    let user_col = columns.find(USER_ID_ALIASES)?;
    let platform_col = columns.find(PLATFORM_ALIASES)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| csv_error(table, source))?;
        let raw = field(&record, platform_col, table, "platform")?;
        let platform: Platform = raw.parse().map_err(|_| DatasetError::UnknownPlatform {
            table: table.to_string(),
            line: line_of(&record),
            value: raw.to_string(),
        })?;
        rows.push(PlatformRecord {
            user_id: parse_field(&record, user_col, table, "user_id")?,
            platform,
        });
    }

    Ok(rows)
}

/// Reads a `(user_id, flag)` known-cheater table.
///
/// # Errors
/// Returns an error on a missing column or an unrecognized flag value.
pub fn read_cheater_flags<R: Read>(
    source: R,
    table: &str,
) -> Result<Vec<CheaterFlag>, DatasetError> {
    let mut reader = csv_reader(source);
    let columns = Columns::read(&mut reader, table)?;
    let user_col = columns.find(USER_ID_ALIASES)?;
    let flag_col = columns.find(CHEATER_ALIASES)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| csv_error(table, source))?;
        rows.push(CheaterFlag {
            user_id: parse_field(&record, user_col, table, "user_id")?,
            is_cheater: parse_flag(&record, flag_col, table)?,
        });
    }

    Ok(rows)
}

/// Reads an arbitrary table, renaming any user id alias to `user_id`.
///
/// # Errors
/// Returns an error if the CSV itself is malformed.
pub fn read_raw_table<R: Read>(source: R, table: &str) -> Result<RawTable, DatasetError> {
    let mut reader = csv_reader(source);
    let headers = Columns::read(&mut reader, table)?
        .headers
        .into_iter()
        .map(|h| {
            if USER_ID_ALIASES.contains(&h.as_str()) {
                USER_ID_COLUMN.to_string()
            } else {
                h
            }
        })
        .collect();

    let rows = reader
        .records()
        .map(|r| {
            r.map(|record| record.iter().map(str::to_string).collect())
                .map_err(|source| csv_error(table, source))
        })
        .collect::<Result<_, _>>()?;

    Ok(RawTable::new(table, headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_accept_player_id_alias() {
        let csv = "player_id,group\n1,control\n2,test\n";
        let rows = read_assignments(csv.as_bytes(), "abgroup").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, UserId(1));
        assert_eq!(rows[1].group, Group::test());
    }

    #[test]
    fn assignments_missing_group_column() {
        let csv = "user_id,arm\n1,control\n";
        let err = read_assignments(csv.as_bytes(), "abgroup").unwrap_err();
        match err {
            DatasetError::MissingColumn { table, column } => {
                assert_eq!(table, "abgroup");
                assert_eq!(column, "group");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn transactions_resolve_amount_alias() {
        let csv = "user_id,money_amount\n1,4.99\n1,0.01\n";
        let rows = read_transactions(csv.as_bytes(), "money", TransactionKind::RealMoney).unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0].amount - 4.99).abs() < 1e-12);
        assert_eq!(rows[0].kind, TransactionKind::RealMoney);
    }

    #[test]
    fn transactions_report_unparsable_amount() {
        let csv = "user_id,cash\n1,lots\n";
        let err = read_transactions(csv.as_bytes(), "cash", TransactionKind::VirtualCurrency)
            .unwrap_err();
        match err {
            DatasetError::Parse {
                column, line, value, ..
            } => {
                assert_eq!(column, "cash");
                assert_eq!(line, 2);
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn streaming_totals_rejects_negative_amount() {
        let csv = "user_id,cash\n1,10\n2,-5\n";
        let err =
            stream_transaction_totals(csv.as_bytes(), "cash", TransactionKind::VirtualCurrency)
                .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidAmount { user_id: UserId(2), .. }));
    }

    #[test]
    fn streaming_totals_sum_per_user() {
        let csv = "player_id,cash\n1,10\n2,5\n1,2.5\n";
        let totals =
            stream_transaction_totals(csv.as_bytes(), "cash", TransactionKind::VirtualCurrency)
                .unwrap();
        assert_eq!(totals.get(UserId(1)), Some(12.5));
        assert_eq!(totals.get(UserId(2)), Some(5.0));
    }

    #[test]
    fn streaming_across_chunks_matches_materialized_totals() {
        let mut csv = String::from("user_id,cash\n");
        for i in 0..STREAM_CHUNK_ROWS + 7 {
            csv.push_str(&format!("{},{}\n", i % 11, i % 5));
        }

        let streamed =
            stream_transaction_totals(csv.as_bytes(), "cash", TransactionKind::VirtualCurrency)
                .unwrap();
        let rows =
            read_transactions(csv.as_bytes(), "cash", TransactionKind::VirtualCurrency).unwrap();

        assert_eq!(streamed, UserTotals::from_transactions(&rows));
        assert_eq!(streamed.len(), 11);
    }

    #[test]
    fn cheater_flags_parse_numeric_and_bool() {
        let csv = "user_id,cheaters\n1,1\n2,0\n3,true\n";
        let rows = read_cheater_flags(csv.as_bytes(), "cheaters").unwrap();
        let flagged: Vec<_> = rows.iter().filter(|r| r.is_cheater).map(|r| r.user_id).collect();
        assert_eq!(flagged, vec![UserId(1), UserId(3)]);
    }

    #[test]
    fn platforms_reject_unknown_name() {
        let csv = "user_id,platform\n1,PC\n2,Amiga\n";
        let err = read_platforms(csv.as_bytes(), "platforms").unwrap_err();
        assert!(matches!(err, DatasetError::UnknownPlatform { line: 3, .. }));
    }

    #[test]
    fn raw_table_normalizes_user_column() {
        let csv = "Player_ID,level\n5,12\n";
        let table = read_raw_table(csv.as_bytes(), "levels").unwrap();
        assert_eq!(table.user_id_column(), Some(0));
        assert_eq!(table.rows, vec![vec!["5".to_string(), "12".to_string()]]);
    }
}
