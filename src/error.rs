use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::reconciler::BalanceBreakdown;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    // -- schema ---------------------------------------------------------------
    #[error("Column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("Missing values in '{column}' ({table}, row {row})")]
    MissingValue {
        table: String,
        column: String,
        row: usize,
    },

    #[error("Invalid value '{value}' in '{column}' ({table}, row {row})")]
    InvalidValue {
        table: String,
        column: String,
        row: usize,
        value: String,
    },

    #[error("No transactions found in {0}")]
    EmptyInput(String),

    #[error("Invalid year {found} found in {table} (expected {expected})")]
    InvalidYear {
        table: String,
        found: i32,
        expected: i32,
    },

    // -- configuration ----------------------------------------------------------
    #[error("Duplicates found in Pattern: {}", .0.join(", "))]
    DuplicatePatterns(Vec<String>),

    #[error("No {currency} initial balance found for '{account}' ({year})")]
    InitialBalanceNotFound {
        account: String,
        currency: String,
        year: i32,
    },

    #[error("Multiple {currency} initial balance found for '{account}' ({year})")]
    AmbiguousInitialBalance {
        account: String,
        currency: String,
        year: i32,
    },

    #[error("Cannot find normalizer for \"{0}\"")]
    UnknownFormat(String),

    #[error("Settings error: {0}")]
    Settings(String),

    // -- categorization -----------------------------------------------------------
    #[error("Multiple categories found for pattern '{pattern}' ({category}, priority {priority}):\n{}", .rows.join("\n"))]
    CategoryConflict {
        pattern: String,
        category: String,
        priority: i64,
        rows: Vec<String>,
    },

    #[error("Missing categories found in {} ({count} transactions). Please fill missing categories manually.", .path.display())]
    MissingCategory { path: PathBuf, count: usize },

    // -- reconciliation -----------------------------------------------------------
    #[error("No {currency} transactions found for '{account}' although the reported balance on {date} implies activity")]
    MissingActivity {
        account: String,
        currency: String,
        date: NaiveDate,
    },

    #[error("Balance mismatch for {account} ({date})\n{breakdown}")]
    BalanceMismatch {
        account: String,
        date: NaiveDate,
        breakdown: Box<BalanceBreakdown>,
    },

    // -- currency -------------------------------------------------------------------
    #[error("No FX rate found for '{0}'")]
    UnknownCurrency(String),

    #[error("FX rate for '{0}' is zero")]
    InvalidRate(String),
}

impl TallyError {
    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
