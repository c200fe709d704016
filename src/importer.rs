use std::path::Path;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{Result, TallyError};
use crate::models::Transaction;
use crate::settings::YearDir;
use crate::sheet::Sheet;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an amount using `,` as the thousands separator. Accepts `$`,
/// surrounding quotes and accounting-style `(12.00)` negatives.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.replace([',', '"', '$', ' '], "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return Decimal::from_str(inner.trim()).ok().map(|d| -d);
    }
    Decimal::from_str(s).ok()
}

/// Parse with `format`, falling back to ISO dates (spreadsheet date cells are
/// read as `%Y-%m-%d`). A trailing time part is ignored.
pub fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.split_whitespace().next().unwrap_or(raw);
    NaiveDate::parse_from_str(raw, format)
        .or_else(|_| NaiveDate::parse_from_str(day, format))
        .or_else(|_| NaiveDate::parse_from_str(day, "%Y-%m-%d"))
        .ok()
}

fn required_date(sheet: &Sheet, row: &[String], i: usize, column: &str, format: &str) -> Result<NaiveDate> {
    let raw = sheet.required(row, i, column)?;
    parse_date(raw, format).ok_or_else(|| sheet.invalid(column, i, raw))
}

fn required_amount(sheet: &Sheet, row: &[String], i: usize, column: &str) -> Result<Decimal> {
    let raw = sheet.required(row, i, column)?;
    parse_amount(raw).ok_or_else(|| sheet.invalid(column, i, raw))
}

/// Blank cells count as zero (debit/credit split columns).
fn amount_or_zero(sheet: &Sheet, row: &[String], i: usize, column: &str) -> Result<Decimal> {
    match sheet.value(row, column)? {
        "" => Ok(Decimal::ZERO),
        raw => parse_amount(raw).ok_or_else(|| sheet.invalid(column, i, raw)),
    }
}

/// `None` only when the export has no Currency column; a blank cell in an
/// existing column is a missing value.
fn currency(sheet: &Sheet, row: &[String], i: usize) -> Result<Option<String>> {
    if sheet.column_index("Currency").is_err() {
        return Ok(None);
    }
    Ok(Some(sheet.required(row, i, "Currency")?.to_string()))
}

fn join_columns(sheet: &Sheet, row: &[String], columns: &[&str]) -> Result<String> {
    let mut parts = Vec::with_capacity(columns.len());
    for column in columns {
        let value = sheet.value(row, column)?;
        if !value.is_empty() {
            parts.push(value);
        }
    }
    Ok(parts.join(" "))
}

// ---------------------------------------------------------------------------
// Normalizer kinds, looked up by file-name prefix
// ---------------------------------------------------------------------------

/// A source row after format-specific reshaping, before the common finish.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub details: String,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerKind {
    Unicredit,
    Cash,
    CapitalOneSavings,
    CapitalOne,
    HsbcMastercard,
    Hsbc,
    Wise,
}

/// Checked in order: a longer prefix must come before any prefix of it.
const ALL_NORMALIZERS: &[NormalizerKind] = &[
    NormalizerKind::Unicredit,
    NormalizerKind::Cash,
    NormalizerKind::CapitalOneSavings,
    NormalizerKind::CapitalOne,
    NormalizerKind::HsbcMastercard,
    NormalizerKind::Hsbc,
    NormalizerKind::Wise,
];

impl NormalizerKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Unicredit => "Unicredit",
            Self::Cash => "Cash",
            Self::CapitalOneSavings => "CapitalOne_Savings",
            Self::CapitalOne => "CapitalOne",
            Self::HsbcMastercard => "HSBC_Mastercard",
            Self::Hsbc => "HSBC",
            Self::Wise => "Wise",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unicredit => "Unicredit",
            Self::Cash => "Cash / generic",
            Self::CapitalOneSavings => "Capital One Savings",
            Self::CapitalOne => "Capital One",
            Self::HsbcMastercard => "HSBC Mastercard",
            Self::Hsbc => "HSBC",
            Self::Wise => "Wise",
        }
    }

    /// Used when the export has no Currency column.
    pub fn default_currency(&self) -> &'static str {
        match self {
            Self::Unicredit => "HUF",
            _ => "USD",
        }
    }

    pub fn normalize(&self, sheet: &Sheet) -> Result<Vec<RawRow>> {
        match self {
            Self::Unicredit => normalize_unicredit(sheet),
            Self::Cash => normalize_generic(sheet, "%Y-%m-%d"),
            Self::CapitalOneSavings => normalize_capital_one_savings(sheet),
            Self::CapitalOne => normalize_capital_one(sheet),
            Self::HsbcMastercard => normalize_hsbc_mastercard(sheet),
            Self::Hsbc => normalize_generic(sheet, "%m/%d/%Y"),
            Self::Wise => normalize_wise(sheet),
        }
    }
}

pub fn get_for_file(file_name: &str) -> Option<NormalizerKind> {
    ALL_NORMALIZERS
        .iter()
        .find(|n| file_name.starts_with(n.prefix()))
        .copied()
}

pub fn all_normalizers() -> &'static [NormalizerKind] {
    ALL_NORMALIZERS
}

// ---------------------------------------------------------------------------
// Common finish + validation
// ---------------------------------------------------------------------------

/// Account is the file name up to its first `.`.
pub fn account_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Stamp account and currency, prefix Details with the date, collapse runs of
/// whitespace and check the rows belong to `year`.
pub fn finish(
    kind: NormalizerKind,
    file_name: &str,
    rows: Vec<RawRow>,
    year: i32,
) -> Result<Vec<Transaction>> {
    if rows.is_empty() {
        return Err(TallyError::EmptyInput(file_name.to_string()));
    }
    let spaces = Regex::new(r"\s{2,}")?;
    let account = account_name(file_name);

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        if row.details.trim().is_empty() {
            return Err(TallyError::MissingValue {
                table: file_name.to_string(),
                column: "Details".to_string(),
                row: i + 1,
            });
        }
        if row.date.year() != year {
            return Err(TallyError::InvalidYear {
                table: file_name.to_string(),
                found: row.date.year(),
                expected: year,
            });
        }
        let merged = format!("{} {}", row.date.format("%Y-%m-%d"), row.details.trim());
        out.push(Transaction {
            date: row.date,
            account: account.to_string(),
            amount: row.amount,
            currency: row
                .currency
                .unwrap_or_else(|| kind.default_currency().to_string()),
            details: spaces.replace_all(&merged, " ").into_owned(),
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// File / folder entry points
// ---------------------------------------------------------------------------

pub fn parse_transaction_file(path: &Path, year: i32) -> Result<Vec<Transaction>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let kind = get_for_file(&file_name).ok_or_else(|| TallyError::UnknownFormat(file_name.clone()))?;
    let sheet = Sheet::read(path)?;
    let rows = kind.normalize(&sheet)?;
    let transactions = finish(kind, &file_name, rows, year)?;
    tracing::info!(file = %file_name, format = kind.name(), rows = transactions.len(), "parsed transactions");
    Ok(transactions)
}

/// Hidden files, which includes office lock files (`.~lock.*#`).
fn is_skipped(file_name: &str) -> bool {
    file_name.starts_with('.')
}

/// Every export under `<year>/input`, in file-name order.
pub fn parse_transactions(year: &YearDir) -> Result<Vec<Transaction>> {
    let mut paths: Vec<_> = std::fs::read_dir(year.input_dir())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !is_skipped(n))
        })
        .collect();
    paths.sort();

    let mut all = Vec::new();
    for path in &paths {
        all.extend(parse_transaction_file(path, year.year)?);
    }
    tracing::info!(files = paths.len(), rows = all.len(), "normalized input files");
    Ok(all)
}

// ---------------------------------------------------------------------------
// Generic (Cash, HSBC): Date, Amount, Details, optional Currency
// ---------------------------------------------------------------------------

fn normalize_generic(sheet: &Sheet, date_format: &str) -> Result<Vec<RawRow>> {
    sheet.require_columns(&["Date", "Amount", "Details"])?;
    let mut rows = Vec::with_capacity(sheet.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        rows.push(RawRow {
            date: required_date(sheet, row, i, "Date", date_format)?,
            amount: required_amount(sheet, row, i, "Amount")?,
            details: sheet.required(row, i, "Details")?.to_string(),
            currency: currency(sheet, row, i)?,
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Unicredit: Hungarian export, comma decimal separator, booked rows only
// ---------------------------------------------------------------------------

const UNICREDIT_STATUS: &str = "Státusz";
const UNICREDIT_BOOKED: &str = "Könyvelt";
const UNICREDIT_AMOUNT: &str = "Összeg";
const UNICREDIT_DATE: &str = "Érték Dátum";
const UNICREDIT_DETAILS: &[&str] = &["Partner", "Partner Számlaszám", "Tranzakció részletek"];

fn normalize_unicredit(sheet: &Sheet) -> Result<Vec<RawRow>> {
    sheet.require_columns(&[UNICREDIT_STATUS, UNICREDIT_AMOUNT, UNICREDIT_DATE])?;
    sheet.require_columns(UNICREDIT_DETAILS)?;
    let amount_chars = Regex::new(r"[\d,\-]+")?;

    let mut rows = Vec::new();
    for (i, row) in sheet.rows.iter().enumerate() {
        if sheet.value(row, UNICREDIT_STATUS)? != UNICREDIT_BOOKED {
            continue;
        }
        let raw = sheet.required(row, i, UNICREDIT_AMOUNT)?;
        let digits: String = amount_chars
            .find_iter(raw)
            .map(|m| m.as_str())
            .collect::<String>()
            .replace(',', ".");
        let amount = Decimal::from_str(&digits).map_err(|_| sheet.invalid(UNICREDIT_AMOUNT, i, raw))?;
        rows.push(RawRow {
            date: required_date(sheet, row, i, UNICREDIT_DATE, "%Y.%m.%d")?,
            amount,
            details: join_columns(sheet, row, UNICREDIT_DETAILS)?,
            currency: currency(sheet, row, i)?,
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Capital One: split Debit/Credit columns
// ---------------------------------------------------------------------------

fn normalize_capital_one(sheet: &Sheet) -> Result<Vec<RawRow>> {
    sheet.require_columns(&["Posted Date", "Debit", "Credit", "Description"])?;
    let mut rows = Vec::with_capacity(sheet.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        let debit = amount_or_zero(sheet, row, i, "Debit")?;
        let credit = amount_or_zero(sheet, row, i, "Credit")?;
        rows.push(RawRow {
            date: required_date(sheet, row, i, "Posted Date", "%Y-%m-%d")?,
            amount: credit - debit,
            details: sheet.required(row, i, "Description")?.to_string(),
            currency: currency(sheet, row, i)?,
        });
    }
    Ok(rows)
}

fn normalize_capital_one_savings(sheet: &Sheet) -> Result<Vec<RawRow>> {
    sheet.require_columns(&["Transaction Date", "Transaction Amount", "Transaction Description"])?;
    let mut rows = Vec::with_capacity(sheet.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        rows.push(RawRow {
            date: required_date(sheet, row, i, "Transaction Date", "%m/%d/%y")?,
            amount: required_amount(sheet, row, i, "Transaction Amount")?,
            details: sheet.required(row, i, "Transaction Description")?.to_string(),
            currency: currency(sheet, row, i)?,
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// HSBC Mastercard: charges are positive, `--` marks credits
// ---------------------------------------------------------------------------

fn normalize_hsbc_mastercard(sheet: &Sheet) -> Result<Vec<RawRow>> {
    sheet.require_columns(&["Date", "Amount", "Details"])?;
    let mut rows = Vec::with_capacity(sheet.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        let raw = sheet.required(row, i, "Amount")?;
        let amount = parse_amount(&raw.replace("--", "-")).ok_or_else(|| sheet.invalid("Amount", i, raw))?;
        rows.push(RawRow {
            date: required_date(sheet, row, i, "Date", "%m/%d/%Y")?,
            amount: -amount,
            details: sheet.required(row, i, "Details")?.to_string(),
            currency: currency(sheet, row, i)?,
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Wise: multi-currency, details spread over four columns
// ---------------------------------------------------------------------------

const WISE_DETAILS: &[&str] = &["Description", "Payment Reference", "Payee Name", "Payee Account Number"];

fn normalize_wise(sheet: &Sheet) -> Result<Vec<RawRow>> {
    sheet.require_columns(&["Date", "Amount"])?;
    sheet.require_columns(WISE_DETAILS)?;
    let mut rows = Vec::with_capacity(sheet.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        rows.push(RawRow {
            date: required_date(sheet, row, i, "Date", "%d-%m-%Y")?,
            amount: required_amount(sheet, row, i, "Amount")?,
            details: join_columns(sheet, row, WISE_DETAILS)?,
            currency: currency(sheet, row, i)?,
        });
    }
    Ok(rows)
}
