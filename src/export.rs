use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Assignment, CategorizedTransaction, Category, Transaction, DEFAULT_CATEGORY_TYPE, DEFAULT_PRIORITY};
use crate::rules::{
    parse_priority, COL_CATEGORY_NAME, COL_CATEGORY_TYPE, COL_COMMENT, COL_DETAILS, COL_PATTERN, COL_PRIORITY,
};
use crate::settings::{ensure_parent, YearDir};
use crate::sheet::Sheet;

pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const BALANCE_FILE: &str = "balance.csv";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const SUMMARY_TRANSACTIONS_FILE: &str = "summary_transactions.csv";
pub const PNL_FILE: &str = "pnl.csv";

/// One line of the annotated export. Column names double as the rule-table
/// schema read back on the next run.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Account")]
    account: &'a str,
    #[serde(rename = "Amount")]
    amount: Decimal,
    #[serde(rename = "Currency")]
    currency: &'a str,
    #[serde(rename = "CategoryType")]
    category_type: &'a str,
    #[serde(rename = "CategoryName")]
    category_name: &'a str,
    #[serde(rename = "Comment")]
    comment: &'a str,
    #[serde(rename = "Priority")]
    priority: Option<i64>,
    #[serde(rename = "Pattern")]
    pattern: &'a str,
    #[serde(rename = "Details")]
    details: &'a str,
}

impl<'a> From<&'a CategorizedTransaction> for ExportRow<'a> {
    fn from(row: &'a CategorizedTransaction) -> Self {
        let t = &row.transaction;
        let a = &row.assignment;
        Self {
            date: t.date,
            account: &t.account,
            amount: t.amount,
            currency: &t.currency,
            category_type: a.category_type(),
            category_name: a.category_name(),
            comment: a.comment(),
            // blank for uncategorized rows so a hand-filled name picks up the default
            priority: a.is_assigned().then(|| a.priority()),
            pattern: a.pattern(),
            details: &t.details,
        }
    }
}

pub fn write_transactions(path: &Path, rows: &[CategorizedTransaction]) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(ExportRow::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write any report table as CSV.
pub fn write_sheet(path: &Path, sheet: &Sheet) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    tracing::debug!(rows = sheet.len(), path = %path.display(), "wrote table");
    Ok(())
}

/// Read the annotated export back, e.g. to reconcile or report without
/// re-normalizing the inputs.
pub fn read_annotated(sheet: &Sheet) -> Result<Vec<CategorizedTransaction>> {
    sheet.require_columns(&["Date", "Account", "Amount", "Currency", COL_DETAILS])?;

    let mut out = Vec::with_capacity(sheet.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        let raw_date = sheet.required(row, i, "Date")?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|_| sheet.invalid("Date", i, raw_date))?;
        let raw_amount = sheet.required(row, i, "Amount")?;
        let amount = Decimal::from_str(raw_amount).map_err(|_| sheet.invalid("Amount", i, raw_amount))?;
        let transaction = Transaction {
            date,
            account: sheet.required(row, i, "Account")?.to_string(),
            amount,
            currency: sheet.required(row, i, "Currency")?.to_string(),
            details: sheet.required(row, i, COL_DETAILS)?.to_string(),
        };

        let assignment = match sheet.optional(row, COL_CATEGORY_NAME) {
            None => Assignment::Unassigned,
            Some(name) => {
                let priority = match sheet.optional(row, COL_PRIORITY) {
                    Some(raw) => parse_priority(raw).ok_or_else(|| sheet.invalid(COL_PRIORITY, i, raw))?,
                    None => DEFAULT_PRIORITY,
                };
                Assignment::Assigned(Category {
                    category_type: sheet
                        .optional(row, COL_CATEGORY_TYPE)
                        .unwrap_or(DEFAULT_CATEGORY_TYPE)
                        .to_string(),
                    category_name: name.to_string(),
                    comment: sheet.optional(row, COL_COMMENT).map(str::to_string),
                    priority,
                    pattern: sheet
                        .optional(row, COL_PATTERN)
                        .unwrap_or(&transaction.details)
                        .to_string(),
                })
            }
        };
        out.push(CategorizedTransaction {
            transaction,
            assignment,
        });
    }
    Ok(out)
}

pub fn load_annotated(year: &YearDir) -> Result<Vec<CategorizedTransaction>> {
    let sheet = Sheet::read(&year.output_file(TRANSACTIONS_FILE))?;
    read_annotated(&sheet)
}
