use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{Result, TallyError};
use crate::fmt::column;
use crate::models::{AccountBalance, BalanceAssertion, Transaction};
use crate::settings::{YearDir, ACCOUNTS_FILE, BALANCES_FILE};
use crate::sheet::Sheet;

pub const BALANCE_COLUMNS: &[&str] = &["Account", "Balance", "Currency", "Date", "Adjustment"];
pub const ACCOUNT_COLUMNS: &[&str] = &["Account", "Currency", "InitialBalance"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y.%m.%d"];

/// Differences up to one cent are rounding noise.
fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// The numbers behind one reconciliation, rendered as the A)-G) table.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceBreakdown {
    pub currency: String,
    pub initial: Decimal,
    pub pnl: Decimal,
    pub reported: Decimal,
    pub adjustment: Decimal,
}

impl BalanceBreakdown {
    pub fn actual(&self) -> Decimal {
        self.initial + self.pnl
    }

    pub fn expected(&self) -> Decimal {
        self.reported + self.adjustment
    }

    pub fn difference(&self) -> Decimal {
        self.expected() - self.actual()
    }

    /// The Adjustment that would make this assertion reconcile.
    pub fn suggested_adjustment(&self) -> Decimal {
        (self.adjustment - self.difference()).round_dp(2)
    }

    pub fn is_balanced(&self) -> bool {
        self.difference().abs() <= tolerance()
    }
}

impl fmt::Display for BalanceBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.currency;
        writeln!(f, "\tA) Initial:\t\t\t\t{} {c}", column(self.initial))?;
        writeln!(f, "\tB) PnL:\t\t\t\t\t{} {c}", column(self.pnl))?;
        writeln!(f, "\tC) ACTUAL (A+B):\t\t{} {c}", column(self.actual()))?;
        writeln!(f, "\tD) Reported:\t\t\t{} {c}", column(self.reported))?;
        writeln!(f, "\tE) Adjustment:\t\t\t{} {c}", column(self.adjustment))?;
        writeln!(f, "\tF) EXPECTED (D+E):\t\t{} {c}", column(self.expected()))?;
        writeln!(f, "\tG) DIFFERENCE (F-C):\t{} {c}", column(self.difference()))?;
        writeln!(f, "\t--------------------------------------------")?;
        write!(
            f,
            "\tHINT: Set E) to {:.2} to resolve difference",
            self.suggested_adjustment()
        )
    }
}

// ---------------------------------------------------------------------------
// Settings tables
// ---------------------------------------------------------------------------

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
}

fn decimal(sheet: &Sheet, row: &[String], i: usize, col: &str) -> Result<Decimal> {
    let raw = sheet.required(row, i, col)?;
    Decimal::from_str(&raw.replace(',', "")).map_err(|_| sheet.invalid(col, i, raw))
}

pub fn balances_from_sheet(sheet: &Sheet) -> Result<Vec<BalanceAssertion>> {
    sheet.require_columns(BALANCE_COLUMNS)?;
    let mut out = Vec::with_capacity(sheet.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        let raw_date = sheet.required(row, i, "Date")?;
        let adjustment = match sheet.optional(row, "Adjustment") {
            Some(_) => decimal(sheet, row, i, "Adjustment")?,
            None => Decimal::ZERO,
        };
        out.push(BalanceAssertion {
            account: sheet.required(row, i, "Account")?.to_string(),
            currency: sheet.required(row, i, "Currency")?.to_string(),
            date: parse_date(raw_date).ok_or_else(|| sheet.invalid("Date", i, raw_date))?,
            balance: decimal(sheet, row, i, "Balance")?,
            adjustment,
        });
    }
    Ok(out)
}

pub fn accounts_from_sheet(sheet: &Sheet) -> Result<Vec<AccountBalance>> {
    sheet.require_columns(ACCOUNT_COLUMNS)?;
    let mut out = Vec::with_capacity(sheet.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        out.push(AccountBalance {
            account: sheet.required(row, i, "Account")?.to_string(),
            currency: sheet.required(row, i, "Currency")?.to_string(),
            initial_balance: decimal(sheet, row, i, "InitialBalance")?,
            account_type: sheet.optional(row, "AccountType").map(str::to_string),
            account_category: sheet.optional(row, "AccountCategory").map(str::to_string),
        });
    }
    Ok(out)
}

pub fn load_balances(year: &YearDir) -> Result<Vec<BalanceAssertion>> {
    balances_from_sheet(&Sheet::read(&year.settings_file(BALANCES_FILE))?)
}

pub fn load_accounts(year: &YearDir) -> Result<Vec<AccountBalance>> {
    accounts_from_sheet(&Sheet::read(&year.settings_file(ACCOUNTS_FILE))?)
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// The single configured opening balance for `(account, currency)`.
pub fn initial_balance(accounts: &[AccountBalance], account: &str, currency: &str, year: i32) -> Result<Decimal> {
    let mut matches = accounts
        .iter()
        .filter(|a| a.account == account && a.currency == currency);
    let found = matches.next().ok_or_else(|| TallyError::InitialBalanceNotFound {
        account: account.to_string(),
        currency: currency.to_string(),
        year,
    })?;
    if matches.next().is_some() {
        return Err(TallyError::AmbiguousInitialBalance {
            account: account.to_string(),
            currency: currency.to_string(),
            year,
        });
    }
    Ok(found.initial_balance)
}

/// Sum of amounts on `(account, currency)` up to and including `cutoff`.
/// With `require_activity`, an account/currency pair with no transactions at
/// all is an error rather than a zero PnL.
pub fn account_pnl(
    transactions: &[Transaction],
    account: &str,
    currency: &str,
    cutoff: NaiveDate,
    require_activity: bool,
) -> Result<Decimal> {
    let mut matched = transactions
        .iter()
        .filter(|t| t.account == account && t.currency == currency)
        .peekable();
    if require_activity && matched.peek().is_none() {
        return Err(TallyError::MissingActivity {
            account: account.to_string(),
            currency: currency.to_string(),
            date: cutoff,
        });
    }
    Ok(matched.filter(|t| t.date <= cutoff).map(|t| t.amount).sum())
}

pub fn compare_balances(account: &str, date: NaiveDate, breakdown: BalanceBreakdown) -> Result<BalanceBreakdown> {
    if breakdown.is_balanced() {
        Ok(breakdown)
    } else {
        Err(TallyError::BalanceMismatch {
            account: account.to_string(),
            date,
            breakdown: Box::new(breakdown),
        })
    }
}

pub fn reconcile(
    assertion: &BalanceAssertion,
    transactions: &[Transaction],
    accounts: &[AccountBalance],
    year: i32,
) -> Result<BalanceBreakdown> {
    let initial = initial_balance(accounts, &assertion.account, &assertion.currency, year)?;
    let should_have_pnl = initial != assertion.balance + assertion.adjustment;
    let pnl = account_pnl(
        transactions,
        &assertion.account,
        &assertion.currency,
        assertion.date,
        should_have_pnl,
    )?;
    compare_balances(
        &assertion.account,
        assertion.date,
        BalanceBreakdown {
            currency: assertion.currency.clone(),
            initial,
            pnl,
            reported: assertion.balance,
            adjustment: assertion.adjustment,
        },
    )
}

/// Reconcile every assertion in order; the first failure aborts.
pub fn check_balances(
    transactions: &[Transaction],
    assertions: &[BalanceAssertion],
    accounts: &[AccountBalance],
    year: i32,
) -> Result<Vec<BalanceBreakdown>> {
    let mut checked = Vec::with_capacity(assertions.len());
    for assertion in assertions {
        tracing::info!(date = %assertion.date, account = %assertion.account, currency = %assertion.currency, "checking balance");
        checked.push(reconcile(assertion, transactions, accounts, year)?);
    }
    tracing::info!(count = checked.len(), "all balances are checked");
    Ok(checked)
}
