use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::export::{write_sheet, PNL_FILE, SUMMARY_FILE, SUMMARY_TRANSACTIONS_FILE};
use crate::fx::{FxRates, REPORT_CURRENCY};
use crate::models::{AccountBalance, CategorizedTransaction};
use crate::reconciler::accounts_from_sheet;
use crate::settings::{YearDir, ACCOUNTS_FILE};
use crate::sheet::Sheet;

/// Category names that are not part of day-to-day living costs.
const NON_LIVING_PREFIXES: &[&str] = &["Savings", "Donation", "Sunk Costs"];

// ---------------------------------------------------------------------------
// Monthly enrichment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SummarizedTransaction {
    pub row: CategorizedTransaction,
    pub month: u32,
    pub amount_usd: Decimal,
}

/// Add Month and the USD amount to every row, ordered by date.
pub fn summarize_months(rows: &[CategorizedTransaction], fx: &FxRates) -> Result<Vec<SummarizedTransaction>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let t = &row.transaction;
        out.push(SummarizedTransaction {
            row: row.clone(),
            month: t.date.month(),
            amount_usd: fx.convert(t.amount, &t.currency, REPORT_CURRENCY)?,
        });
    }
    out.sort_by_key(|s| s.row.transaction.date);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Category x month pivot
// ---------------------------------------------------------------------------

pub struct CategorySummaryRow {
    pub category_type: String,
    pub category_name: String,
    pub by_month: BTreeMap<u32, Decimal>,
}

pub struct CategorySummary {
    pub months: Vec<u32>,
    pub rows: Vec<CategorySummaryRow>,
}

impl CategorySummary {
    pub fn amount(&self, row: &CategorySummaryRow, month: u32) -> Decimal {
        row.by_month.get(&month).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn to_sheet(&self) -> Sheet {
        let mut headers = vec!["CategoryType".to_string(), "CategoryName".to_string()];
        headers.extend(self.months.iter().map(u32::to_string));
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut line = vec![r.category_type.clone(), r.category_name.clone()];
                line.extend(self.months.iter().map(|&m| self.amount(r, m).normalize().to_string()));
                line
            })
            .collect();
        Sheet {
            name: SUMMARY_FILE.to_string(),
            headers,
            rows,
        }
    }
}

/// Summed USD amounts per (CategoryType, CategoryName) and month, rows ordered
/// by type then name. Only months with at least one transaction get a column.
pub fn summarize_categories(rows: &[SummarizedTransaction]) -> CategorySummary {
    let months: BTreeSet<u32> = rows.iter().map(|r| r.month).collect();
    let mut grouped: BTreeMap<(String, String), BTreeMap<u32, Decimal>> = BTreeMap::new();
    for r in rows {
        let key = (
            r.row.assignment.category_type().to_string(),
            r.row.assignment.category_name().to_string(),
        );
        *grouped.entry(key).or_default().entry(r.month).or_default() += r.amount_usd;
    }
    CategorySummary {
        months: months.into_iter().collect(),
        rows: grouped
            .into_iter()
            .map(|((category_type, category_name), by_month)| CategorySummaryRow {
                category_type,
                category_name,
                by_month,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Monthly-average PnL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PnlItem {
    pub category_type: String,
    pub living_expense: bool,
    pub category_name: String,
    /// Absolute monthly average in USD, whole units.
    pub amount_usd: Decimal,
}

pub fn is_living_expense(category_name: &str) -> bool {
    !NON_LIVING_PREFIXES.iter().any(|p| category_name.starts_with(p))
}

/// `abs(round(sum / months))` per category, where `months` counts the distinct
/// months present in the whole data set.
pub fn pnl_summary(rows: &[SummarizedTransaction]) -> Vec<PnlItem> {
    let months = rows.iter().map(|r| r.month).collect::<BTreeSet<_>>().len();
    if months == 0 {
        return Vec::new();
    }
    let mut grouped: BTreeMap<(String, bool, String), Decimal> = BTreeMap::new();
    for r in rows {
        let name = r.row.assignment.category_name();
        let key = (
            r.row.assignment.category_type().to_string(),
            is_living_expense(name),
            name.to_string(),
        );
        *grouped.entry(key).or_default() += r.amount_usd;
    }
    let divisor = Decimal::from(months);
    grouped
        .into_iter()
        .map(|((category_type, living_expense, category_name), total)| PnlItem {
            category_type,
            living_expense,
            category_name,
            amount_usd: (total / divisor).round().abs(),
        })
        .collect()
}

/// Sum of the monthly averages flagged as living expenses.
pub fn living_expense_total(items: &[PnlItem]) -> Decimal {
    items.iter().filter(|i| i.living_expense).map(|i| i.amount_usd).sum()
}

pub fn pnl_sheet(items: &[PnlItem]) -> Sheet {
    Sheet::new(
        PNL_FILE,
        &["CategoryType", "LivingExpense", "CategoryName", "AmountUSD"],
        items
            .iter()
            .map(|i| {
                vec![
                    i.category_type.clone(),
                    i.living_expense.to_string(),
                    i.category_name.clone(),
                    i.amount_usd.to_string(),
                ]
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Transactions by month
// ---------------------------------------------------------------------------

/// Month descending, category ascending, date ascending.
pub fn summary_transactions(rows: &[SummarizedTransaction]) -> Sheet {
    let mut sorted: Vec<&SummarizedTransaction> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        (Reverse(a.month), a.row.assignment.category_name(), a.row.transaction.date).cmp(&(
            Reverse(b.month),
            b.row.assignment.category_name(),
            b.row.transaction.date,
        ))
    });
    Sheet::new(
        SUMMARY_TRANSACTIONS_FILE,
        &["Month", "CategoryName", "Comment", "Date", "Account", "Amount", "Currency", "Details"],
        sorted
            .into_iter()
            .map(|s| {
                let t = &s.row.transaction;
                vec![
                    s.month.to_string(),
                    s.row.assignment.category_name().to_string(),
                    s.row.assignment.comment().to_string(),
                    t.date.format("%Y-%m-%d").to_string(),
                    t.account.clone(),
                    t.amount.to_string(),
                    t.currency.clone(),
                    t.details.clone(),
                ]
            })
            .collect(),
    )
}

/// Everything computed from the categorized year, ready to print or save.
pub struct YearReport {
    pub transactions: Vec<SummarizedTransaction>,
    pub categories: CategorySummary,
    pub pnl: Vec<PnlItem>,
}

pub fn build_report(rows: &[CategorizedTransaction], fx: &FxRates) -> Result<YearReport> {
    let transactions = summarize_months(rows, fx)?;
    let categories = summarize_categories(&transactions);
    let pnl = pnl_summary(&transactions);
    Ok(YearReport {
        transactions,
        categories,
        pnl,
    })
}

pub fn save_report(year: &YearDir, report: &YearReport) -> Result<()> {
    write_sheet(&year.output_file(SUMMARY_FILE), &report.categories.to_sheet())?;
    write_sheet(
        &year.output_file(SUMMARY_TRANSACTIONS_FILE),
        &summary_transactions(&report.transactions),
    )?;
    write_sheet(&year.output_file(PNL_FILE), &pnl_sheet(&report.pnl))?;
    tracing::info!(rows = report.transactions.len(), "saved summary reports");
    Ok(())
}

// ---------------------------------------------------------------------------
// Opening balances by account type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceItem {
    pub account_type: String,
    pub account_category: String,
    pub amount_usd: Decimal,
}

/// Initial balances in USD, rounded to whole units per account, then summed
/// per (AccountType, AccountCategory). Accounts without both labels are left
/// out.
pub fn balance_summary(accounts: &[AccountBalance], fx: &FxRates) -> Result<Vec<BalanceItem>> {
    let mut grouped: BTreeMap<(String, String), Decimal> = BTreeMap::new();
    for a in accounts {
        let (Some(account_type), Some(account_category)) = (&a.account_type, &a.account_category) else {
            tracing::debug!(account = %a.account, "no account type, left out of balance summary");
            continue;
        };
        let usd = fx.convert(a.initial_balance, &a.currency, REPORT_CURRENCY)?.round();
        *grouped
            .entry((account_type.clone(), account_category.clone()))
            .or_default() += usd;
    }
    Ok(grouped
        .into_iter()
        .map(|((account_type, account_category), amount_usd)| BalanceItem {
            account_type,
            account_category,
            amount_usd,
        })
        .collect())
}

pub fn balance_sheet(items: &[BalanceItem]) -> Sheet {
    Sheet::new(
        crate::export::BALANCE_FILE,
        &["AccountType", "AccountCategory", "AmountUSD"],
        items
            .iter()
            .map(|i| vec![i.account_type.clone(), i.account_category.clone(), i.amount_usd.to_string()])
            .collect(),
    )
}

/// Read `accounts.csv` (which must carry the type/category columns) and
/// summarize it.
pub fn load_balance_summary(year: &YearDir, fx: &FxRates) -> Result<Vec<BalanceItem>> {
    let sheet = Sheet::read(&year.settings_file(ACCOUNTS_FILE))?;
    sheet.require_columns(&["AccountType", "AccountCategory"])?;
    balance_summary(&accounts_from_sheet(&sheet)?, fx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Assignment, Category, Transaction};
    use crate::testutil::{date, dec, rule};

    fn fx() -> FxRates {
        FxRates::new(
            [("USD", "1"), ("EUR", "1.1"), ("HUF", "0.003")]
                .iter()
                .map(|(c, r)| (c.to_string(), dec(r)))
                .collect(),
        )
    }

    fn row(d: (u32, u32), amount: &str, currency: &str, category: &str) -> CategorizedTransaction {
        let mut r = rule(category, category, 1);
        if category.starts_with("Salary") {
            r.category_type = "Income".to_string();
        }
        CategorizedTransaction {
            transaction: Transaction {
                date: date(2023, d.0, d.1),
                account: "Wise".to_string(),
                amount: dec(amount),
                currency: currency.to_string(),
                details: format!("{category} {}", d.1),
            },
            assignment: Assignment::Assigned(Category::from(&r)),
        }
    }

    fn sample() -> Vec<CategorizedTransaction> {
        vec![
            row((2, 3), "-10", "EUR", "Groceries"),
            row((1, 15), "-20", "USD", "Groceries"),
            row((1, 1), "1000", "USD", "Salary"),
            row((2, 1), "1000", "USD", "Salary"),
            row((2, 10), "-300", "USD", "Savings ETF"),
        ]
    }

    #[test]
    fn test_summarize_months_converts_and_sorts() {
        let rows = summarize_months(&sample(), &fx()).unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.row.transaction.date).collect();
        assert_eq!(dates[0], date(2023, 1, 1));
        assert_eq!(dates[4], date(2023, 2, 10));
        let eur = rows.iter().find(|r| r.row.transaction.currency == "EUR").unwrap();
        assert_eq!(eur.month, 2);
        assert_eq!(eur.amount_usd, dec("-11.00"));
    }

    #[test]
    fn test_unknown_currency_in_report() {
        let rows = vec![row((1, 1), "5", "GBP", "Gift")];
        assert!(summarize_months(&rows, &fx()).is_err());
    }

    #[test]
    fn test_category_pivot_fills_absent_months_with_zero() {
        let rows = summarize_months(&sample(), &fx()).unwrap();
        let summary = summarize_categories(&rows);
        assert_eq!(summary.months, vec![1, 2]);
        let sheet = summary.to_sheet();
        assert_eq!(sheet.headers, vec!["CategoryType", "CategoryName", "1", "2"]);
        assert_eq!(
            sheet.rows,
            vec![
                vec!["Costs", "Groceries", "-20", "-11"],
                vec!["Costs", "Savings ETF", "0", "-300"],
                vec!["Income", "Salary", "1000", "1000"],
            ]
        );
    }

    #[test]
    fn test_pnl_monthly_average() {
        let rows = summarize_months(&sample(), &fx()).unwrap();
        let pnl = pnl_summary(&rows);
        let find = |name: &str| pnl.iter().find(|p| p.category_name == name).unwrap();
        // (-20 + -11) / 2 = -15.5 -> banker's rounding -> -16 -> 16
        assert_eq!(find("Groceries").amount_usd, dec("16"));
        assert!(find("Groceries").living_expense);
        assert_eq!(find("Savings ETF").amount_usd, dec("150"));
        assert!(!find("Savings ETF").living_expense);
        assert_eq!(find("Salary").amount_usd, dec("1000"));
        // ordered by type, then living flag, then name
        assert_eq!(pnl[0].category_name, "Savings ETF");
    }

    #[test]
    fn test_living_expense_total_follows_flag_only() {
        let rows = summarize_months(&sample(), &fx()).unwrap();
        let pnl = pnl_summary(&rows);
        // Groceries 16 + Salary 1000; Savings ETF is excluded
        assert_eq!(living_expense_total(&pnl), dec("1016"));
    }

    #[test]
    fn test_living_expense_prefixes() {
        assert!(!is_living_expense("Donation Red Cross"));
        assert!(!is_living_expense("Sunk Costs"));
        assert!(is_living_expense("Rent"));
        assert!(is_living_expense("My Savings"));
    }

    #[test]
    fn test_summary_transactions_order() {
        let rows = summarize_months(&sample(), &fx()).unwrap();
        let sheet = summary_transactions(&rows);
        let order: Vec<(&str, &str)> = sheet
            .rows
            .iter()
            .map(|r| (r[0].as_str(), r[1].as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2", "Groceries"),
                ("2", "Salary"),
                ("2", "Savings ETF"),
                ("1", "Groceries"),
                ("1", "Salary"),
            ]
        );
    }

    #[test]
    fn test_balance_summary() {
        let account = |name: &str, ccy: &str, initial: &str, kind: Option<&str>| AccountBalance {
            account: name.to_string(),
            currency: ccy.to_string(),
            initial_balance: dec(initial),
            account_type: kind.map(str::to_string),
            account_category: kind.map(|_| "Bank".to_string()),
        };
        let accounts = vec![
            account("Wise", "EUR", "100.40", Some("Asset")),
            account("HSBC", "USD", "50.6", Some("Asset")),
            account("Card", "USD", "-20", Some("Liability")),
            account("Cash", "USD", "5", None),
        ];
        let items = balance_summary(&accounts, &fx()).unwrap();
        assert_eq!(
            items,
            vec![
                BalanceItem {
                    account_type: "Asset".to_string(),
                    account_category: "Bank".to_string(),
                    // 110.44 -> 110, 50.6 -> 51
                    amount_usd: dec("161"),
                },
                BalanceItem {
                    account_type: "Liability".to_string(),
                    account_category: "Bank".to_string(),
                    amount_usd: dec("-20"),
                },
            ]
        );
    }

    #[test]
    fn test_balance_summary_requires_type_columns() {
        let dir = tempfile::tempdir().unwrap();
        let year = YearDir::new(dir.path(), 2023);
        year.create_layout().unwrap();
        std::fs::write(year.settings_file(ACCOUNTS_FILE), "Account,Currency,InitialBalance\nWise,EUR,1\n").unwrap();
        let err = load_balance_summary(&year, &fx()).unwrap_err();
        assert_eq!(err.to_string(), "Column 'AccountType' not found in accounts.csv");
    }

    #[test]
    fn test_save_report_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let year = YearDir::new(dir.path(), 2023);
        let report = build_report(&sample(), &fx()).unwrap();
        save_report(&year, &report).unwrap();
        for name in [SUMMARY_FILE, SUMMARY_TRANSACTIONS_FILE, PNL_FILE] {
            assert!(year.output_file(name).is_file(), "{name} missing");
        }
    }
}
