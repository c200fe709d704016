use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::error::{Result, TallyError};
use crate::export::{load_annotated, write_sheet, BALANCE_FILE, TRANSACTIONS_FILE};
use crate::fmt::money;
use crate::fx::FxRates;
use crate::models::CategorizedTransaction;
use crate::reports::{self, BalanceItem, YearReport};
use crate::settings::{YearDir, FX_RATES_FILE};

pub fn run(year: &YearDir) -> Result<()> {
    let rows = load_annotated(year)?;
    let missing = rows.iter().filter(|r| !r.assignment.is_assigned()).count();
    if missing > 0 {
        return Err(TallyError::MissingCategory {
            path: year.output_file(TRANSACTIONS_FILE),
            count: missing,
        });
    }
    let fx = FxRates::load(&year.settings_file(FX_RATES_FILE))?;
    summarize(year, &rows, &fx)
}

pub(crate) fn summarize(year: &YearDir, rows: &[CategorizedTransaction], fx: &FxRates) -> Result<()> {
    let report = reports::build_report(rows, fx)?;
    reports::save_report(year, &report)?;
    print_categories(&report);
    print_pnl(&report);
    Ok(())
}

/// Write `balance.csv` and print it.
pub(crate) fn balances(year: &YearDir, fx: &FxRates) -> Result<()> {
    let items = reports::load_balance_summary(year, fx)?;
    write_sheet(&year.output_file(BALANCE_FILE), &reports::balance_sheet(&items))?;
    print_balances(&items);
    Ok(())
}

fn print_categories(report: &YearReport) {
    let summary = &report.categories;
    let mut header = vec!["Type".to_string(), "Category".to_string()];
    header.extend(summary.months.iter().map(|m| format!("{m:02}")));
    let mut table = Table::new();
    table.set_header(header);
    for row in &summary.rows {
        let mut cells = vec![Cell::new(&row.category_type), Cell::new(&row.category_name)];
        cells.extend(summary.months.iter().map(|&m| Cell::new(money(summary.amount(row, m)))));
        table.add_row(cells);
    }
    println!("Summary (USD)\n{table}");
}

fn print_pnl(report: &YearReport) {
    let mut table = Table::new();
    table.set_header(vec!["Type", "Living", "Category", "Monthly avg (USD)"]);
    for item in &report.pnl {
        table.add_row(vec![
            Cell::new(&item.category_type),
            Cell::new(if item.living_expense { "yes" } else { "no" }),
            Cell::new(&item.category_name),
            Cell::new(money(item.amount_usd)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Living expenses".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(money(reports::living_expense_total(&report.pnl)).red().to_string()),
    ]);
    println!("\nMonthly PnL\n{table}");
}

fn print_balances(items: &[BalanceItem]) {
    let mut table = Table::new();
    table.set_header(vec!["Type", "Category", "USD"]);
    let mut total = Decimal::ZERO;
    for item in items {
        total += item.amount_usd;
        table.add_row(vec![
            Cell::new(&item.account_type),
            Cell::new(&item.account_category),
            Cell::new(money(item.amount_usd)),
        ]);
    }
    let total_cell = if total >= Decimal::ZERO {
        money(total).green().to_string()
    } else {
        money(total).red().to_string()
    };
    table.add_row(vec![Cell::new("Total".bold()), Cell::new(""), Cell::new(total_cell)]);
    println!("Opening balances\n{table}");
}
