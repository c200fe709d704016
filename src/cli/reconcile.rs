use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::importer::parse_transactions;
use crate::models::{BalanceAssertion, Transaction};
use crate::reconciler::{check_balances, load_accounts, load_balances, BalanceBreakdown};
use crate::settings::YearDir;

pub fn run(year: &YearDir) -> Result<()> {
    let transactions = parse_transactions(year)?;
    check(year, &transactions)
}

/// Reconcile every assertion in balances.csv against `transactions`.
pub(crate) fn check(year: &YearDir, transactions: &[Transaction]) -> Result<()> {
    let assertions = load_balances(year)?;
    let accounts = load_accounts(year)?;
    println!("Check monthly balances:");
    let checked = check_balances(transactions, &assertions, &accounts, year.year)?;
    print_checked(&assertions, &checked);
    println!("{}", "All balances are checked!".green().bold());
    Ok(())
}

fn print_checked(assertions: &[BalanceAssertion], checked: &[BalanceBreakdown]) {
    let mut table = Table::new();
    table.set_header(vec!["Date", "Account", "Currency", "Actual", "Expected", ""]);
    for (assertion, breakdown) in assertions.iter().zip(checked) {
        table.add_row(vec![
            Cell::new(assertion.date),
            Cell::new(&assertion.account),
            Cell::new(&assertion.currency),
            Cell::new(money(breakdown.actual())),
            Cell::new(money(breakdown.expected())),
            Cell::new("ok".green()),
        ]);
    }
    println!("{table}");
}
