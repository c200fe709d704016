use std::collections::BTreeMap;

use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::categorizer::match_existing_categories;
use crate::error::Result;
use crate::export::TRANSACTIONS_FILE;
use crate::fmt::money;
use crate::importer::parse_transactions;
use crate::models::CategorizedTransaction;
use crate::rules::load_rules;
use crate::settings::YearDir;

pub fn run(year: &YearDir) -> Result<()> {
    let rows = categorize(year)?;
    print_category_counts(&rows);
    Ok(())
}

/// Rules from the last export, then every input file, then the new export.
pub(crate) fn categorize(year: &YearDir) -> Result<Vec<CategorizedTransaction>> {
    let rules = load_rules(year)?;
    let transactions = parse_transactions(year)?;
    let rows = match_existing_categories(transactions, &rules, year)?;
    println!(
        "Categorized {} transactions with {} rules -> {}",
        rows.len(),
        rules.len(),
        year.output_file(TRANSACTIONS_FILE).display()
    );
    Ok(rows)
}

fn print_category_counts(rows: &[CategorizedTransaction]) {
    let mut totals: BTreeMap<(&str, &str, &str), (usize, Decimal)> = BTreeMap::new();
    for row in rows {
        let entry = totals
            .entry((
                row.assignment.category_type(),
                row.assignment.category_name(),
                row.transaction.currency.as_str(),
            ))
            .or_default();
        entry.0 += 1;
        entry.1 += row.transaction.amount;
    }

    let mut table = Table::new();
    table.set_header(vec!["Type", "Category", "Currency", "Count", "Total"]);
    for ((category_type, name, currency), (count, total)) in totals {
        table.add_row(vec![
            Cell::new(category_type),
            Cell::new(name),
            Cell::new(currency),
            Cell::new(count),
            Cell::new(money(total)),
        ]);
    }
    println!("{table}");
}
