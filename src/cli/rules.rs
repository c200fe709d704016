use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::rules::{ensure_unique_patterns, load_rules};
use crate::settings::YearDir;

pub fn list(year: &YearDir) -> Result<()> {
    let mut rules = load_rules(year)?;
    if rules.is_empty() {
        println!("No rules yet. Run `tally categorize` and fill in CategoryName in the export.");
        return Ok(());
    }
    rules.sort_by(|a, b| (a.priority, &a.pattern).cmp(&(b.priority, &b.pattern)));

    let mut table = Table::new();
    table.set_header(vec!["Priority", "Pattern", "Type", "Category", "Comment"]);
    for rule in &rules {
        table.add_row(vec![
            Cell::new(rule.priority),
            Cell::new(&rule.pattern),
            Cell::new(&rule.category_type),
            Cell::new(&rule.category_name),
            Cell::new(rule.comment.as_deref().unwrap_or_default()),
        ]);
    }
    println!("Rules ({})\n{table}", rules.len());
    Ok(())
}

pub fn check(year: &YearDir) -> Result<()> {
    let rules = load_rules(year)?;
    ensure_unique_patterns(&rules)?;
    println!("{} {} rules, all patterns unique", "OK".green().bold(), rules.len());
    Ok(())
}
