use std::cmp::Reverse;

use crate::error::{Result, TallyError};
use crate::export::{write_transactions, TRANSACTIONS_FILE};
use crate::fmt::money;
use crate::models::{Assignment, CategorizedTransaction, Category, CategoryRule, Transaction};
use crate::rules::ensure_unique_patterns;
use crate::settings::YearDir;

/// What a matching rule does to one transaction's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stamp the rule's fields onto the transaction.
    Assign,
    /// Leave the current (stronger) assignment alone.
    Keep,
    /// Same priority, different category: the rule set is ambiguous.
    Conflict,
}

/// Lower priority numbers win. A rule may overwrite an assignment made at a
/// greater priority number, and may always re-apply its own category so
/// updated metadata (comment, pattern) is picked up.
pub fn transition(state: &Assignment, rule: &CategoryRule) -> Transition {
    match state {
        Assignment::Unassigned => Transition::Assign,
        Assignment::Assigned(current) if current.category_name.is_empty() => Transition::Assign,
        Assignment::Assigned(current) if current.category_name == rule.category_name => {
            Transition::Assign
        }
        Assignment::Assigned(current) if current.priority == rule.priority => {
            Transition::Conflict
        }
        Assignment::Assigned(current) if current.priority > rule.priority => Transition::Assign,
        Assignment::Assigned(_) => Transition::Keep,
    }
}

/// Assign a category to every transaction whose Details contain a rule's
/// Pattern. Rules are applied in ascending priority; the first conflict
/// aborts the whole run.
pub fn categorize(
    transactions: Vec<Transaction>,
    rules: &[CategoryRule],
) -> Result<Vec<CategorizedTransaction>> {
    ensure_unique_patterns(rules)?;

    let mut ordered: Vec<&CategoryRule> = rules.iter().collect();
    ordered.sort_by_key(|r| r.priority);

    let mut states = vec![Assignment::Unassigned; transactions.len()];
    for rule in ordered {
        let matched: Vec<usize> = transactions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.details.contains(rule.pattern.as_str()))
            .map(|(i, _)| i)
            .collect();

        let conflicts: Vec<String> = matched
            .iter()
            .filter(|&&i| transition(&states[i], rule) == Transition::Conflict)
            .map(|&i| describe(&transactions[i], &states[i]))
            .collect();
        if !conflicts.is_empty() {
            return Err(TallyError::CategoryConflict {
                pattern: rule.pattern.clone(),
                category: rule.category_name.clone(),
                priority: rule.priority,
                rows: conflicts,
            });
        }

        let mut assigned = 0usize;
        for i in matched {
            if transition(&states[i], rule) == Transition::Assign {
                states[i] = Assignment::Assigned(Category::from(rule));
                assigned += 1;
            }
        }
        tracing::debug!(
            pattern = %rule.pattern,
            category = %rule.category_name,
            priority = rule.priority,
            assigned,
            "applied rule"
        );
    }

    Ok(transactions
        .into_iter()
        .zip(states)
        .map(|(transaction, assignment)| CategorizedTransaction {
            transaction,
            assignment,
        })
        .collect())
}

fn describe(t: &Transaction, state: &Assignment) -> String {
    format!(
        "  {} {} {} {} {} (already '{}')",
        t.date,
        t.account,
        money(t.amount),
        t.currency,
        t.details,
        state.category_name()
    )
}

/// Category name descending, then date ascending. Uncategorized rows sort last.
pub fn sort_for_export(rows: &mut [CategorizedTransaction]) {
    rows.sort_by(|a, b| {
        (Reverse(a.assignment.category_name()), a.transaction.date)
            .cmp(&(Reverse(b.assignment.category_name()), b.transaction.date))
    });
}

/// Categorize, export the annotated table, then fail if anything is left
/// uncategorized. The export is written first so it can be corrected by hand.
pub fn match_existing_categories(
    transactions: Vec<Transaction>,
    rules: &[CategoryRule],
    year: &YearDir,
) -> Result<Vec<CategorizedTransaction>> {
    let mut rows = categorize(transactions, rules)?;
    sort_for_export(&mut rows);

    let path = year.output_file(TRANSACTIONS_FILE);
    write_transactions(&path, &rows)?;
    tracing::info!(rows = rows.len(), path = %path.display(), "exported annotated transactions");

    let missing = rows.iter().filter(|r| !r.assignment.is_assigned()).count();
    if missing > 0 {
        return Err(TallyError::MissingCategory { path, count: missing });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Sheet;
    use crate::testutil::{date, rule, txn};

    fn rules() -> Vec<CategoryRule> {
        vec![
            rule("Vaccine", "Health", 2),
            rule("Amazon", "Shopping", 1),
            rule("Food", "Groceries", 2),
            rule("Market", "Groceries", 1),
            rule("Other", "Misc", 1),
        ]
    }

    fn names(rows: &[CategorizedTransaction]) -> Vec<&str> {
        rows.iter().map(|r| r.assignment.category_name()).collect()
    }

    #[test]
    fn test_single_match_assigns_rule_fields() {
        let mut r = rule("Amazon", "Shopping", 3);
        r.comment = Some("online".to_string());
        r.category_type = "Living".to_string();
        let rows = categorize(vec![txn("2023-01-01 Amazon EU")], &[r]).unwrap();
        let category = rows[0].assignment.category().unwrap();
        assert_eq!(category.category_name, "Shopping");
        assert_eq!(category.category_type, "Living");
        assert_eq!(category.comment.as_deref(), Some("online"));
        assert_eq!(category.priority, 3);
        assert_eq!(category.pattern, "Amazon");
    }

    #[test]
    fn test_unmatched_stays_unassigned() {
        let rows = categorize(vec![txn("Unknown")], &rules()).unwrap();
        assert_eq!(rows[0].assignment, Assignment::Unassigned);
        assert_eq!(rows[0].assignment.priority(), 1);
        assert_eq!(rows[0].assignment.category_name(), "");
    }

    #[test]
    fn test_matching_is_literal_and_case_sensitive() {
        let rows = categorize(
            vec![txn("amazon"), txn("AMAZON"), txn("Amazon.*")],
            &[rule("Amazon.*", "Shopping", 1)],
        )
        .unwrap();
        assert_eq!(names(&rows), vec!["", "", "Shopping"]);
    }

    #[test]
    fn test_lower_priority_number_wins() {
        // Shopping (1) beats Groceries (2) regardless of rule order.
        let rows = categorize(vec![txn("Food from Amazon")], &rules()).unwrap();
        assert_eq!(names(&rows), vec!["Shopping"]);

        let reversed: Vec<_> = rules().into_iter().rev().collect();
        let rows = categorize(vec![txn("Food from Amazon")], &reversed).unwrap();
        assert_eq!(names(&rows), vec!["Shopping"]);
    }

    #[test]
    fn test_same_priority_different_category_conflicts() {
        let err = categorize(vec![txn("Amazon Other"), txn("Amazon")], &rules()).unwrap_err();
        match err {
            TallyError::CategoryConflict { pattern, rows, .. } => {
                assert_eq!(pattern, "Other");
                assert_eq!(rows.len(), 1);
                assert!(rows[0].contains("Amazon Other"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_priority_same_category_is_not_a_conflict() {
        let rules = vec![rule("Market", "Groceries", 1), rule("Fresh", "Groceries", 1)];
        let rows = categorize(vec![txn("Fresh Market")], &rules).unwrap();
        let category = rows[0].assignment.category().unwrap();
        assert_eq!(category.category_name, "Groceries");
        // the later rule re-applied its metadata
        assert_eq!(category.pattern, "Fresh");
    }

    #[test]
    fn test_same_category_picks_up_weaker_rule_metadata() {
        let mut weak = rule("Food", "Groceries", 2);
        weak.comment = Some("weekly shop".to_string());
        let rules = vec![rule("Market", "Groceries", 1), weak];
        let rows = categorize(vec![txn("Food Market")], &rules).unwrap();
        let category = rows[0].assignment.category().unwrap();
        assert_eq!(category.comment.as_deref(), Some("weekly shop"));
        assert_eq!(category.priority, 2);
    }

    #[test]
    fn test_duplicate_patterns_rejected() {
        let mut dup = rules();
        dup.extend(rules());
        let err = categorize(vec![txn("")], &dup).unwrap_err();
        assert!(matches!(err, TallyError::DuplicatePatterns(_)));
    }

    #[test]
    fn test_categorize_is_idempotent() {
        let input = vec![txn("Food from Amazon"), txn("Vaccine"), txn("Nothing")];
        let first = categorize(input.clone(), &rules()).unwrap();
        let second = categorize(input, &rules()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_transition_table() {
        let r = rule("X", "Groceries", 2);
        let at = |name: &str, priority| {
            Assignment::Assigned(Category::from(&rule("Y", name, priority)))
        };
        assert_eq!(transition(&Assignment::Unassigned, &r), Transition::Assign);
        assert_eq!(transition(&at("Shopping", 2), &r), Transition::Conflict);
        assert_eq!(transition(&at("Shopping", 3), &r), Transition::Assign);
        assert_eq!(transition(&at("Shopping", 1), &r), Transition::Keep);
        assert_eq!(transition(&at("Groceries", 1), &r), Transition::Assign);
        assert_eq!(transition(&at("Groceries", 2), &r), Transition::Assign);
    }

    #[test]
    fn test_sort_for_export() {
        let mut a = txn("Market");
        a.date = date(2023, 2, 1);
        let mut b = txn("Market early");
        b.date = date(2023, 1, 1);
        let c = txn("Vaccine");
        let d = txn("Unknown");
        let mut rows = categorize(vec![d, a, c, b], &rules()).unwrap();
        sort_for_export(&mut rows);
        let order: Vec<&str> = rows.iter().map(|r| r.transaction.details.as_str()).collect();
        assert_eq!(order, vec!["Vaccine", "Market early", "Market", "Unknown"]);
    }

    #[test]
    fn test_match_existing_categories_exports_before_failing() {
        let dir = tempfile::tempdir().unwrap();
        let year = YearDir::new(dir.path(), 2023);

        let rows = match_existing_categories(vec![txn("Market")], &rules(), &year).unwrap();
        assert_eq!(names(&rows), vec!["Groceries"]);

        let err = match_existing_categories(vec![txn("Market"), txn("Unknown")], &rules(), &year)
            .unwrap_err();
        match &err {
            TallyError::MissingCategory { path, count } => {
                assert_eq!(*count, 1);
                assert_eq!(path, &year.output_file(TRANSACTIONS_FILE));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("Missing categories found"));

        // the partial export still holds the uncategorized row
        let sheet = Sheet::read(&year.output_file(TRANSACTIONS_FILE)).unwrap();
        assert_eq!(sheet.len(), 2);
        let last = &sheet.rows[1];
        assert_eq!(sheet.value(last, "Details").unwrap(), "Unknown");
        assert_eq!(sheet.value(last, "CategoryName").unwrap(), "");
    }
}
