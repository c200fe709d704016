use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::error::{Result, TallyError};
use crate::export::TRANSACTIONS_FILE;
use crate::models::{CategoryRule, DEFAULT_CATEGORY_TYPE, DEFAULT_PRIORITY};
use crate::settings::YearDir;
use crate::sheet::Sheet;

pub const COL_DETAILS: &str = "Details";
pub const COL_PATTERN: &str = "Pattern";
pub const COL_PRIORITY: &str = "Priority";
pub const COL_CATEGORY_TYPE: &str = "CategoryType";
pub const COL_CATEGORY_NAME: &str = "CategoryName";
pub const COL_COMMENT: &str = "Comment";

/// Rules for this run, derived from the previous run's (manually corrected)
/// annotated export. Empty on the first run, when no export exists yet.
pub fn load_rules(year: &YearDir) -> Result<Vec<CategoryRule>> {
    let path = year.output_file(TRANSACTIONS_FILE);
    if !path.is_file() {
        tracing::info!(path = %path.display(), "no previous export, starting with an empty rule set");
        return Ok(Vec::new());
    }
    load_rules_from(&path)
}

pub fn load_rules_from(path: &Path) -> Result<Vec<CategoryRule>> {
    let sheet = Sheet::read(path)?;
    let rules = derive_rules(&sheet)?;
    tracing::info!(count = rules.len(), path = %path.display(), "derived category rules");
    Ok(rules)
}

/// Extract rules from categorized rows: Pattern defaults to Details, Priority
/// to 1 and CategoryType to "Costs". Exact duplicates are dropped, keeping the
/// first occurrence.
pub fn derive_rules(sheet: &Sheet) -> Result<Vec<CategoryRule>> {
    sheet.require_columns(&[COL_CATEGORY_NAME, COL_DETAILS])?;

    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    for (i, row) in sheet.rows.iter().enumerate() {
        let Some(category_name) = sheet.optional(row, COL_CATEGORY_NAME) else {
            continue;
        };
        let pattern = match sheet.optional(row, COL_PATTERN) {
            Some(p) => p.to_string(),
            None => sheet.value(row, COL_DETAILS)?.to_string(),
        };
        let priority = match sheet.optional(row, COL_PRIORITY) {
            Some(raw) => parse_priority(raw).ok_or_else(|| sheet.invalid(COL_PRIORITY, i, raw))?,
            None => DEFAULT_PRIORITY,
        };
        let rule = CategoryRule {
            pattern,
            priority,
            category_type: sheet
                .optional(row, COL_CATEGORY_TYPE)
                .unwrap_or(DEFAULT_CATEGORY_TYPE)
                .to_string(),
            category_name: category_name.to_string(),
            comment: sheet.optional(row, COL_COMMENT).map(str::to_string),
        };
        if seen.insert(rule.clone()) {
            rules.push(rule);
        }
    }
    Ok(rules)
}

/// Integer priorities; spreadsheet tools may write them back as `2.0`.
pub(crate) fn parse_priority(raw: &str) -> Option<i64> {
    if let Ok(p) = raw.parse::<i64>() {
        return Some(p);
    }
    let f: f64 = raw.parse().ok()?;
    (f.fract() == 0.0 && f.is_finite()).then_some(f as i64)
}

/// Patterns must be unique within a rule set.
pub fn ensure_unique_patterns(rules: &[CategoryRule]) -> Result<()> {
    let mut seen = HashSet::new();
    let duplicates: BTreeSet<&str> = rules
        .iter()
        .filter(|r| !seen.insert(r.pattern.as_str()))
        .map(|r| r.pattern.as_str())
        .collect();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(TallyError::DuplicatePatterns(
            duplicates.into_iter().map(str::to_string).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::rule;

    fn export(content: &str) -> Sheet {
        Sheet::from_csv_reader("transactions.csv", content.as_bytes()).unwrap()
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let sheet = export(
            "Date,CategoryType,CategoryName,Comment,Priority,Pattern,Details\n\
             2023-01-01,,Groceries,,,,Market\n",
        );
        let rules = derive_rules(&sheet).unwrap();
        assert_eq!(
            rules,
            vec![CategoryRule {
                pattern: "Market".to_string(),
                priority: 1,
                category_type: "Costs".to_string(),
                category_name: "Groceries".to_string(),
                comment: None,
            }]
        );
    }

    #[test]
    fn test_skips_uncategorized_rows() {
        let sheet = export(
            "CategoryName,Pattern,Details\n\
             ,,2023-01-02 Unknown shop\n\
             Rent,Landlord,2023-01-01 Landlord Jan\n",
        );
        let rules = derive_rules(&sheet).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].pattern, "Landlord");
    }

    #[test]
    fn test_removes_exact_duplicates_only() {
        let sheet = export(
            "CategoryType,CategoryName,Comment,Priority,Pattern,Details\n\
             Costs,Rent,,2,Landlord,2023-01-01 Landlord\n\
             Costs,Rent,,2,Landlord,2023-02-01 Landlord\n\
             Costs,Rent,monthly,2,Landlord,2023-03-01 Landlord\n",
        );
        let rules = derive_rules(&sheet).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].comment.as_deref(), Some("monthly"));
        // still two rules with one pattern: rejected when categorizing
        assert!(ensure_unique_patterns(&rules).is_err());
    }

    #[test]
    fn test_spreadsheet_style_priority() {
        let sheet = export("CategoryName,Priority,Details\nTravel,2.0,Train\n");
        assert_eq!(derive_rules(&sheet).unwrap()[0].priority, 2);

        let sheet = export("CategoryName,Priority,Details\nTravel,high,Train\n");
        let err = derive_rules(&sheet).unwrap_err();
        assert!(matches!(err, TallyError::InvalidValue { ref column, row: 1, .. } if column == "Priority"));
    }

    #[test]
    fn test_requires_category_and_details_columns() {
        let sheet = export("Pattern,Details\nx,y\n");
        let err = derive_rules(&sheet).unwrap_err();
        assert_eq!(err.to_string(), "Column 'CategoryName' not found in transactions.csv");
    }

    #[test]
    fn test_duplicate_patterns_are_listed() {
        let rules = vec![
            rule("Amazon", "Shopping", 1),
            rule("Market", "Groceries", 1),
            rule("Amazon", "Books", 2),
        ];
        let err = ensure_unique_patterns(&rules).unwrap_err();
        assert_eq!(err.to_string(), "Duplicates found in Pattern: Amazon");
    }

    #[test]
    fn test_load_rules_without_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let year = YearDir::new(dir.path(), 2023);
        assert!(load_rules(&year).unwrap().is_empty());
    }
}
