use chrono::NaiveDate;
use rust_decimal::Decimal;

pub const DEFAULT_PRIORITY: i64 = 1;
pub const DEFAULT_CATEGORY_TYPE: &str = "Costs";

/// A normalized money movement. Positive amounts are money in.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub account: String,
    pub amount: Decimal,
    pub currency: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryRule {
    pub pattern: String,
    pub priority: i64,
    pub category_type: String,
    pub category_name: String,
    pub comment: Option<String>,
}

/// The category fields a rule stamps onto a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub category_type: String,
    pub category_name: String,
    pub comment: Option<String>,
    pub priority: i64,
    pub pattern: String,
}

impl From<&CategoryRule> for Category {
    fn from(rule: &CategoryRule) -> Self {
        Self {
            category_type: rule.category_type.clone(),
            category_name: rule.category_name.clone(),
            comment: rule.comment.clone(),
            priority: rule.priority,
            pattern: rule.pattern.clone(),
        }
    }
}

/// Per-transaction categorization state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Assignment {
    #[default]
    Unassigned,
    Assigned(Category),
}

impl Assignment {
    pub fn category(&self) -> Option<&Category> {
        match self {
            Self::Unassigned => None,
            Self::Assigned(c) => Some(c),
        }
    }

    pub fn priority(&self) -> i64 {
        self.category().map_or(DEFAULT_PRIORITY, |c| c.priority)
    }

    pub fn category_name(&self) -> &str {
        self.category().map_or("", |c| c.category_name.as_str())
    }

    pub fn category_type(&self) -> &str {
        self.category().map_or("", |c| c.category_type.as_str())
    }

    pub fn comment(&self) -> &str {
        self.category()
            .and_then(|c| c.comment.as_deref())
            .unwrap_or("")
    }

    pub fn pattern(&self) -> &str {
        self.category().map_or("", |c| c.pattern.as_str())
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedTransaction {
    pub transaction: Transaction,
    pub assignment: Assignment,
}

/// An externally reported balance to reconcile against.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceAssertion {
    pub account: String,
    pub currency: String,
    pub date: NaiveDate,
    pub balance: Decimal,
    pub adjustment: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountBalance {
    pub account: String,
    pub currency: String,
    pub initial_balance: Decimal,
    pub account_type: Option<String>,
    pub account_category: Option<String>,
}
