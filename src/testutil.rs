use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{CategoryRule, Transaction};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn txn(details: &str) -> Transaction {
    Transaction {
        date: date(2023, 1, 1),
        account: "Cash".to_string(),
        amount: dec("-10"),
        currency: "USD".to_string(),
        details: details.to_string(),
    }
}

pub fn rule(pattern: &str, category: &str, priority: i64) -> CategoryRule {
    CategoryRule {
        pattern: pattern.to_string(),
        priority,
        category_type: "Costs".to_string(),
        category_name: category.to_string(),
        comment: None,
    }
}
