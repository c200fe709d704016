use rust_decimal::Decimal;

/// Format a decimal with thousands separators and two places: 1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let fixed = format!("{:.2}", val.abs().round_dp(2));
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Right-aligned, ten wide, two places. Used in the reconciliation breakdown.
pub fn column(val: Decimal) -> String {
    format!("{:>10}", format!("{:.2}", val.round_dp(2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::dec;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(dec("1234.56")), "1,234.56");
        assert_eq!(money(dec("-500.00")), "-500.00");
        assert_eq!(money(Decimal::ZERO), "0.00");
        assert_eq!(money(dec("1000000.99")), "1,000,000.99");
        assert_eq!(money(dec("42.1")), "42.10");
    }

    #[test]
    fn test_column_is_padded() {
        assert_eq!(column(dec("12.5")), "     12.50");
        assert_eq!(column(dec("-3")), "     -3.00");
    }
}
