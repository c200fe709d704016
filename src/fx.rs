use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;

use crate::error::{Result, TallyError};

pub const REPORT_CURRENCY: &str = "USD";

/// A single FX snapshot for the whole run: currency code -> rate in a common
/// unit basis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FxRates {
    rates: BTreeMap<String, Decimal>,
}

impl FxRates {
    pub fn new(rates: BTreeMap<String, Decimal>) -> Self {
        Self { rates }
    }

    /// Load `fx_rates.json`: `{"USD": 1, "EUR": 1.08, ...}`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rates: BTreeMap<String, Decimal> =
            serde_json::from_str(&content).map_err(|e| TallyError::json(path, e))?;
        tracing::debug!(count = rates.len(), path = %path.display(), "loaded FX rates");
        Ok(Self::new(rates))
    }

    pub fn rate(&self, currency: &str) -> Result<Decimal> {
        self.rates
            .get(currency)
            .copied()
            .ok_or_else(|| TallyError::UnknownCurrency(currency.to_string()))
    }

    /// `amount * rate(from) / rate(to)`, rounded to cents. Same-currency
    /// conversion returns `amount` untouched without looking up a rate.
    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        let converted = (amount * from_rate)
            .checked_div(to_rate)
            .ok_or_else(|| TallyError::InvalidRate(to.to_string()))?;
        Ok(converted.round_dp(2))
    }
}
