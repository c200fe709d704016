use rust_decimal::Decimal;

use crate::error::Result;
use crate::fmt::money;
use crate::fx::FxRates;
use crate::settings::{YearDir, FX_RATES_FILE};

pub fn run(year: &YearDir, amount: Decimal, from: &str, to: &str) -> Result<()> {
    let fx = FxRates::load(&year.settings_file(FX_RATES_FILE))?;
    let converted = fx.convert(amount, from, to)?;
    println!("{} {from} = {} {to}", money(amount), money(converted));
    Ok(())
}
