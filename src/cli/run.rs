use crate::error::Result;
use crate::fx::FxRates;
use crate::settings::{YearDir, FX_RATES_FILE};

/// The whole yearly pipeline. Each stage's exports stay on disk when a later
/// stage fails.
pub fn run(year: &YearDir) -> Result<()> {
    tracing::info!(year = year.year, path = %year.path().display(), "starting run");
    let fx = FxRates::load(&year.settings_file(FX_RATES_FILE))?;

    super::report::balances(year, &fx)?;
    let rows = super::categorize::categorize(year)?;

    let transactions: Vec<_> = rows.iter().map(|r| r.transaction.clone()).collect();
    super::reconcile::check(year, &transactions)?;

    super::report::summarize(year, &rows, &fx)
}
