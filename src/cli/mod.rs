pub mod categorize;
pub mod convert;
pub mod init;
pub mod reconcile;
pub mod report;
pub mod rules;
pub mod run;

use clap::{ArgAction, Parser, Subcommand};
use rust_decimal::Decimal;

use crate::settings::YearDir;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Yearly personal bookkeeping: normalize bank exports, categorize, reconcile, summarize."
)]
pub struct Cli {
    /// Data directory holding one folder per year (default: from settings.json)
    #[arg(long = "data-dir", global = true, env = "TALLY_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Accounting year (default: settings.json, then the current year)
    #[arg(long, global = true)]
    pub year: Option<i32>,

    /// More output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn year_dir(&self) -> YearDir {
        YearDir::resolve(self.data_dir.as_deref(), self.year)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save settings and create the year's input/settings/output folders.
    Init,
    /// Run the whole pipeline: balances, rules, normalize, categorize, reconcile, report.
    Run,
    /// Normalize the inputs and categorize them with rules from the last export.
    Categorize,
    /// Check the reported balances in settings/balances.csv.
    Reconcile,
    /// Inspect the rule set derived from the last export.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Summarize the categorized export by month and category.
    Report,
    /// Convert an amount with the year's FX rates.
    Convert {
        /// Amount to convert
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Source currency code
        from: String,
        /// Target currency code
        #[arg(default_value = "USD")]
        to: String,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List the derived rules, strongest first.
    List,
    /// Check the rule set for duplicate patterns.
    Check,
}
