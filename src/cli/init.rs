use std::path::Path;

use colored::Colorize;

use crate::error::Result;
use crate::importer::all_normalizers;
use crate::settings::{
    load_settings, save_settings, shellexpand_path, YearDir, ACCOUNTS_FILE, BALANCES_FILE, FX_RATES_FILE,
};

const ACCOUNTS_TEMPLATE: &str = "Account,Currency,InitialBalance,AccountType,AccountCategory\n";
const BALANCES_TEMPLATE: &str = "Account,Balance,Currency,Date,Adjustment\n";
const FX_RATES_TEMPLATE: &str = "{\n  \"USD\": 1\n}\n";

fn write_if_missing(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, content)?;
    Ok(true)
}

pub fn run(data_dir: Option<&str>, year: Option<i32>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(dir);
    }
    if year.is_some() {
        settings.default_year = year;
    }
    save_settings(&settings)?;

    let year_dir = YearDir::resolve(Some(&settings.data_dir), year);
    year_dir.create_layout()?;
    for (name, template) in [
        (ACCOUNTS_FILE, ACCOUNTS_TEMPLATE),
        (BALANCES_FILE, BALANCES_TEMPLATE),
        (FX_RATES_FILE, FX_RATES_TEMPLATE),
    ] {
        let path = year_dir.settings_file(name);
        if write_if_missing(&path, template)? {
            println!("  created {}", path.display());
        }
    }

    println!(
        "{} {}",
        "Ready:".green().bold(),
        year_dir.path().display()
    );
    println!("Drop bank exports into {}", year_dir.input_dir().display());
    println!("File names must start with a known prefix:");
    for kind in all_normalizers() {
        println!("  {:<20} {}", kind.prefix(), kind.name());
    }
    Ok(())
}
