use std::path::{Path, PathBuf};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

pub const INPUT_DIR: &str = "input";
pub const SETTINGS_DIR: &str = "settings";
pub const OUTPUT_DIR: &str = "output";

pub const ACCOUNTS_FILE: &str = "accounts.csv";
pub const BALANCES_FILE: &str = "balances.csv";
pub const FX_RATES_FILE: &str = "fx_rates.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub default_year: Option<i32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            default_year: None,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tally")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("tally")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TallyError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

/// One accounting year's folder: `<data_dir>/<year>/{input,settings,output}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearDir {
    root: PathBuf,
    pub year: i32,
}

impl YearDir {
    pub fn new(data_dir: impl Into<PathBuf>, year: i32) -> Self {
        Self {
            root: data_dir.into(),
            year,
        }
    }

    /// Resolve the data directory and year from CLI overrides, falling back
    /// to settings.json and then to the current calendar year.
    pub fn resolve(data_dir: Option<&str>, year: Option<i32>) -> Self {
        let settings = load_settings();
        let root = data_dir
            .map(|d| PathBuf::from(shellexpand_path(d)))
            .unwrap_or_else(|| PathBuf::from(&settings.data_dir));
        let year = year
            .or(settings.default_year)
            .unwrap_or_else(|| chrono::Local::now().year());
        Self::new(root, year)
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(self.year.to_string())
    }

    pub fn folder(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    pub fn input_dir(&self) -> PathBuf {
        self.folder(INPUT_DIR)
    }

    pub fn settings_file(&self, file_name: &str) -> PathBuf {
        self.folder(SETTINGS_DIR).join(file_name)
    }

    pub fn output_file(&self, file_name: &str) -> PathBuf {
        self.folder(OUTPUT_DIR).join(file_name)
    }

    pub fn create_layout(&self) -> Result<()> {
        for name in [INPUT_DIR, SETTINGS_DIR, OUTPUT_DIR] {
            std::fs::create_dir_all(self.folder(name))?;
        }
        Ok(())
    }
}

pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            default_year: Some(2023),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.default_year, Some(2023));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.default_year, None);
    }

    #[test]
    fn test_year_dir_layout() {
        let dir = tempfile::tempdir().unwrap();
        let year = YearDir::new(dir.path(), 2023);
        assert_eq!(year.input_dir(), dir.path().join("2023").join("input"));
        assert_eq!(
            year.settings_file(ACCOUNTS_FILE),
            dir.path().join("2023").join("settings").join("accounts.csv")
        );
        assert_eq!(
            year.output_file("transactions.csv"),
            dir.path().join("2023").join("output").join("transactions.csv")
        );
        year.create_layout().unwrap();
        assert!(year.input_dir().is_dir());
        assert!(year.folder(OUTPUT_DIR).is_dir());
    }

    #[test]
    fn test_resolve_prefers_explicit_values() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = YearDir::resolve(dir.path().to_str(), Some(2021));
        assert_eq!(resolved.year, 2021);
        assert!(resolved.path().ends_with("2021"));
    }
}
