//! Header-addressed string tables read from CSV or spreadsheet files.
//!
//! Every stage that consumes files on disk (bank exports, settings tables,
//! the previous run's annotated export) goes through a [`Sheet`], so column
//! presence and missing-value checks are reported the same way everywhere.

use std::path::Path;

use crate::error::{Result, TallyError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    /// Display name used in error messages, usually the file name.
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: &str, headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    /// Read a `.csv` file or, with the `xlsx` feature, the first worksheet of
    /// an `.xlsx`/`.xls`/`.ods` workbook.
    pub fn read(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            #[cfg(feature = "xlsx")]
            "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path, name),
            _ => {
                let file = std::fs::File::open(path)?;
                Self::from_csv_reader(&name, std::io::BufReader::new(file))
            }
        }
    }

    pub fn from_csv_reader<R: std::io::Read>(name: &str, reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let mut row: Vec<String> = record.iter().map(|f| f.trim().to_string()).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }
        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| TallyError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    /// Cell text, empty when the row is shorter than the header.
    pub fn value<'a>(&'a self, row: &'a [String], column: &str) -> Result<&'a str> {
        let idx = self.column_index(column)?;
        Ok(row.get(idx).map(String::as_str).unwrap_or(""))
    }

    /// Like [`Sheet::value`] but an empty cell is a missing-value error.
    /// `row_number` is zero-based; messages report it one-based.
    pub fn required<'a>(&'a self, row: &'a [String], row_number: usize, column: &str) -> Result<&'a str> {
        let value = self.value(row, column)?;
        if value.is_empty() {
            return Err(self.missing(column, row_number));
        }
        Ok(value)
    }

    /// Optional column: `None` when the column is absent or the cell is empty.
    pub fn optional<'a>(&'a self, row: &'a [String], column: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        row.get(idx).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn missing(&self, column: &str, row_number: usize) -> TallyError {
        TallyError::MissingValue {
            table: self.name.clone(),
            column: column.to_string(),
            row: row_number + 1,
        }
    }

    pub fn invalid(&self, column: &str, row_number: usize, value: &str) -> TallyError {
        TallyError::InvalidValue {
            table: self.name.clone(),
            column: column.to_string(),
            row: row_number + 1,
            value: value.to_string(),
        }
    }
}

#[cfg(feature = "xlsx")]
fn read_workbook(path: &Path, name: String) -> Result<Sheet> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => {
            return Ok(Sheet {
                name,
                ..Sheet::default()
            })
        }
    };

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .map(|r| r.iter().map(|c| cell_text(c).trim().to_string()).collect())
        .unwrap_or_default();
    let mut rows = Vec::new();
    for r in rows_iter {
        let mut row: Vec<String> = r.iter().map(|c| cell_text(c).trim().to_string()).collect();
        if row.iter().all(|v| v.is_empty()) {
            continue;
        }
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    Ok(Sheet {
        name,
        headers,
        rows,
    })
}

#[cfg(feature = "xlsx")]
fn cell_text(cell: &calamine::Data) -> String {
    use calamine::Data;

    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
        Data::DateTimeIso(s) => s.split('T').next().unwrap_or_default().to_string(),
        other => other.to_string(),
    }
}

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_date(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let Some(base) = chrono::NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return String::new();
    };
    let date = base + chrono::Duration::days(serial as i64);
    date.format("%Y-%m-%d").to_string()
}
