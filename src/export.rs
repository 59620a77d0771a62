//! Spreadsheet export of confirmed applications.

use std::path::PathBuf;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::info;

use crate::error::ExportError;
use crate::pipeline::types::ExportRow;

/// Worksheet name.
pub const SHEET_NAME: &str = "Job Confirmations";

/// Header row, in column order. Interview and Offer are left blank for
/// manual follow-up.
pub const EXPORT_COLUMNS: [&str; 7] = [
    "Company",
    "Position",
    "Interview",
    "Offer",
    "Date",
    "From",
    "Subject",
];

/// What an export wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub output_path: PathBuf,
}

/// Persists a finished, ordered row set.
pub trait Exporter: Send + Sync {
    fn export(&self, rows: &[ExportRow]) -> Result<ExportSummary, ExportError>;
}

/// Writes a single-sheet `.xlsx` workbook.
pub struct XlsxExporter {
    path: PathBuf,
}

impl XlsxExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Exporter for XlsxExporter {
    fn export(&self, rows: &[ExportRow]) -> Result<ExportSummary, ExportError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        for (col, title) in (0u16..).zip(EXPORT_COLUMNS) {
            sheet.write_string_with_format(0, col, title, &header_format)?;
        }

        for (index, row) in rows.iter().enumerate() {
            let r = u32::try_from(index + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
            let cells = [
                row.company.as_str(),
                row.position.as_str(),
                "",
                "",
                row.date.as_str(),
                row.from.as_str(),
                row.subject.as_str(),
            ];
            for (col, value) in (0u16..).zip(cells) {
                if !value.is_empty() {
                    sheet.write_string(r, col, value)?;
                }
            }
        }

        sheet.autofit();
        workbook.save(&self.path)?;

        info!(rows = rows.len(), path = %self.path.display(), "Spreadsheet written");
        Ok(ExportSummary {
            rows: rows.len(),
            output_path: self.path.clone(),
        })
    }
}
