//! Result recording: rows to an Excel workbook.
//!
//! The workbook carries a single sheet named "Extraction Results" with a
//! fixed header row followed by one data row per processed photo, in
//! batch order. Saving overwrites any existing file at the output path;
//! if the OS refuses the write (locked file, missing permission) the
//! error is fatal and names the path.
//!
//! The write is atomic: the workbook is saved to a sibling temp file and
//! renamed over the target, so a crash mid-save never leaves a truncated
//! workbook behind.

use crate::error::ExtractError;
use crate::output::FileResult;
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tracing::info;

/// Column headers, in sheet order.
pub const HEADER: [&str; 5] = [
    "File Name",
    "Barcode Number",
    "Barcode Confidence",
    "Oval Text",
    "Oval Text Confidence",
];

/// Name of the single worksheet.
pub const SHEET_NAME: &str = "Extraction Results";

/// Write the header and one row per result to `path`.
pub fn save_workbook(results: &[FileResult], path: &Path) -> Result<(), ExtractError> {
    let write_failed = |detail: String| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(|e| write_failed(e.to_string()))?;

    for (col, title) in HEADER.iter().enumerate() {
        sheet
            .write_string(0, col as u16, *title)
            .map_err(|e| write_failed(e.to_string()))?;
    }

    for (i, result) in results.iter().enumerate() {
        let row = (i + 1) as u32;
        let cells = [
            result.file_name.as_str(),
            result.fields.barcode_number.as_str(),
            result.fields.barcode_confidence.as_str(),
            result.fields.oval_text.as_str(),
            result.fields.oval_text_confidence.as_str(),
        ];
        for (col, value) in cells.iter().enumerate() {
            sheet
                .write_string(row, col as u16, *value)
                .map_err(|e| write_failed(e.to_string()))?;
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;
        }
    }

    // Atomic write: save to temp, then rename.
    let tmp_path = path.with_extension("xlsx.tmp");
    workbook
        .save(&tmp_path)
        .map_err(|e| write_failed(e.to_string()))?;
    std::fs::rename(&tmp_path, path).map_err(|e| write_failed(e.to_string()))?;

    info!(
        "Saved {} data rows to {}",
        results.len(),
        path.display()
    );
    Ok(())
}
