//! Spreadsheet export.

use std::path::{Path, PathBuf};

use chrono::Datelike;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};

use super::HEADERS;
use crate::error::AppError;
use crate::model::Record;
use crate::streaming::AtomicFileWriter;

/// Worksheet holding the exported records.
pub const SHEET_NAME: &str = "Records";

/// Excel number format applied to date cells.
const DATE_NUM_FORMAT: &str = "yyyy-mm-dd";

fn xlsx_error(e: XlsxError) -> AppError {
    AppError::ExportFailed(format!("Failed to build workbook: {}", e))
}

/// Renders `records` as an in-memory `.xlsx` workbook.
///
/// Row 0 is a bold header, followed by one row per record in input order.
/// Dates Excel cannot represent (before 1900) are written as text.
pub fn render_xlsx(records: &[Record]) -> Result<Vec<u8>, AppError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format(DATE_NUM_FORMAT);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME).map_err(xlsx_error)?;

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .map_err(xlsx_error)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = u32::try_from(i + 1).map_err(|_| {
            AppError::ExportFailed(format!("Too many records for one sheet: {}", records.len()))
        })?;

        worksheet
            .write_number(row, 0, record.id as f64)
            .map_err(xlsx_error)?;

        match excel_date(record) {
            Some(date) => worksheet
                .write_datetime_with_format(row, 1, &date, &date_format)
                .map_err(xlsx_error)?,
            None => worksheet
                .write_string(row, 1, record.date_text())
                .map_err(xlsx_error)?,
        };

        let text = [
            &record.first_name,
            &record.last_name,
            &record.sur_name,
            &record.city,
            &record.country,
        ];
        for (offset, value) in text.iter().enumerate() {
            worksheet
                .write_string(row, 2 + offset as u16, value.as_str())
                .map_err(xlsx_error)?;
        }
    }

    worksheet.autofit();

    workbook.save_to_buffer().map_err(xlsx_error)
}

fn excel_date(record: &Record) -> Option<ExcelDateTime> {
    let date = record.record_date;
    let year = u16::try_from(date.year()).ok()?;
    ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8).ok()
}

/// Writes `records` as an `.xlsx` workbook to `path` atomically.
pub fn write_xlsx(records: &[Record], path: &Path) -> Result<PathBuf, AppError> {
    let bytes = render_xlsx(records)?;
    AtomicFileWriter::write_all_to(path, &bytes)
}
