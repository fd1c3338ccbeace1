use calamine::{Data, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook as XlsxWorkbook, Worksheet, XlsxError};
use std::fs::{self, create_dir_all};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::book::{COLUMN_HEADERS, CellValue, Sheet, WRAPPED_COLUMNS, Workbook, col};
use crate::division::Division;
use crate::error::{ReportError, Result};

const DIVISION_FILL: u32 = 0x002060;
const COLUMN_HEADER_FILL: u32 = 0xD9E1F2;
const TITLE_FONT_SIZE: u8 = 22;

const WIDE_COLUMN_WIDTH: f64 = 48.0;
const NARROW_COLUMN_WIDTH: f64 = 18.0;

/// Activity, Name, Work Done, Recommendation, Approval.
const WIDE_COLUMNS: [u16; 5] = [
    col::ACTIVITY,
    col::NAME,
    col::WORK_DONE,
    col::RECOMMENDATION,
    col::APPROVAL,
];
/// Start Date, Date of Last Update, Status.
const NARROW_COLUMNS: [u16; 3] = [col::START_DATE, col::LAST_UPDATE, col::STATUS];
/// Present and scanned, but hidden from normal view.
const HIDDEN_COLUMNS: [u16; 2] = [col::ID, col::DIVISION];

/// Load a report workbook from an `.xlsx` file
///
/// Every non-empty cell of every sheet is copied into the in-memory grid so
/// that a later save rewrites the file without losing anything. A missing
/// file loads as an empty workbook.
///
/// # Arguments
/// * `path` - Path of the workbook file
///
/// # Returns
/// * `Result<Workbook>` - The loaded workbook, or `StoreIo` if the file cannot
///   be opened or is not a valid workbook
pub fn load_workbook(path: &Path) -> Result<Workbook> {
    if !path.exists() {
        return Ok(Workbook::new());
    }

    let mut xlsx: Xlsx<_> = open_workbook(path).map_err(|e| ReportError::store_io(path, e))?;

    let mut sheets = Vec::new();
    for name in xlsx.sheet_names() {
        let range = xlsx
            .worksheet_range(&name)
            .map_err(|e| ReportError::store_io(path, format!("sheet {}: {}", name, e)))?;

        let mut sheet = Sheet::new(name);
        if let Some((start_row, start_col)) = range.start() {
            for (r, row) in range.rows().enumerate() {
                for (c, data) in row.iter().enumerate() {
                    // The grid is 1-based, calamine positions are 0-based.
                    let grid_row = start_row + r as u32 + 1;
                    let grid_col = (start_col as usize + c + 1) as u16;
                    sheet.set_cell(grid_row, grid_col, cell_value(data));
                }
            }
        }
        sheets.push(sheet);
    }

    Ok(Workbook::from_sheets(sheets))
}

fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::Int(n) => Some(CellValue::Number(*n as f64)),
        Data::Float(n) => Some(CellValue::Number(*n)),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
    }
}

struct SheetFormats {
    title: Format,
    column_header: Format,
    wrapped: Format,
}

impl SheetFormats {
    fn new() -> Self {
        SheetFormats {
            title: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_font_size(TITLE_FONT_SIZE)
                .set_background_color(Color::RGB(DIVISION_FILL))
                .set_align(FormatAlign::Center),
            column_header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(COLUMN_HEADER_FILL)),
            wrapped: Format::new().set_text_wrap().set_align(FormatAlign::Top),
        }
    }
}

/// Write the whole workbook to `path`
///
/// The file is rendered in memory, written to a temporary file next to
/// `path` and renamed over it, so a failed save leaves the previous file
/// intact. A replaced file keeps its permissions. Parent directories are
/// created as needed.
pub fn save_workbook(book: &Workbook, path: &Path) -> Result<()> {
    let buffer = to_xlsx(book).map_err(|e| ReportError::store_io(path, e))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    create_dir_all(dir).map_err(|e| ReportError::store_io(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ReportError::store_io(path, e))?;
    tmp.write_all(&buffer)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ReportError::store_io(path, e))?;
    if let Ok(existing) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), existing.permissions())
            .map_err(|e| ReportError::store_io(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| ReportError::store_io(path, e.error))?;

    Ok(())
}

/// Render the workbook as `.xlsx` bytes.
pub fn to_xlsx(book: &Workbook) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut xlsx = XlsxWorkbook::new();
    let formats = SheetFormats::new();

    for sheet in book.sheets() {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(sheet.name())?;
        write_sheet(worksheet, sheet, &formats)?;
    }

    xlsx.save_to_buffer()
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &Sheet,
    formats: &SheetFormats,
) -> std::result::Result<(), XlsxError> {
    if !sheet.is_week_sheet() {
        for (row, column, value) in sheet.cells() {
            match value {
                CellValue::Number(n) => worksheet.write_number(row - 1, column - 1, *n)?,
                CellValue::Text(s) => worksheet.write_string(row - 1, column - 1, s)?,
            };
        }
        return Ok(());
    }

    for column in HIDDEN_COLUMNS {
        worksheet.set_column_hidden(column - 1)?;
    }
    for column in WIDE_COLUMNS {
        worksheet.set_column_width(column - 1, WIDE_COLUMN_WIDTH)?;
    }
    for column in NARROW_COLUMNS {
        worksheet.set_column_width(column - 1, NARROW_COLUMN_WIDTH)?;
    }

    for division in Division::ALL {
        let title_row = division.header_row();
        let title = sheet
            .cell(title_row, 1)
            .map(CellValue::to_text)
            .unwrap_or_else(|| division.title().to_string());
        worksheet.merge_range(
            title_row - 1,
            0,
            title_row - 1,
            col::COUNT - 1,
            &title,
            &formats.title,
        )?;

        let label_row = division.column_header_row();
        for (label, column) in COLUMN_HEADERS.iter().zip(1..=col::COUNT) {
            let text = sheet
                .cell(label_row, column)
                .map(CellValue::to_text)
                .unwrap_or_else(|| label.to_string());
            worksheet.write_string_with_format(
                label_row - 1,
                column - 1,
                text,
                &formats.column_header,
            )?;
        }
    }

    for (row, column, value) in sheet.cells() {
        if Division::is_header_band_row(row) {
            continue;
        }
        let (r, c) = (row - 1, column - 1);
        let wrapped = Division::is_data_row(row) && WRAPPED_COLUMNS.contains(&column);

        match (value, wrapped) {
            (CellValue::Number(n), false) => {
                worksheet.write_number(r, c, *n)?;
            }
            (CellValue::Number(n), true) => {
                worksheet.write_number_with_format(r, c, *n, &formats.wrapped)?;
            }
            (CellValue::Text(s), false) => {
                worksheet.write_string(r, c, s)?;
            }
            (CellValue::Text(s), true) => {
                worksheet.write_string_with_format(r, c, s, &formats.wrapped)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::week::WeekKey;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let book = load_workbook(&dir.path().join("absent.xlsx")).unwrap();
        assert!(book.sheets().is_empty());
    }

    #[test]
    fn garbage_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        assert!(matches!(
            load_workbook(&path),
            Err(ReportError::StoreIo { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_permissions_of_the_replaced_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let mut book = Workbook::new();
        book.ensure_sheet(&WeekKey::new(2024, 1).unwrap());

        save_workbook(&book, &path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();

        book.ensure_sheet(&WeekKey::new(2024, 2).unwrap());
        save_workbook(&book, &path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o664);
        assert_eq!(load_workbook(&path).unwrap().sheets().len(), 2);
    }

    #[test]
    fn grid_survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.xlsx");

        let mut book = Workbook::new();
        book.ensure_sheet(&WeekKey::new(2024, 1).unwrap());
        let mut notes = Sheet::new("Notes");
        notes.set_cell(400, 12, CellValue::text("kept"));
        notes.set_cell(2, 1, Some(CellValue::Number(2.5)));
        let mut sheets = book.sheets().to_vec();
        sheets.push(notes);
        let mut book = Workbook::from_sheets(sheets);
        book.stamp_header_bands();

        save_workbook(&book, &path).unwrap();
        let loaded = load_workbook(&path).unwrap();

        let names: Vec<_> = loaded.sheets().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, ["2024-W01", "Notes"]);
        assert_eq!(loaded.sheet("2024-W01"), book.sheet("2024-W01"));

        let notes = loaded.sheet("Notes").unwrap();
        assert_eq!(notes.cell(400, 12), Some(&CellValue::Text("kept".to_string())));
        assert_eq!(notes.cell(2, 1), Some(&CellValue::Number(2.5)));
    }
}
