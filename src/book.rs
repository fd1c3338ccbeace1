//! In-memory model of the report workbook.
//!
//! A [`Workbook`] is an ordered list of weekly [`Sheet`]s, each a sparse grid
//! of cells addressed by 1-based `(row, column)`. All row management lives
//! here: stamping header bands, scanning division blocks for the next free
//! row, allocating identifiers and reading, appending and updating entries.
//! Loading and saving the grid is the job of [`crate::persist`].

use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::division::Division;
use crate::entry::{DATE_FORMAT, Entry, EntryUpdate, WeeklyEntry, non_blank};
use crate::error::{ReportError, Result};
use crate::week::WeekKey;
use crate::wrap::{WRAP_WIDTH, wrap};

/// Column labels of the row under each division title.
pub const COLUMN_HEADERS: [&str; 10] = [
    "ID",
    "Activity",
    "Division",
    "Start Date",
    "Date of Last Update",
    "Name",
    "Work Done",
    "Status",
    "Recommendation",
    "Approval from ECOP (if any)",
];

/// 1-based column numbers of an entry row.
pub mod col {
    pub const ID: u16 = 1;
    pub const ACTIVITY: u16 = 2;
    pub const DIVISION: u16 = 3;
    pub const START_DATE: u16 = 4;
    pub const LAST_UPDATE: u16 = 5;
    pub const NAME: u16 = 6;
    pub const WORK_DONE: u16 = 7;
    pub const STATUS: u16 = 8;
    pub const RECOMMENDATION: u16 = 9;
    pub const APPROVAL: u16 = 10;

    pub const COUNT: u16 = 10;
}

/// Long-text columns rendered with wrap-text alignment.
pub const WRAPPED_COLUMNS: [u16; 4] = [
    col::ACTIVITY,
    col::WORK_DONE,
    col::RECOMMENDATION,
    col::APPROVAL,
];

/// Value of a non-empty cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(text: impl Into<String>) -> Option<CellValue> {
        let text = text.into();
        if text.is_empty() {
            None
        } else {
            Some(CellValue::Text(text))
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            CellValue::Number(_) => false,
            CellValue::Text(s) => s.trim().is_empty(),
        }
    }

    /// Display form; integral numbers print without a fraction.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            CellValue::Number(n) => n.to_string(),
        }
    }

    fn as_id(&self) -> Option<u32> {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= u32::MAX as f64 => {
                Some(*n as u32)
            }
            CellValue::Number(_) => None,
            CellValue::Text(s) => s.trim().parse().ok().filter(|id| *id > 0),
        }
    }

    /// Dates are stored as `YYYY-MM-DD` text; a file edited by hand may hold
    /// an Excel serial number instead.
    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Text(s) => {
                let s = s.trim();
                NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), DATE_FORMAT).ok()
            }
            CellValue::Number(serial) if *serial >= 1.0 => {
                let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
                epoch.checked_add_days(Days::new(serial.trunc() as u64))
            }
            CellValue::Number(_) => None,
        }
    }
}

/// One weekly sheet: a sparse cell grid keyed by 1-based `(row, column)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u16), CellValue>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Sheet {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the sheet is named after an ISO week and so carries the
    /// division layout.
    pub fn is_week_sheet(&self) -> bool {
        WeekKey::parse(&self.name).is_some()
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// `None` clears the cell.
    pub fn set_cell(&mut self, row: u32, col: u16, value: Option<CellValue>) {
        match value {
            Some(value) => {
                self.cells.insert((row, col), value);
            }
            None => {
                self.cells.remove(&(row, col));
            }
        }
    }

    /// Every non-empty cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.cells.iter().map(|(&(row, col), value)| (row, col, value))
    }

    /// Write the title and column labels of every division. Idempotent.
    pub fn stamp_header_bands(&mut self) {
        for division in Division::ALL {
            self.set_cell(division.header_row(), 1, CellValue::text(division.title()));
            for column in col::ID + 1..=col::COUNT {
                self.set_cell(division.header_row(), column, None);
            }
            for (label, column) in COLUMN_HEADERS.iter().zip(1..) {
                self.set_cell(division.column_header_row(), column, CellValue::text(*label));
            }
        }
    }

    fn is_occupied(&self, row: u32) -> bool {
        self.cell(row, col::ID).is_some_and(|value| !value.is_blank())
    }

    /// Contiguous occupied rows of a division block, starting at its first
    /// data row and stopping at the first empty ID cell.
    pub fn occupied_rows(&self, division: Division) -> impl Iterator<Item = u32> + '_ {
        division.data_rows().take_while(move |&row| self.is_occupied(row))
    }

    /// First row of the block whose ID cell is empty.
    pub fn next_free_row(&self, division: Division) -> Result<u32> {
        let row = division.data_start_row() + self.occupied_rows(division).count() as u32;
        if row > division.last_data_row() {
            log::warn!("sheet {} is full for {}", self.name, division);
            return Err(ReportError::CapacityExceeded {
                sheet: self.name.clone(),
                division,
            });
        }
        Ok(row)
    }

    fn malformed(&self, row: u32, reason: impl Into<String>) -> ReportError {
        ReportError::MalformedRow {
            sheet: self.name.clone(),
            row,
            reason: reason.into(),
        }
    }

    fn id_at(&self, row: u32) -> Result<u32> {
        self.cell(row, col::ID)
            .and_then(CellValue::as_id)
            .ok_or_else(|| self.malformed(row, "ID is not a positive integer"))
    }

    fn text_at(&self, row: u32, column: u16) -> String {
        self.cell(row, column).map(CellValue::to_text).unwrap_or_default()
    }

    fn date_at(&self, row: u32, column: u16) -> Result<Option<NaiveDate>> {
        match self.cell(row, column) {
            None => Ok(None),
            Some(value) if value.is_blank() => Ok(None),
            Some(value) => value
                .as_date()
                .map(Some)
                .ok_or_else(|| self.malformed(row, format!("unreadable date {:?}", value.to_text()))),
        }
    }

    /// Decode the entry stored on `row` of a `division` block.
    ///
    /// The hidden division column normally repeats the block's division; the
    /// block wins when the cell is blank or unrecognised.
    pub fn read_entry(&self, division: Division, row: u32) -> Result<Entry> {
        let start_date = self
            .date_at(row, col::START_DATE)?
            .ok_or_else(|| self.malformed(row, "missing start date"))?;

        Ok(Entry {
            id: self.id_at(row)?,
            activity: self.text_at(row, col::ACTIVITY),
            division: Division::from_str(&self.text_at(row, col::DIVISION)).unwrap_or(division),
            start_date,
            last_update: self.date_at(row, col::LAST_UPDATE)?,
            name: self.text_at(row, col::NAME),
            work_done: self.text_at(row, col::WORK_DONE),
            status: self.text_at(row, col::STATUS),
            recommendation: self.text_at(row, col::RECOMMENDATION),
            approval: non_blank(self.text_at(row, col::APPROVAL)),
        })
    }

    /// Write every field of `entry` onto `row` verbatim.
    pub fn write_entry(&mut self, row: u32, entry: &Entry) {
        let date = |d: Option<NaiveDate>| d.and_then(|d| CellValue::text(d.format(DATE_FORMAT).to_string()));

        self.set_cell(row, col::ID, Some(CellValue::Number(entry.id as f64)));
        self.set_cell(row, col::ACTIVITY, CellValue::text(entry.activity.as_str()));
        self.set_cell(row, col::DIVISION, CellValue::text(entry.division.title()));
        self.set_cell(row, col::START_DATE, date(Some(entry.start_date)));
        self.set_cell(row, col::LAST_UPDATE, date(entry.last_update));
        self.set_cell(row, col::NAME, CellValue::text(entry.name.as_str()));
        self.set_cell(row, col::WORK_DONE, CellValue::text(entry.work_done.as_str()));
        self.set_cell(row, col::STATUS, CellValue::text(entry.status.as_str()));
        self.set_cell(row, col::RECOMMENDATION, CellValue::text(entry.recommendation.as_str()));
        self.set_cell(
            row,
            col::APPROVAL,
            entry.approval.as_deref().and_then(|a| CellValue::text(a)),
        );
    }

    fn apply_update(&mut self, row: u32, update: &EntryUpdate) {
        if let Some(last_update) = update.last_update {
            self.set_cell(
                row,
                col::LAST_UPDATE,
                CellValue::text(last_update.format(DATE_FORMAT).to_string()),
            );
        }
        self.set_cell(row, col::ACTIVITY, CellValue::text(update.activity.as_str()));
        self.set_cell(
            row,
            col::START_DATE,
            CellValue::text(update.start_date.format(DATE_FORMAT).to_string()),
        );
        self.set_cell(row, col::WORK_DONE, CellValue::text(update.work_done.as_str()));
        self.set_cell(row, col::STATUS, CellValue::text(update.status.as_str()));
        self.set_cell(row, col::RECOMMENDATION, CellValue::text(update.recommendation.as_str()));
        self.set_cell(
            row,
            col::APPROVAL,
            update.approval.as_deref().and_then(|a| CellValue::text(a)),
        );
    }

    /// Row holding entry `id`, if any.
    fn locate(&self, id: u32) -> Result<Option<(Division, u32)>> {
        for division in Division::ALL {
            for row in self.occupied_rows(division) {
                if self.id_at(row)? == id {
                    return Ok(Some((division, row)));
                }
            }
        }
        Ok(None)
    }
}

/// Long-text fields wrapped for display in the sheet.
fn wrapped(entry: &Entry) -> Entry {
    Entry {
        activity: wrap(&entry.activity, WRAP_WIDTH),
        work_done: wrap(&entry.work_done, WRAP_WIDTH),
        recommendation: wrap(&entry.recommendation, WRAP_WIDTH),
        approval: entry
            .approval
            .as_deref()
            .and_then(|a| non_blank(wrap(a, WRAP_WIDTH))),
        ..entry.clone()
    }
}

/// Every weekly sheet of the report file, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Workbook::default()
    }

    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Workbook { sheets }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Create the sheet for `week` with its header bands if it is missing.
    /// Returns whether a sheet was created.
    pub fn ensure_sheet(&mut self, week: &WeekKey) -> bool {
        let name = week.to_string();
        if self.sheet(&name).is_some() {
            return false;
        }
        let mut sheet = Sheet::new(name);
        sheet.stamp_header_bands();
        self.sheets.push(sheet);
        true
    }

    fn sheet_index(&mut self, week: &WeekKey) -> usize {
        self.ensure_sheet(week);
        let name = week.to_string();
        self.sheets
            .iter()
            .position(|s| s.name == name)
            .unwrap_or(self.sheets.len() - 1)
    }

    /// Next free row of `division` in the sheet for `week`. A sheet that
    /// does not exist yet is empty.
    pub fn next_free_row(&self, week: &WeekKey, division: Division) -> Result<u32> {
        match self.sheet(&week.to_string()) {
            Some(sheet) => sheet.next_free_row(division),
            None => Ok(division.data_start_row()),
        }
    }

    /// Append `entry` to its division block in the sheet for `week`, with the
    /// long-text fields wrapped. Returns the row written.
    pub fn append(&mut self, week: &WeekKey, entry: &Entry) -> Result<u32> {
        let index = self.sheet_index(week);
        let sheet = &mut self.sheets[index];
        let row = sheet.next_free_row(entry.division)?;
        sheet.write_entry(row, &wrapped(entry));
        sheet.stamp_header_bands();
        Ok(row)
    }

    /// Sheets carrying the division layout. Entry scans never look
    /// anywhere else.
    fn week_sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter().filter(|s| s.is_week_sheet())
    }

    /// All entries in sheet, division, row order, tagged with their sheet.
    pub fn entries(&self) -> Result<Vec<WeeklyEntry>> {
        let mut entries = Vec::new();
        for sheet in self.week_sheets() {
            for division in Division::ALL {
                for row in sheet.occupied_rows(division) {
                    entries.push(WeeklyEntry {
                        week: sheet.name.clone(),
                        entry: sheet.read_entry(division, row)?,
                    });
                }
            }
        }
        Ok(entries)
    }

    pub fn find_by_id(&self, id: u32) -> Result<Option<Entry>> {
        for sheet in self.week_sheets() {
            if let Some((division, row)) = sheet.locate(id)? {
                return sheet.read_entry(division, row).map(Some);
            }
        }
        Ok(None)
    }

    /// Overwrite the editable fields of entry `id`. Returns whether the entry
    /// was found.
    pub fn update(&mut self, id: u32, update: &EntryUpdate) -> Result<bool> {
        for sheet in self.sheets.iter_mut().filter(|s| s.is_week_sheet()) {
            if let Some((_, row)) = sheet.locate(id)? {
                sheet.apply_update(row, update);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Largest identifier on any week sheet, 0 when there is none.
    pub fn max_id(&self) -> Result<u32> {
        let mut max = 0;
        for sheet in self.week_sheets() {
            for division in Division::ALL {
                for row in sheet.occupied_rows(division) {
                    max = max.max(sheet.id_at(row)?);
                }
            }
        }
        Ok(max)
    }

    /// Re-stamp the header bands of every week sheet. Other sheets are
    /// left as loaded.
    pub fn stamp_header_bands(&mut self) {
        for sheet in self.sheets.iter_mut().filter(|s| s.is_week_sheet()) {
            sheet.stamp_header_bands();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> WeekKey {
        WeekKey::new(2024, 1).unwrap()
    }

    fn entry(id: u32, division: Division) -> Entry {
        Entry {
            id,
            activity: format!("Activity {id}"),
            division,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            last_update: None,
            name: "Amina Bello".to_string(),
            work_done: "Reviewed exposures".to_string(),
            status: "Ongoing".to_string(),
            recommendation: "Escalate".to_string(),
            approval: None,
        }
    }

    #[test]
    fn new_sheet_carries_every_header_band() {
        let mut book = Workbook::new();
        assert!(book.ensure_sheet(&week()));
        assert!(!book.ensure_sheet(&week()));

        let sheet = book.sheet("2024-W01").unwrap();
        for division in Division::ALL {
            assert_eq!(
                sheet.cell(division.header_row(), 1),
                Some(&CellValue::Text(division.title().to_string()))
            );
            assert_eq!(
                sheet.cell(division.column_header_row(), col::APPROVAL),
                Some(&CellValue::Text("Approval from ECOP (if any)".to_string()))
            );
        }
    }

    #[test]
    fn rows_fill_contiguously_per_division() {
        let mut book = Workbook::new();
        for (n, id) in (1..=4).enumerate() {
            assert_eq!(
                book.next_free_row(&week(), Division::RiskManagement).unwrap(),
                203 + n as u32
            );
            book.append(&week(), &entry(id, Division::RiskManagement)).unwrap();
        }
        book.append(&week(), &entry(5, Division::FinancialDerivatives)).unwrap();

        assert_eq!(book.next_free_row(&week(), Division::RiskManagement).unwrap(), 207);
        assert_eq!(book.next_free_row(&week(), Division::FinancialDerivatives).unwrap(), 4);
        assert_eq!(
            book.next_free_row(&week(), Division::CommoditiesExchangesAndProducts).unwrap(),
            103
        );
    }

    #[test]
    fn full_block_reports_capacity() {
        let mut book = Workbook::new();
        let division = Division::FinancialDerivatives;
        for id in 1..=division.capacity() {
            book.append(&week(), &entry(id, division)).unwrap();
        }

        let err = book.append(&week(), &entry(99, division)).unwrap_err();
        assert!(matches!(
            err,
            ReportError::CapacityExceeded { ref sheet, division: Division::FinancialDerivatives }
                if sheet == "2024-W01"
        ));
        // The next block's title row is untouched.
        let next = Division::CommoditiesExchangesAndProducts;
        assert_eq!(
            book.sheet("2024-W01").unwrap().cell(next.header_row(), 1),
            Some(&CellValue::Text(next.title().to_string()))
        );
    }

    #[test]
    fn append_wraps_long_text() {
        let mut book = Workbook::new();
        let mut long = entry(1, Division::RiskManagement);
        long.work_done = "word ".repeat(30);
        long.approval = Some("   ".to_string());
        book.append(&week(), &long).unwrap();

        let stored = book.find_by_id(1).unwrap().unwrap();
        assert_eq!(stored.work_done, wrap(&long.work_done, WRAP_WIDTH));
        assert!(stored.work_done.contains('\n'));
        assert_eq!(stored.approval, None);
    }

    #[test]
    fn ids_are_found_across_sheets() {
        let mut book = Workbook::new();
        let next_week = WeekKey::new(2024, 2).unwrap();
        book.append(&week(), &entry(1, Division::RiskManagement)).unwrap();
        book.append(&next_week, &entry(2, Division::FinancialDerivatives)).unwrap();

        assert_eq!(book.max_id().unwrap(), 2);
        assert_eq!(book.find_by_id(2).unwrap(), Some(entry(2, Division::FinancialDerivatives)));
        assert_eq!(book.find_by_id(3).unwrap(), None);

        let weeks: Vec<_> = book.entries().unwrap().into_iter().map(|e| e.week).collect();
        assert_eq!(weeks, ["2024-W01", "2024-W02"]);
    }

    #[test]
    fn update_keeps_identity_fields() {
        let mut book = Workbook::new();
        book.append(&week(), &entry(7, Division::RiskManagement)).unwrap();

        let update = EntryUpdate {
            activity: "Revised".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            work_done: "More work".to_string(),
            status: "Done".to_string(),
            recommendation: "Close".to_string(),
            approval: Some("Approved".to_string()),
            last_update: None,
        };
        assert!(book.update(7, &update).unwrap());
        assert!(!book.update(8, &update).unwrap());

        let stored = book.find_by_id(7).unwrap().unwrap();
        assert_eq!(stored.id, 7);
        assert_eq!(stored.name, "Amina Bello");
        assert_eq!(stored.division, Division::RiskManagement);
        assert_eq!(stored.activity, "Revised");
        assert_eq!(stored.approval.as_deref(), Some("Approved"));
        assert_eq!(stored.last_update, None);

        let dated = EntryUpdate {
            last_update: NaiveDate::from_ymd_opt(2024, 1, 5),
            ..update
        };
        book.update(7, &dated).unwrap();
        assert_eq!(book.find_by_id(7).unwrap().unwrap().last_update, dated.last_update);

        // A later edit without a date keeps the stored one.
        book.update(7, &EntryUpdate { last_update: None, ..dated.clone() }).unwrap();
        assert_eq!(book.find_by_id(7).unwrap().unwrap().last_update, dated.last_update);
    }

    #[test]
    fn scan_stops_at_first_gap() {
        let mut sheet = Sheet::new("2024-W01");
        sheet.write_entry(3, &entry(1, Division::FinancialDerivatives));
        sheet.write_entry(5, &entry(2, Division::FinancialDerivatives));

        assert_eq!(sheet.next_free_row(Division::FinancialDerivatives).unwrap(), 4);
        let book = Workbook::from_sheets(vec![sheet]);
        assert_eq!(book.entries().unwrap().len(), 1);
    }

    #[test]
    fn hand_edited_cells_still_decode() {
        let mut sheet = Sheet::new("2024-W01");
        let row = Division::RiskManagement.data_start_row();
        sheet.set_cell(row, col::ID, CellValue::text(" 12 "));
        sheet.set_cell(row, col::START_DATE, Some(CellValue::Number(45293.0)));
        sheet.set_cell(row, col::LAST_UPDATE, CellValue::text("2024-01-09 00:00:00"));
        sheet.set_cell(row, col::NAME, Some(CellValue::Number(1234.0)));

        let entry = sheet.read_entry(Division::RiskManagement, row).unwrap();
        assert_eq!(entry.id, 12);
        assert_eq!(entry.start_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(entry.last_update, NaiveDate::from_ymd_opt(2024, 1, 9));
        assert_eq!(entry.name, "1234");
        assert_eq!(entry.division, Division::RiskManagement);
    }

    #[test]
    fn undecodable_rows_are_reported() {
        let mut sheet = Sheet::new("2024-W01");
        sheet.set_cell(3, col::ID, CellValue::text("abc"));
        sheet.set_cell(3, col::START_DATE, CellValue::text("2024-01-02"));
        let book = Workbook::from_sheets(vec![sheet]);

        assert!(matches!(
            book.max_id(),
            Err(ReportError::MalformedRow { row: 3, .. })
        ));
    }
}
