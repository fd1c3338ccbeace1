use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::book::Workbook;
use crate::division::Division;
use crate::entry::{Entry, EntryUpdate, Submission, WeeklyEntry, filter_entries};
use crate::error::{ReportError, Result};
use crate::persist::{load_workbook, save_workbook};
use crate::week::WeekKey;

/// The report workbook on disk.
///
/// Every operation is a whole-file read-modify-write: the file is loaded,
/// changed in memory and written back in full. There is no locking here;
/// callers sharing a store across threads serialize access themselves.
#[derive(Clone, Debug)]
pub struct WorkbookStore {
    path: PathBuf,
}

impl WorkbookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WorkbookStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<Workbook> {
        load_workbook(&self.path)
    }

    fn save(&self, book: &mut Workbook) -> Result<()> {
        book.stamp_header_bands();
        save_workbook(book, &self.path)
    }

    /// Create the workbook if needed and make sure this week's sheet exists.
    pub fn init(&self) -> Result<()> {
        self.ensure_sheet(&WeekKey::current()).map(|_| ())
    }

    /// Create the sheet for `week` with its header bands if it is missing.
    /// Returns whether the sheet was created.
    pub fn ensure_sheet(&self, week: &WeekKey) -> Result<bool> {
        let mut book = self.load()?;
        let created = book.ensure_sheet(week);
        if created || !self.exists() {
            self.save(&mut book)?;
        }
        if created {
            log::info!("created sheet {} in {}", week, self.path.display());
        }
        Ok(created)
    }

    pub fn next_free_row(&self, week: &WeekKey, division: Division) -> Result<u32> {
        self.load()?.next_free_row(week, division)
    }

    /// Append to this week's sheet. Returns the row written.
    pub fn append(&self, entry: &Entry) -> Result<u32> {
        self.append_in_week(&WeekKey::current(), entry)
    }

    pub fn append_in_week(&self, week: &WeekKey, entry: &Entry) -> Result<u32> {
        let mut book = self.load()?;
        let row = book.append(week, entry)?;
        self.save(&mut book)?;
        log::info!(
            "appended entry {} to {} / {} at row {}",
            entry.id,
            week,
            entry.division,
            row
        );
        Ok(row)
    }

    /// Store a submission batch in this week's sheet.
    pub fn submit(&self, submission: Submission) -> Result<Vec<Entry>> {
        self.submit_in_week(&WeekKey::current(), submission)
    }

    /// Number the batch after the workbook's current maximum id and append
    /// every line item in a single read-modify-write. Nothing is written if
    /// any item does not fit.
    pub fn submit_in_week(&self, week: &WeekKey, submission: Submission) -> Result<Vec<Entry>> {
        if submission.items.is_empty() {
            return Err(ReportError::InvalidSubmission(
                "a submission needs at least one line item".to_string(),
            ));
        }

        let mut book = self.load()?;
        let entries = submission.into_entries(book.max_id()?);
        for entry in &entries {
            let row = book.append(week, entry)?;
            log::info!(
                "appended entry {} to {} / {} at row {}",
                entry.id,
                week,
                entry.division,
                row
            );
        }
        self.save(&mut book)?;
        Ok(entries)
    }

    pub fn find_by_id(&self, id: u32) -> Result<Option<Entry>> {
        self.load()?.find_by_id(id)
    }

    /// Like [`WorkbookStore::find_by_id`], failing with `EntryNotFound`.
    pub fn get(&self, id: u32) -> Result<Entry> {
        self.find_by_id(id)?.ok_or(ReportError::EntryNotFound(id))
    }

    /// Overwrite the editable fields of entry `id`. Returns whether the
    /// entry was found; nothing is written when it was not.
    pub fn update(&self, id: u32, update: &EntryUpdate) -> Result<bool> {
        let mut book = self.load()?;
        if !book.update(id, update)? {
            return Ok(false);
        }
        self.save(&mut book)?;
        log::info!("updated entry {}", id);
        Ok(true)
    }

    pub fn read_all(&self) -> Result<Vec<WeeklyEntry>> {
        self.load()?.entries()
    }

    /// Entries whose name, division or week contains `query`,
    /// case-insensitively.
    pub fn search(&self, query: &str) -> Result<Vec<WeeklyEntry>> {
        Ok(filter_entries(self.read_all()?, query))
    }

    pub fn max_id(&self) -> Result<u32> {
        self.load()?.max_id()
    }

    /// Raw bytes of the workbook file for download.
    pub fn export(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                ReportError::store_io(&self.path, "no workbook has been written yet")
            }
            _ => ReportError::store_io(&self.path, e),
        })
    }
}
