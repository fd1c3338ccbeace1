use chrono::NaiveDate;
use serde::Serialize;

use crate::division::Division;
use crate::error::{ReportError, Result};

/// Date format used on the wire and inside the workbook.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One staff activity record, identified workbook-wide by `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: u32,
    pub activity: String,
    pub division: Division,
    pub start_date: NaiveDate,
    /// Only ever set by an edit.
    pub last_update: Option<NaiveDate>,
    pub name: String,
    pub work_done: String,
    pub status: String,
    pub recommendation: String,
    pub approval: Option<String>,
}

/// An entry tagged with the name of the weekly sheet it was read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WeeklyEntry {
    pub week: String,
    #[serde(flatten)]
    pub entry: Entry,
}

impl WeeklyEntry {
    /// Case-insensitive substring match against name, division or week.
    ///
    /// `needle` must already be lower-cased.
    pub fn matches(&self, needle: &str) -> bool {
        self.entry.name.to_lowercase().contains(needle)
            || self.entry.division.title().to_lowercase().contains(needle)
            || self.week.to_lowercase().contains(needle)
    }
}

/// Keep the entries matching `query`, preserving store order.
///
/// A blank query keeps everything.
pub fn filter_entries(entries: Vec<WeeklyEntry>, query: &str) -> Vec<WeeklyEntry> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return entries;
    }
    entries.into_iter().filter(|e| e.matches(&needle)).collect()
}

/// Replacement for the editable fields of an entry.
///
/// `id`, `division` and `name` are never touched by an edit. A `None`
/// `last_update` leaves the stored date as it was.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryUpdate {
    pub activity: String,
    pub start_date: NaiveDate,
    pub work_done: String,
    pub status: String,
    pub recommendation: String,
    pub approval: Option<String>,
    pub last_update: Option<NaiveDate>,
}

/// One line of a multi-line submission form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub activity: String,
    pub work_done: String,
    pub start_date: NaiveDate,
    pub status: String,
    pub recommendation: String,
}

/// A batch of line items sharing submitter, division and approval comment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub name: String,
    pub division: Division,
    pub approval: Option<String>,
    pub items: Vec<LineItem>,
}

impl Submission {
    /// Expand into entries numbered `max_id + 1 ..= max_id + items.len()`.
    pub fn into_entries(self, max_id: u32) -> Vec<Entry> {
        let Submission {
            name,
            division,
            approval,
            items,
        } = self;

        items
            .into_iter()
            .zip(max_id + 1..)
            .map(|(item, id)| Entry {
                id,
                activity: item.activity,
                division,
                start_date: item.start_date,
                last_update: None,
                name: name.clone(),
                work_done: item.work_done,
                status: item.status,
                recommendation: item.recommendation,
                approval: approval.clone(),
            })
            .collect()
    }
}

/// Parse a `YYYY-MM-DD` form date.
pub fn parse_form_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ReportError::InvalidSubmission(format!("invalid date: {:?}", raw)))
}

/// Blank text becomes `None`.
pub fn non_blank(text: impl Into<String>) -> Option<String> {
    let text = text.into();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
