/*!
# Weekly Activity Report

A small internal web form where staff submit weekly activity reports, stored
in a shared Excel workbook organized by division and by ISO week.

## Overview

Each submission carries one or more line items. Every line item becomes an
entry row in the sheet of the current ISO week (named `YYYY-Www`), inside the
row block reserved for the submitter's division. Users can browse and search
the stored entries, edit them in place by identifier and download the whole
workbook.

## Workbook Layout

Every weekly sheet repeats the same three division blocks, 100 rows apart:

- **FINANCIAL DERIVATIVES DIVISION** - title on row 1, entries from row 3
- **COMMODITIES EXCHANGES AND PRODUCTS DIVISION** - title on row 101, entries from row 103
- **RISK MANAGEMENT DIVISION** - title on row 201, entries from row 203

A block starts with a merged title row and a row of column labels, followed
by contiguous entry rows. The ID and Division columns are hidden in the file
but are what the row scans read.

## Modules

- **division**: division table and row offsets
- **week**: ISO week keys naming the sheets
- **wrap**: word wrap for long text cells
- **entry**: entries, edits, submissions and the search filter
- **book**: in-memory workbook grid and all row management
- **persist**: `.xlsx` load (calamine) and save (rust_xlsxwriter)
- **store**: whole-file read-modify-write operations on the workbook
- **config**: runtime settings from `REPORT_*` environment variables
- **app**: routing and handlers (feature `web`)

## Routes

- `/` - submission form (GET) and submission (POST)
- `/submissions?q=` - browse and search entries
- `/edit/{id}` - edit form (GET) and update (POST)
- `/download` - the workbook file
*/

pub mod book;
pub mod config;
pub mod division;
pub mod entry;
pub mod error;
pub mod persist;
pub mod store;
pub mod week;
pub mod wrap;

#[cfg(feature = "web")]
pub mod app;

pub use config::Config;
pub use division::Division;
pub use entry::{Entry, EntryUpdate, LineItem, Submission, WeeklyEntry};
pub use error::{ReportError, Result};
pub use store::WorkbookStore;
pub use week::WeekKey;
