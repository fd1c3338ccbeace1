use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::ReportError;

/// Rows between the title rows of two consecutive division blocks.
pub const DIVISION_SPACING: u32 = 100;

/// Organizational unit owning a fixed block of rows in every weekly sheet.
///
/// Each block is laid out as:
/// * `header_row` - merged division title across columns A..J
/// * `header_row + 1` - column labels
/// * `data_start_row ..= last_data_row` - one entry per row, contiguous
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Division {
    #[serde(rename = "FINANCIAL DERIVATIVES DIVISION")]
    FinancialDerivatives,
    #[serde(rename = "COMMODITIES EXCHANGES AND PRODUCTS DIVISION")]
    CommoditiesExchangesAndProducts,
    #[serde(rename = "RISK MANAGEMENT DIVISION")]
    RiskManagement,
}

impl Division {
    /// Every division, in sheet order.
    pub const ALL: [Division; 3] = [
        Division::FinancialDerivatives,
        Division::CommoditiesExchangesAndProducts,
        Division::RiskManagement,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Division::FinancialDerivatives => "FINANCIAL DERIVATIVES DIVISION",
            Division::CommoditiesExchangesAndProducts => {
                "COMMODITIES EXCHANGES AND PRODUCTS DIVISION"
            }
            Division::RiskManagement => "RISK MANAGEMENT DIVISION",
        }
    }

    /// 1-based row holding the merged division title.
    pub const fn header_row(self) -> u32 {
        match self {
            Division::FinancialDerivatives => 1,
            Division::CommoditiesExchangesAndProducts => 101,
            Division::RiskManagement => 201,
        }
    }

    pub const fn column_header_row(self) -> u32 {
        self.header_row() + 1
    }

    pub const fn data_start_row(self) -> u32 {
        self.header_row() + 2
    }

    /// Last row an entry may occupy before running into the next block.
    pub const fn last_data_row(self) -> u32 {
        self.header_row() + DIVISION_SPACING - 1
    }

    pub const fn capacity(self) -> u32 {
        self.last_data_row() - self.data_start_row() + 1
    }

    pub fn data_rows(self) -> RangeInclusive<u32> {
        self.data_start_row()..=self.last_data_row()
    }

    /// Whether `row` is one of the two header-band rows of any division.
    pub fn is_header_band_row(row: u32) -> bool {
        Division::ALL
            .iter()
            .any(|d| row == d.header_row() || row == d.column_header_row())
    }

    /// Whether `row` falls inside any division's data block.
    pub fn is_data_row(row: u32) -> bool {
        Division::ALL.iter().any(|d| d.data_rows().contains(&row))
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Division {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Division::ALL
            .into_iter()
            .find(|d| d.title().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReportError::UnknownDivision(wanted.to_string()))
    }
}
