//! Record types shared by the reader, the store and the exporters.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Text format used whenever a record date is rendered or stored as text.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Years that render as exactly four digits under [`DATE_FORMAT`]. Stored
/// dates are compared as text, so only these sort correctly.
pub const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// Whether `date` fits the fixed-width `YYYY-MM-DD` text form.
pub fn is_storable_date(date: NaiveDate) -> bool {
    STORABLE_YEARS.contains(&date.year())
}

/// A record parsed from input that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub record_date: NaiveDate,
    pub first_name: String,
    pub last_name: String,
    pub sur_name: String,
    pub city: String,
    pub country: String,
}

impl NewRecord {
    /// Attaches a storage-assigned id.
    pub fn with_id(self, id: i64) -> Record {
        Record {
            id,
            record_date: self.record_date,
            first_name: self.first_name,
            last_name: self.last_name,
            sur_name: self.sur_name,
            city: self.city,
            country: self.country,
        }
    }
}

/// A stored record. `id` is assigned by the store and never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub record_date: NaiveDate,
    pub first_name: String,
    pub last_name: String,
    pub sur_name: String,
    pub city: String,
    pub country: String,
}

impl Record {
    /// The record date as `YYYY-MM-DD`.
    pub fn date_text(&self) -> String {
        self.record_date.format(DATE_FORMAT).to_string()
    }

    /// The six data fields in input-file order, date rendered as text.
    pub fn fields(&self) -> [String; 6] {
        [
            self.date_text(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.sur_name.clone(),
            self.city.clone(),
            self.country.clone(),
        ]
    }
}
