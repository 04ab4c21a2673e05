//! Filter composition.
//!
//! A [`FilterSpec`] holds optional constraints; [`Predicate::from_spec`]
//! turns the present ones into a conjunction of [`Clause`]s. The predicate
//! renders to a SQL `WHERE` fragment with bound parameters and can also be
//! evaluated in memory with the same semantics. Nothing here performs I/O.

use chrono::{Datelike, NaiveDate};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::model::{Record, DATE_FORMAT, STORABLE_YEARS};

/// Escape character used in `LIKE` patterns.
const LIKE_ESCAPE: char = '\\';

// ─────────────────────────────────────────────────────────────────────────────
// FilterSpec
// ─────────────────────────────────────────────────────────────────────────────

/// Optional constraints on stored records. All fields absent selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sur_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl FilterSpec {
    /// A spec without constraints.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = Some(value.into());
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = Some(value.into());
        self
    }

    pub fn sur_name(mut self, value: impl Into<String>) -> Self {
        self.sur_name = Some(value.into());
        self
    }

    pub fn city(mut self, value: impl Into<String>) -> Self {
        self.city = Some(value.into());
        self
    }

    pub fn country(mut self, value: impl Into<String>) -> Self {
        self.country = Some(value.into());
        self
    }

    /// True if no constraint is effectively present.
    pub fn is_empty(&self) -> bool {
        Predicate::from_spec(self).is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Clauses
// ─────────────────────────────────────────────────────────────────────────────

/// Text column a substring clause applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    FirstName,
    LastName,
    SurName,
    City,
    Country,
}

impl TextField {
    /// Column name in the `records` table.
    pub fn column(self) -> &'static str {
        match self {
            TextField::FirstName => "first_name",
            TextField::LastName => "last_name",
            TextField::SurName => "sur_name",
            TextField::City => "city",
            TextField::Country => "country",
        }
    }

    fn value_of(self, record: &Record) -> &str {
        match self {
            TextField::FirstName => &record.first_name,
            TextField::LastName => &record.last_name,
            TextField::SurName => &record.sur_name,
            TextField::City => &record.city,
            TextField::Country => &record.country,
        }
    }
}

/// One constraint of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `record_date >= date`
    DateFrom(NaiveDate),
    /// `record_date <= date`
    DateTo(NaiveDate),
    /// Column contains the needle (ASCII case-insensitive).
    Contains(TextField, String),
}

impl Clause {
    fn to_sql(&self) -> (String, Value) {
        match self {
            Clause::DateFrom(date) => match year_position(*date) {
                YearPosition::Before => ("record_date >= ?".to_string(), date_text(min_date())),
                YearPosition::Within => ("record_date >= ?".to_string(), date_text(*date)),
                YearPosition::After => ("record_date > ?".to_string(), date_text(max_date())),
            },
            Clause::DateTo(date) => match year_position(*date) {
                YearPosition::Before => ("record_date < ?".to_string(), date_text(min_date())),
                YearPosition::Within => ("record_date <= ?".to_string(), date_text(*date)),
                YearPosition::After => ("record_date <= ?".to_string(), date_text(max_date())),
            },
            Clause::Contains(field, needle) => (
                format!("{} LIKE ? ESCAPE '{}'", field.column(), LIKE_ESCAPE),
                Value::Text(format!("%{}%", escape_like(needle))),
            ),
        }
    }

    fn matches(&self, record: &Record) -> bool {
        match self {
            Clause::DateFrom(date) => record.record_date >= *date,
            Clause::DateTo(date) => record.record_date <= *date,
            Clause::Contains(field, needle) => {
                contains_ascii_case_insensitive(field.value_of(record), needle)
            }
        }
    }
}

// Stored dates are fixed-width text, so bounds outside the storable years are
// clamped to an equivalent comparison against the first or last storable day.
enum YearPosition {
    Before,
    Within,
    After,
}

fn year_position(date: NaiveDate) -> YearPosition {
    let year = date.year();
    if year < *STORABLE_YEARS.start() {
        YearPosition::Before
    } else if year > *STORABLE_YEARS.end() {
        YearPosition::After
    } else {
        YearPosition::Within
    }
}

fn min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(*STORABLE_YEARS.start(), 1, 1).unwrap_or(NaiveDate::MIN)
}

fn max_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(*STORABLE_YEARS.end(), 12, 31).unwrap_or(NaiveDate::MAX)
}

fn date_text(date: NaiveDate) -> Value {
    Value::Text(date.format(DATE_FORMAT).to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Predicate
// ─────────────────────────────────────────────────────────────────────────────

/// Conjunction of clauses. An empty predicate matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

/// SQL rendering of a predicate: a `WHERE` fragment (empty if unconstrained)
/// and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub where_clause: String,
    pub params: Vec<Value>,
}

impl Predicate {
    /// Builds the conjunction of every present constraint in `spec`.
    ///
    /// Text constraints that are empty or whitespace-only are treated as absent.
    pub fn from_spec(spec: &FilterSpec) -> Self {
        let mut clauses = Vec::new();

        if let Some(from) = spec.date_from {
            clauses.push(Clause::DateFrom(from));
        }
        if let Some(to) = spec.date_to {
            clauses.push(Clause::DateTo(to));
        }

        let text_constraints = [
            (TextField::FirstName, &spec.first_name),
            (TextField::LastName, &spec.last_name),
            (TextField::SurName, &spec.sur_name),
            (TextField::City, &spec.city),
            (TextField::Country, &spec.country),
        ];
        for (field, value) in text_constraints {
            if let Some(needle) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                clauses.push(Clause::Contains(field, needle.to_string()));
            }
        }

        Self { clauses }
    }

    /// A predicate without clauses.
    pub fn always() -> Self {
        Self::default()
    }

    /// Adds a clause. Order is irrelevant to the result.
    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders the predicate as a SQL `WHERE` fragment.
    pub fn to_sql(&self) -> SqlFragment {
        if self.clauses.is_empty() {
            return SqlFragment {
                where_clause: String::new(),
                params: Vec::new(),
            };
        }

        let (parts, params): (Vec<String>, Vec<Value>) =
            self.clauses.iter().map(Clause::to_sql).unzip();

        SqlFragment {
            where_clause: format!("WHERE {}", parts.join(" AND ")),
            params,
        }
    }

    /// Evaluates the predicate against an in-memory record.
    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|clause| clause.matches(record))
    }
}

impl From<&FilterSpec> for Predicate {
    fn from(spec: &FilterSpec) -> Self {
        Predicate::from_spec(spec)
    }
}

/// Escapes `LIKE` wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Substring test with SQLite `LIKE` case rules: only ASCII letters fold.
fn contains_ascii_case_insensitive(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}
