//! Rows as uploaded, rows as mapped, and the batch that carries them between steps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ImportError;
use crate::normalize::{convert_date, parse_phone};

pub const COL_ORGANIZATION: &str = "Organization Name";
pub const COL_GRANT_NUMBER: &str = "Grant Number";
pub const COL_CITY: &str = "City";
pub const COL_STATE: &str = "State";
pub const COL_START_DATE: &str = "Current Project Period Start Date";
pub const COL_END_DATE: &str = "Current Project Period End Date";
pub const COL_DIRECTOR_NAME: &str = "Project Director - Name";
pub const COL_DIRECTOR_EMAIL: &str = "Project Director - Email";
pub const COL_DIRECTOR_PHONE: &str = "Project Director - Phone";

/// Columns an upload must carry, in the order they are reported.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    COL_ORGANIZATION,
    COL_GRANT_NUMBER,
    COL_CITY,
    COL_STATE,
    COL_START_DATE,
    COL_END_DATE,
    COL_DIRECTOR_NAME,
    COL_DIRECTOR_EMAIL,
    COL_DIRECTOR_PHONE,
];

/// One data line keyed by the header, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(headers: &[String], values: Vec<String>) -> Self {
        Self {
            fields: headers.iter().cloned().zip(values).collect(),
        }
    }

    /// Value of `column`. With a repeated header the right-most cell wins.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn trimmed(&self, column: &str) -> String {
        self.get(column).unwrap_or_default().trim().to_string()
    }
}

/// A row mapped onto the grant and contact fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRow {
    pub organization: String,
    pub grant_number: String,
    pub city: String,
    pub state: String,
    pub start_date: String,
    pub end_date: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_phone_extension: Option<String>,
    pub category: String,
}

impl GrantRow {
    pub fn from_raw(row: &RawRow, category: &str) -> Self {
        let phone = parse_phone(&row.trimmed(COL_DIRECTOR_PHONE));
        Self {
            organization: row.trimmed(COL_ORGANIZATION),
            grant_number: row.trimmed(COL_GRANT_NUMBER),
            city: row.trimmed(COL_CITY),
            state: row.trimmed(COL_STATE),
            start_date: convert_date(row.get(COL_START_DATE).unwrap_or_default()),
            end_date: convert_date(row.get(COL_END_DATE).unwrap_or_default()),
            contact_name: row.trimmed(COL_DIRECTOR_NAME),
            contact_email: row.trimmed(COL_DIRECTOR_EMAIL),
            contact_phone: phone.phone,
            contact_phone_extension: (!phone.extension.is_empty()).then_some(phone.extension),
            category: category.to_string(),
        }
    }

    /// Login name derived from the contact email: everything before `@`.
    pub fn login(&self) -> &str {
        self.contact_email
            .split_once('@')
            .map(|(local, _)| local)
            .unwrap_or_default()
    }
}

/// Uploaded rows together with the program category they were uploaded for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub category: String,
    pub rows: Vec<RawRow>,
}

impl ImportBatch {
    pub fn new(category: impl Into<String>, rows: Vec<RawRow>) -> Self {
        Self {
            category: category.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header of the first row.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|r| r.columns().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// The rows `limit` selects, in upload order.
    pub fn select(&self, limit: ImportLimit) -> &[RawRow] {
        match limit.max_rows() {
            Some(n) => &self.rows[..n.min(self.rows.len())],
            None => &self.rows,
        }
    }

    /// The first `n` rows mapped for review.
    pub fn preview(&self, n: usize) -> Vec<GrantRow> {
        self.rows
            .iter()
            .take(n)
            .map(|row| GrantRow::from_raw(row, &self.category))
            .collect()
    }
}

/// How many staged rows one execution processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportLimit {
    One,
    Five,
    All,
}

impl ImportLimit {
    pub fn max_rows(self) -> Option<usize> {
        match self {
            ImportLimit::One => Some(1),
            ImportLimit::Five => Some(5),
            ImportLimit::All => None,
        }
    }
}

impl FromStr for ImportLimit {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(ImportLimit::One),
            "5" => Ok(ImportLimit::Five),
            "all" => Ok(ImportLimit::All),
            other => Err(ImportError::InvalidLimit(other.to_string())),
        }
    }
}

impl fmt::Display for ImportLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportLimit::One => "1",
            ImportLimit::Five => "5",
            ImportLimit::All => "all",
        })
    }
}
