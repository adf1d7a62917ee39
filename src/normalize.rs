//! Pure field normalizers applied to every uploaded row.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static US_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("valid date pattern"));

static PHONE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+?)\s+Ext:?\s*(.+)$").expect("valid extension pattern"));

/// Rewrites `M/D/YYYY` as `YYYY-MM-DD`.
///
/// Empty input stays empty; anything that is not a real calendar date in that
/// shape comes back trimmed but otherwise unchanged.
pub fn convert_date(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    if US_DATE.is_match(s) {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    s.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub phone: String,
    pub extension: String,
}

/// Splits off an `Ext` suffix and formats ten-digit numbers as `(AAA) BBB-CCCC`.
pub fn parse_phone(input: &str) -> PhoneNumber {
    let mut main = input.trim();
    let mut extension = String::new();

    if let Some(caps) = PHONE_EXTENSION.captures(main) {
        if let (Some(m), Some(ext)) = (caps.get(1), caps.get(2)) {
            main = m.as_str().trim();
            extension = ext.as_str().trim().to_string();
        }
    }

    let digits: String = main.chars().filter(char::is_ascii_digit).collect();
    let phone = if digits.len() == 10 {
        format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
    } else {
        main.to_string()
    };

    PhoneNumber { phone, extension }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    pub last: String,
}

/// Splits a full name on single spaces; middle names stay with the first name.
pub fn split_name(input: &str) -> PersonName {
    let mut parts: Vec<&str> = input.trim().split(' ').collect();
    match parts.len() {
        0 | 1 => PersonName {
            first: parts.concat(),
            last: String::new(),
        },
        2 => PersonName {
            first: parts[0].to_string(),
            last: parts[1].to_string(),
        },
        _ => {
            let last = parts.pop().unwrap_or_default().to_string();
            PersonName {
                first: parts.join(" "),
                last,
            }
        }
    }
}
