//! Per-row outcomes and the summary they fold into.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Grant,
    User,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Grant => "grant",
            RecordKind::User => "user",
        })
    }
}

/// What happened to one record of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Skipped,
    Failed(String),
}

/// Outcome of one row. `user` is `None` when the grant step failed and the
/// user step was never attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    /// 1-based position in the batch.
    pub row: usize,
    pub grant: Outcome,
    pub user: Option<Outcome>,
}

/// A non-fatal failure, kept for the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub record: RecordKind,
    pub reason: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Row {}: Failed to create {} - {}",
            self.row, self.record, self.reason
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub grants_created: usize,
    pub grants_skipped: usize,
    pub users_created: usize,
    pub users_skipped: usize,
    pub errors: Vec<RowError>,
}

impl ImportSummary {
    pub fn record(&mut self, outcome: RowOutcome) {
        self.tally(outcome.row, RecordKind::Grant, outcome.grant);
        if let Some(user) = outcome.user {
            self.tally(outcome.row, RecordKind::User, user);
        }
    }

    fn tally(&mut self, row: usize, record: RecordKind, outcome: Outcome) {
        let (created, skipped) = match record {
            RecordKind::Grant => (&mut self.grants_created, &mut self.grants_skipped),
            RecordKind::User => (&mut self.users_created, &mut self.users_skipped),
        };
        match outcome {
            Outcome::Created => *created += 1,
            Outcome::Skipped => *skipped += 1,
            Outcome::Failed(reason) => self.errors.push(RowError {
                row,
                record,
                reason,
            }),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl FromIterator<RowOutcome> for ImportSummary {
    fn from_iter<I: IntoIterator<Item = RowOutcome>>(iter: I) -> Self {
        let mut summary = ImportSummary::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import Complete")?;
        writeln!(f, "  Grants Created: {}", self.grants_created)?;
        writeln!(f, "  Grants Skipped (already exist): {}", self.grants_skipped)?;
        writeln!(f, "  Users Created: {}", self.users_created)?;
        write!(f, "  Users Skipped (already exist): {}", self.users_skipped)?;
        if self.has_errors() {
            write!(f, "\nErrors:")?;
            for e in &self.errors {
                write!(f, "\n  {e}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_fold_into_counters_and_errors() {
        let summary: ImportSummary = vec![
            RowOutcome {
                row: 1,
                grant: Outcome::Created,
                user: Some(Outcome::Created),
            },
            RowOutcome {
                row: 2,
                grant: Outcome::Skipped,
                user: Some(Outcome::Skipped),
            },
            RowOutcome {
                row: 3,
                grant: Outcome::Failed("grant title is empty".into()),
                user: None,
            },
            RowOutcome {
                row: 4,
                grant: Outcome::Created,
                user: Some(Outcome::Failed("login already exists: ann".into())),
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(summary.grants_created, 2);
        assert_eq!(summary.grants_skipped, 1);
        assert_eq!(summary.users_created, 1);
        assert_eq!(summary.users_skipped, 1);
        assert_eq!(summary.errors.len(), 2);
        assert_eq!(
            summary.errors[0].to_string(),
            "Row 3: Failed to create grant - grant title is empty"
        );
        assert_eq!(
            summary.errors[1].to_string(),
            "Row 4: Failed to create user - login already exists: ann"
        );
    }

    #[test]
    fn report_lists_errors_only_when_present() {
        let clean = ImportSummary {
            grants_created: 1,
            ..Default::default()
        };
        let text = clean.to_string();
        assert!(text.starts_with("Import Complete"));
        assert!(text.contains("Grants Created: 1"));
        assert!(!text.contains("Errors:"));

        let failed = ImportSummary {
            errors: vec![RowError {
                row: 2,
                record: RecordKind::User,
                reason: "boom".into(),
            }],
            ..Default::default()
        };
        assert!(failed
            .to_string()
            .ends_with("Errors:\n  Row 2: Failed to create user - boom"));
    }
}
