//! The upload → review → execute → clear cycle around an [`ImportSession`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::config::{ConfigError, ImporterConfig};
use crate::engine::ImportEngine;
use crate::error::{ImportError, ImportResult, UploadError, ValidationError};
use crate::io::{has_csv_extension, CsvMeta};
use crate::model::{GrantRow, ImportBatch, ImportLimit};
use crate::parser::{check_required_columns, parse_csv_path};
use crate::repository::{GrantRepository, UserRepository};
use crate::staging::ImportSession;
use crate::summary::ImportSummary;

/// Rows shown by [`Workflow::preview`].
pub const PREVIEW_ROWS: usize = 5;

pub const CLEARED_MESSAGE: &str = "Import data cleared. You can start over with a new CSV file.";

/// A file as received from a form field.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// `Content-Encoding` the client declared, if any.
    pub content_encoding: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_encoding: String::new(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Name the upload was stored under.
    pub csv_file: String,
    pub rows: usize,
    pub malformed_rows: usize,
}

impl UploadReceipt {
    pub fn message(&self) -> String {
        let mut message = format!(
            "CSV file uploaded successfully with {} row(s). Please review the mapping below.",
            self.rows
        );
        if self.malformed_rows > 0 {
            message.push_str(&format!(
                " {} row(s) with the wrong number of columns were skipped.",
                self.malformed_rows
            ));
        }
        message
    }
}

/// What the reviewer sees before choosing how many rows to import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub csv_file: Option<String>,
    pub category: String,
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub rows: Vec<GrantRow>,
}

pub struct Workflow {
    config: ImporterConfig,
    charset: &'static encoding_rs::Encoding,
}

impl Workflow {
    pub fn new(config: ImporterConfig) -> Result<Self, ConfigError> {
        let charset = config.encoding()?;
        Ok(Self { config, charset })
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.config.staging_ttl())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Stores, parses and validates an upload, then stages it.
    ///
    /// Nothing is staged unless every check passes; a previously staged
    /// batch survives a rejected upload.
    #[instrument(skip_all, fields(file = %file.name, category = %category))]
    pub async fn upload(
        &self,
        session: &mut ImportSession,
        file: UploadedFile,
        category: &str,
        now: DateTime<Utc>,
    ) -> ImportResult<UploadReceipt> {
        let category = category.trim();
        if category.is_empty() {
            return Err(UploadError::MissingCategory.into());
        }
        if !has_csv_extension(&file.name) {
            return Err(UploadError::InvalidFileType { name: file.name }.into());
        }

        let csv_file = stored_name(now);
        let path = self.store(&csv_file, &file.data).await?;

        let meta = CsvMeta {
            content_encoding: file.content_encoding,
            charset: self.charset,
        };
        let table = parse_csv_path(&path, &meta)
            .await
            .map_err(UploadError::Read)?;
        if table.is_empty() {
            return Err(ValidationError::Empty.into());
        }
        check_required_columns(&table.headers)?;

        let receipt = UploadReceipt {
            csv_file: csv_file.clone(),
            rows: table.rows.len(),
            malformed_rows: table.malformed_rows,
        };
        session.stage_upload(
            csv_file,
            ImportBatch::new(category, table.rows),
            self.expiry(now),
        );
        info!(
            stored = %path.display(),
            rows = receipt.rows,
            malformed = receipt.malformed_rows,
            "upload staged"
        );
        Ok(receipt)
    }

    async fn store(&self, csv_file: &str, data: &[u8]) -> Result<PathBuf, UploadError> {
        let dir = &self.config.upload_dir;
        let path = dir.join(csv_file);
        let storage = |source| UploadError::Storage {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(dir).await.map_err(storage)?;
        tokio::fs::write(&path, data).await.map_err(storage)?;
        Ok(path)
    }

    pub fn preview(&self, session: &ImportSession, now: DateTime<Utc>) -> ImportResult<Preview> {
        let batch = session.batch(now).ok_or(ImportError::StagingExpired)?;
        Ok(Preview {
            csv_file: session.csv_file(now).map(str::to_string),
            category: batch.category.clone(),
            columns: batch.columns(),
            total_rows: batch.len(),
            rows: batch.preview(PREVIEW_ROWS),
        })
    }

    /// Imports the staged rows `limit` selects and stages the summary.
    /// After `all`, the batch is retired.
    pub async fn execute<G, U>(
        &self,
        session: &mut ImportSession,
        engine: &ImportEngine<G, U>,
        limit: ImportLimit,
        now: DateTime<Utc>,
    ) -> ImportResult<ImportSummary>
    where
        G: GrantRepository,
        U: UserRepository,
    {
        let summary = {
            let batch = session.batch(now).ok_or(ImportError::StagingExpired)?;
            engine.execute(batch, limit).await
        };

        session.store_results(summary.clone(), self.expiry(now));
        if limit == ImportLimit::All {
            session.retire_batch();
        }
        Ok(summary)
    }

    /// The last summary, removed so it is reported once.
    pub fn take_results(&self, session: &mut ImportSession, now: DateTime<Utc>) -> Option<ImportSummary> {
        session.take_results(now)
    }

    /// Drops every staged slot. The stored upload stays on disk.
    pub fn clear(&self, session: &mut ImportSession) -> &'static str {
        session.clear();
        info!("staging cleared");
        CLEARED_MESSAGE
    }
}

/// `grant_import_<unix-seconds>_<random>.csv`; the suffix keeps uploads made
/// in the same second apart.
fn stored_name(now: DateTime<Utc>) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("grant_import_{}_{}.csv", now.timestamp(), &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn workflow(dir: &std::path::Path) -> Workflow {
        Workflow::new(ImporterConfig {
            upload_dir: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn category_and_file_type_are_checked_first() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let wf = workflow(dir.path());
        let mut session = ImportSession::new();
        let now = Utc::now();

        let err = wf
            .upload(&mut session, UploadedFile::new("g.csv", "a,b\n1,2\n"), "  ", now)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Upload(UploadError::MissingCategory)));

        let err = wf
            .upload(&mut session, UploadedFile::new("g.xlsx", "a,b\n1,2\n"), "gpe", now)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please upload a CSV file.");

        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        assert_eq!(session, ImportSession::default());
        Ok(())
    }

    #[tokio::test]
    async fn uploads_in_the_same_second_keep_separate_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let wf = workflow(dir.path());
        let mut session = ImportSession::new();
        let now = Utc::now();
        let csv = format!("{}\n{}\n", crate::model::REQUIRED_COLUMNS.join(","), ["x"; 9].join(","));

        let first = wf
            .upload(&mut session, UploadedFile::new("a.csv", csv.clone()), "gpe", now)
            .await?;
        let second = wf
            .upload(&mut session, UploadedFile::new("b.csv", csv), "gpe", now)
            .await?;
        assert_ne!(first.csv_file, second.csv_file);
        assert!(first
            .csv_file
            .starts_with(&format!("grant_import_{}_", now.timestamp())));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 2);
        assert_eq!(session.csv_file(now), Some(second.csv_file.as_str()));
        Ok(())
    }

    #[tokio::test]
    async fn header_only_file_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let wf = workflow(dir.path());
        let mut session = ImportSession::new();
        let err = wf
            .upload(
                &mut session,
                UploadedFile::new("g.csv", "Grant Number\n"),
                "gpe",
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Validation(ValidationError::Empty)));
        assert!(session.batch(Utc::now()).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn missing_columns_stage_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let wf = workflow(dir.path());
        let mut session = ImportSession::new();
        let err = wf
            .upload(
                &mut session,
                UploadedFile::new("g.csv", "Organization Name,Grant Number\nAcme,G1\n"),
                "gpe",
                Utc::now(),
            )
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Missing required columns: City, State"));
        assert!(message.ends_with("Found columns: Organization Name, Grant Number"));
        assert!(session.batch(Utc::now()).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unwritable_upload_dir_is_a_storage_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"")?;
        let wf = workflow(&blocker);
        let mut session = ImportSession::new();
        let err = wf
            .upload(&mut session, UploadedFile::new("g.csv", "a\n1\n"), "gpe", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Upload(UploadError::Storage { .. })));
        Ok(())
    }

    #[test]
    fn nothing_staged_means_expired() {
        let dir = std::env::temp_dir();
        let wf = workflow(&dir);
        let mut session = ImportSession::new();
        assert!(matches!(
            wf.preview(&session, Utc::now()),
            Err(ImportError::StagingExpired)
        ));
        assert_eq!(wf.clear(&mut session), CLEARED_MESSAGE);
    }

    #[test]
    fn receipt_mentions_skipped_lines_only_when_present() {
        let mut receipt = UploadReceipt {
            csv_file: "grant_import_1.csv".into(),
            rows: 3,
            malformed_rows: 0,
        };
        assert_eq!(
            receipt.message(),
            "CSV file uploaded successfully with 3 row(s). Please review the mapping below."
        );
        receipt.malformed_rows = 2;
        assert!(receipt.message().ends_with("2 row(s) with the wrong number of columns were skipped."));
    }

    #[test]
    fn expiry_saturates() {
        let wf = Workflow::new(ImporterConfig {
            staging_ttl_secs: u64::MAX,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(wf.expiry(Utc::now()), DateTime::<Utc>::MAX_UTC);
        let now = Utc::now();
        assert_eq!(workflow(&std::env::temp_dir()).expiry(now), now + Duration::hours(1));
    }
}
