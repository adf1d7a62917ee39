//! Caller-owned state carried between the upload, execute and clear steps.
//!
//! Every slot carries its own expiry; an expired slot reads as empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

use crate::model::ImportBatch;
use crate::summary::ImportSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staged<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> Staged<T> {
    fn live_at(&self, now: DateTime<Utc>) -> Option<&T> {
        (now < self.expires_at).then_some(&self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSession {
    csv_file: Option<Staged<String>>,
    batch: Option<Staged<ImportBatch>>,
    results: Option<Staged<ImportSummary>>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an accepted upload, replacing whatever was staged before.
    pub fn stage_upload(&mut self, csv_file: String, batch: ImportBatch, expires_at: DateTime<Utc>) {
        self.csv_file = Some(Staged {
            value: csv_file,
            expires_at,
        });
        self.batch = Some(Staged {
            value: batch,
            expires_at,
        });
    }

    pub fn batch(&self, now: DateTime<Utc>) -> Option<&ImportBatch> {
        self.batch.as_ref().and_then(|s| s.live_at(now))
    }

    pub fn csv_file(&self, now: DateTime<Utc>) -> Option<&str> {
        self.csv_file
            .as_ref()
            .and_then(|s| s.live_at(now))
            .map(String::as_str)
    }

    pub fn category(&self, now: DateTime<Utc>) -> Option<&str> {
        self.batch(now).map(|b| b.category.as_str())
    }

    /// Replaces the previous summary, if any.
    pub fn store_results(&mut self, summary: ImportSummary, expires_at: DateTime<Utc>) {
        self.results = Some(Staged {
            value: summary,
            expires_at,
        });
    }

    pub fn results(&self, now: DateTime<Utc>) -> Option<&ImportSummary> {
        self.results.as_ref().and_then(|s| s.live_at(now))
    }

    /// Removes and returns the summary so it is shown once.
    pub fn take_results(&mut self, now: DateTime<Utc>) -> Option<ImportSummary> {
        self.results
            .take()
            .filter(|s| now < s.expires_at)
            .map(|s| s.value)
    }

    /// Drops the uploaded batch and its file name, keeping results.
    pub fn retire_batch(&mut self) {
        self.csv_file = None;
        self.batch = None;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        if self.csv_file.as_ref().is_some_and(|s| now >= s.expires_at) {
            self.csv_file = None;
        }
        if self.batch.as_ref().is_some_and(|s| now >= s.expires_at) {
            self.batch = None;
        }
        if self.results.as_ref().is_some_and(|s| now >= s.expires_at) {
            self.results = None;
        }
    }

    /// Reads a saved session; a missing file is an empty session.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(std::io::Error::other),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Like [`ImportSession::load`], but an unreadable or corrupt file is
    /// logged and replaced by an empty session.
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(session) => session,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable session");
                Self::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await
    }
}
