use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{
    GrantRecord, GrantRepository, NewGrant, NewUser, RecordStore, RepoResult, UserRecord,
    UserRepository,
};
use crate::role::known_categories;

/// Backend that keeps every record in one JSON document on disk.
///
/// The document is rewritten after each successful create. A create whose
/// write fails leaves both the file and the in-memory view unchanged.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    store: Mutex<RecordStore>,
}

impl JsonFileRepository {
    /// Loads `path`, or starts empty (with the known program categories) when
    /// it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> RepoResult<Self> {
        let path = path.into();
        let store = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "starting a new record store");
                RecordStore::with_categories(known_categories())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            store: Mutex::new(store),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> RecordStore {
        self.store.lock().await.clone()
    }

    async fn write(&self, store: &RecordStore) -> RepoResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(store)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "record store written");
        Ok(())
    }
}

#[async_trait]
impl GrantRepository for JsonFileRepository {
    async fn find_grant_by_number(&self, grant_number: &str) -> RepoResult<Option<GrantRecord>> {
        Ok(self.store.lock().await.grant_by_number(grant_number).cloned())
    }

    async fn category_exists(&self, slug: &str) -> RepoResult<bool> {
        Ok(self.store.lock().await.has_category(slug))
    }

    async fn create_grant(&self, grant: NewGrant) -> RepoResult<GrantRecord> {
        let mut store = self.store.lock().await;
        let mut next = store.clone();
        let record = next.insert_grant(grant, Utc::now())?;
        self.write(&next).await?;
        *store = next;
        Ok(record)
    }
}

#[async_trait]
impl UserRepository for JsonFileRepository {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<UserRecord>> {
        Ok(self.store.lock().await.user_by_email(email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<UserRecord> {
        let mut store = self.store.lock().await;
        let mut next = store.clone();
        let record = next.insert_user(user, Utc::now())?;
        self.write(&next).await?;
        *store = next;
        Ok(record)
    }
}
