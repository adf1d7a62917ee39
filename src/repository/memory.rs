use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    GrantRecord, GrantRepository, NewGrant, NewUser, RecordStore, RepoResult, UserRecord,
    UserRepository,
};
use crate::role::known_categories;

/// Process-local backend, mostly for tests and dry runs.
#[derive(Debug)]
pub struct InMemoryRepository {
    store: Mutex<RecordStore>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::with_categories(known_categories())
    }
}

impl InMemoryRepository {
    pub fn with_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store: Mutex::new(RecordStore::with_categories(categories)),
        }
    }

    pub async fn grants(&self) -> Vec<GrantRecord> {
        self.store.lock().await.grants().to_vec()
    }

    pub async fn users(&self) -> Vec<UserRecord> {
        self.store.lock().await.users().to_vec()
    }
}

#[async_trait]
impl GrantRepository for InMemoryRepository {
    async fn find_grant_by_number(&self, grant_number: &str) -> RepoResult<Option<GrantRecord>> {
        Ok(self.store.lock().await.grant_by_number(grant_number).cloned())
    }

    async fn category_exists(&self, slug: &str) -> RepoResult<bool> {
        Ok(self.store.lock().await.has_category(slug))
    }

    async fn create_grant(&self, grant: NewGrant) -> RepoResult<GrantRecord> {
        self.store.lock().await.insert_grant(grant, Utc::now())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<UserRecord>> {
        Ok(self.store.lock().await.user_by_email(email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<UserRecord> {
        self.store.lock().await.insert_user(user, Utc::now())
    }
}
