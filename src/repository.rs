//! Persistence capabilities the import engine relies on.
//!
//! Grants are keyed by grant number, users by email. Both backends share
//! [`RecordStore`] so they enforce the same uniqueness and shape rules.

mod json_file;
mod memory;

pub use json_file::JsonFileRepository;
pub use memory::InMemoryRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::credential::Password;

pub type RecordId = u64;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("{0}")]
    Rejected(String),

    #[error("record store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub phone_extension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub title: String,
    pub grant_number: String,
    pub city: String,
    pub state: String,
    pub start_date: String,
    pub end_date: String,
    pub contact: Contact,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub id: RecordId,
    pub title: String,
    pub grant_number: String,
    pub city: String,
    pub state: String,
    pub start_date: String,
    pub end_date: String,
    pub contact: Contact,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub password: Password,
    /// Whether the backend should announce the new account.
    pub send_notification: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: RecordId,
    pub login: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub credential_digest: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait GrantRepository: Send + Sync {
    async fn find_grant_by_number(&self, grant_number: &str) -> RepoResult<Option<GrantRecord>>;

    /// Whether `slug` names a category grants can be tagged with.
    async fn category_exists(&self, slug: &str) -> RepoResult<bool>;

    async fn create_grant(&self, grant: NewGrant) -> RepoResult<GrantRecord>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<UserRecord>>;

    async fn create_user(&self, user: NewUser) -> RepoResult<UserRecord>;
}

#[async_trait]
impl<T: GrantRepository + ?Sized> GrantRepository for Arc<T> {
    async fn find_grant_by_number(&self, grant_number: &str) -> RepoResult<Option<GrantRecord>> {
        (**self).find_grant_by_number(grant_number).await
    }

    async fn category_exists(&self, slug: &str) -> RepoResult<bool> {
        (**self).category_exists(slug).await
    }

    async fn create_grant(&self, grant: NewGrant) -> RepoResult<GrantRecord> {
        (**self).create_grant(grant).await
    }
}

#[async_trait]
impl<T: UserRepository + ?Sized> UserRepository for Arc<T> {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<UserRecord>> {
        (**self).find_user_by_email(email).await
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<UserRecord> {
        (**self).create_user(user).await
    }
}

/// Records of both kinds plus the known categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordStore {
    next_id: RecordId,
    categories: BTreeSet<String>,
    grants: Vec<GrantRecord>,
    users: Vec<UserRecord>,
}

impl RecordStore {
    pub fn with_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn grants(&self) -> &[GrantRecord] {
        &self.grants
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    pub fn has_category(&self, slug: &str) -> bool {
        self.categories.contains(slug)
    }

    pub fn grant_by_number(&self, grant_number: &str) -> Option<&GrantRecord> {
        self.grants.iter().find(|g| g.grant_number == grant_number)
    }

    /// Emails compare case-insensitively.
    pub fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn insert_grant(&mut self, grant: NewGrant, now: DateTime<Utc>) -> RepoResult<GrantRecord> {
        if grant.title.is_empty() {
            return Err(RepoError::Rejected("grant title is empty".into()));
        }
        if grant.grant_number.is_empty() {
            return Err(RepoError::Rejected("grant number is empty".into()));
        }
        if self.grant_by_number(&grant.grant_number).is_some() {
            return Err(RepoError::Conflict {
                entity: "grant",
                key: grant.grant_number,
            });
        }

        let record = GrantRecord {
            id: self.allocate_id(),
            title: grant.title,
            grant_number: grant.grant_number,
            city: grant.city,
            state: grant.state,
            start_date: grant.start_date,
            end_date: grant.end_date,
            contact: grant.contact,
            category: grant.category,
            created_at: now,
        };
        self.grants.push(record.clone());
        Ok(record)
    }

    pub fn insert_user(&mut self, user: NewUser, now: DateTime<Utc>) -> RepoResult<UserRecord> {
        if user.login.is_empty() {
            return Err(RepoError::Rejected(
                "cannot create a user with an empty login name".into(),
            ));
        }
        match user.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => {
                return Err(RepoError::Rejected(format!(
                    "invalid email address: {}",
                    user.email
                )))
            }
        }
        if self.users.iter().any(|u| u.login == user.login) {
            return Err(RepoError::Conflict {
                entity: "login",
                key: user.login,
            });
        }
        if self.user_by_email(&user.email).is_some() {
            return Err(RepoError::Conflict {
                entity: "user",
                key: user.email,
            });
        }

        let record = UserRecord {
            id: self.allocate_id(),
            credential_digest: user.password.digest(),
            login: user.login,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            created_at: now,
        };
        self.users.push(record.clone());
        Ok(record)
    }

    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }
}
