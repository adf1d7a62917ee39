//! Turns staged rows into grant and user records.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::credential::Password;
use crate::model::{GrantRow, ImportBatch, ImportLimit};
use crate::normalize::split_name;
use crate::repository::{Contact, GrantRepository, NewGrant, NewUser, UserRepository};
use crate::role::map_role;
use crate::summary::{ImportSummary, Outcome, RowOutcome};

/// Imports rows one at a time. Each row checks for an existing grant (by
/// grant number) and user (by email) before creating either, so running the
/// same batch twice creates nothing the second time.
pub struct ImportEngine<G, U> {
    grants: G,
    users: U,
}

impl<R> ImportEngine<Arc<R>, Arc<R>>
where
    R: GrantRepository + UserRepository,
{
    /// One backend serving both record kinds.
    pub fn shared(repo: Arc<R>) -> Self {
        Self::new(Arc::clone(&repo), repo)
    }
}

impl<G, U> ImportEngine<G, U>
where
    G: GrantRepository,
    U: UserRepository,
{
    pub fn new(grants: G, users: U) -> Self {
        Self { grants, users }
    }

    /// Processes the rows `limit` selects and summarizes every outcome.
    /// Row failures are collected, never propagated.
    #[instrument(skip_all, fields(category = %batch.category, limit = %limit))]
    pub async fn execute(&self, batch: &ImportBatch, limit: ImportLimit) -> ImportSummary {
        let selected = batch.select(limit);
        let role = map_role(&batch.category);
        info!(rows = selected.len(), staged = batch.len(), role, "import started");

        let mut outcomes = Vec::with_capacity(selected.len());
        for (index, raw) in selected.iter().enumerate() {
            let row = GrantRow::from_raw(raw, &batch.category);
            outcomes.push(self.process_row(index + 1, &row, role).await);
        }

        let summary: ImportSummary = outcomes.into_iter().collect();
        info!(
            grants_created = summary.grants_created,
            grants_skipped = summary.grants_skipped,
            users_created = summary.users_created,
            users_skipped = summary.users_skipped,
            errors = summary.errors.len(),
            "import finished"
        );
        summary
    }

    /// Grant first; the user is only attempted once the grant exists.
    pub async fn process_row(&self, position: usize, row: &GrantRow, role: &str) -> RowOutcome {
        let grant = self.ensure_grant(row).await;
        if let Outcome::Failed(reason) = &grant {
            warn!(row = position, grant_number = %row.grant_number, %reason, "grant not created");
            return RowOutcome {
                row: position,
                grant,
                user: None,
            };
        }

        let user = self.ensure_user(row, role).await;
        if let Outcome::Failed(reason) = &user {
            warn!(row = position, email = %row.contact_email, %reason, "user not created");
        }
        RowOutcome {
            row: position,
            grant,
            user: Some(user),
        }
    }

    async fn ensure_grant(&self, row: &GrantRow) -> Outcome {
        match self.grants.find_grant_by_number(&row.grant_number).await {
            Ok(Some(existing)) => {
                debug!(grant_id = existing.id, grant_number = %row.grant_number, "grant exists");
                return Outcome::Skipped;
            }
            Ok(None) => {}
            Err(e) => return Outcome::Failed(e.to_string()),
        }

        let category = match self.grants.category_exists(&row.category).await {
            Ok(true) => Some(row.category.clone()),
            Ok(false) => {
                warn!(category = %row.category, "unknown category, grant left untagged");
                None
            }
            Err(e) => {
                warn!(category = %row.category, error = %e, "category lookup failed, grant left untagged");
                None
            }
        };

        match self.grants.create_grant(new_grant(row, category)).await {
            Ok(record) => {
                debug!(grant_id = record.id, grant_number = %record.grant_number, "grant created");
                Outcome::Created
            }
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    async fn ensure_user(&self, row: &GrantRow, role: &str) -> Outcome {
        match self.users.find_user_by_email(&row.contact_email).await {
            Ok(Some(existing)) => {
                debug!(user_id = existing.id, email = %row.contact_email, "user exists");
                return Outcome::Skipped;
            }
            Ok(None) => {}
            Err(e) => return Outcome::Failed(e.to_string()),
        }

        let name = split_name(&row.contact_name);
        let user = NewUser {
            login: row.login().to_string(),
            email: row.contact_email.clone(),
            first_name: name.first,
            last_name: name.last,
            role: role.to_string(),
            password: Password::generate(),
            send_notification: false,
        };
        match self.users.create_user(user).await {
            Ok(record) => {
                debug!(user_id = record.id, login = %record.login, "user created");
                Outcome::Created
            }
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

fn new_grant(row: &GrantRow, category: Option<String>) -> NewGrant {
    NewGrant {
        title: row.organization.clone(),
        grant_number: row.grant_number.clone(),
        city: row.city.clone(),
        state: row.state.clone(),
        start_date: row.start_date.clone(),
        end_date: row.end_date.clone(),
        contact: Contact {
            name: row.contact_name.clone(),
            email: row.contact_email.clone(),
            phone: row.contact_phone.clone(),
            phone_extension: row.contact_phone_extension.clone(),
        },
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawRow, REQUIRED_COLUMNS};
    use crate::repository::{
        GrantRecord, InMemoryRepository, RepoError, RepoResult, UserRecord,
    };
    use async_trait::async_trait;

    fn row(org: &str, number: &str, name: &str, email: &str) -> RawRow {
        let headers: Vec<String> = REQUIRED_COLUMNS.iter().map(|s| s.to_string()).collect();
        let values = [
            org,
            number,
            "Springfield",
            "IL",
            "3/4/2024",
            "3/3/2029",
            name,
            email,
            "555-123-4567 Ext: 22",
        ];
        RawRow::new(&headers, values.iter().map(|s| s.to_string()).collect())
    }

    fn batch(n: usize) -> ImportBatch {
        let rows = (1..=n)
            .map(|i| {
                row(
                    &format!("Org {i}"),
                    &format!("G{i:03}"),
                    &format!("Director Number {i}"),
                    &format!("director{i}@example.org"),
                )
            })
            .collect();
        ImportBatch::new("gpe", rows)
    }

    #[tokio::test]
    async fn creates_grant_and_user_per_row() {
        let repo = Arc::new(InMemoryRepository::default());
        let engine = ImportEngine::shared(Arc::clone(&repo));

        let summary = engine.execute(&batch(3), ImportLimit::All).await;
        assert_eq!(summary.grants_created, 3);
        assert_eq!(summary.users_created, 3);
        assert!(summary.errors.is_empty());

        let grants = repo.grants().await;
        assert_eq!(grants[0].grant_number, "G001");
        assert_eq!(grants[0].start_date, "2024-03-04");
        assert_eq!(grants[0].contact.phone, "(555) 123-4567");
        assert_eq!(grants[0].contact.phone_extension.as_deref(), Some("22"));
        assert_eq!(grants[0].category.as_deref(), Some("gpe"));

        let users = repo.users().await;
        assert_eq!(users[0].login, "director1");
        assert_eq!(users[0].first_name, "Director Number");
        assert_eq!(users[0].last_name, "1");
        assert_eq!(users[0].role, "gpe-user");
    }

    #[tokio::test]
    async fn second_run_skips_everything() {
        let repo = Arc::new(InMemoryRepository::default());
        let engine = ImportEngine::shared(Arc::clone(&repo));
        let batch = batch(4);

        engine.execute(&batch, ImportLimit::All).await;
        let again = engine.execute(&batch, ImportLimit::All).await;
        assert_eq!(again.grants_created, 0);
        assert_eq!(again.grants_skipped, 4);
        assert_eq!(again.users_created, 0);
        assert_eq!(again.users_skipped, 4);
        assert_eq!(repo.grants().await.len(), 4);
        assert_eq!(repo.users().await.len(), 4);
    }

    #[tokio::test]
    async fn shared_director_is_created_once() {
        let repo = Arc::new(InMemoryRepository::default());
        let engine = ImportEngine::shared(Arc::clone(&repo));
        let batch = ImportBatch::new(
            "amf",
            vec![
                row("Org A", "G1", "Ann Lee", "ann@acme.org"),
                row("Org B", "G2", "Ann Lee", "ann@acme.org"),
            ],
        );
        let summary = engine.execute(&batch, ImportLimit::All).await;
        assert_eq!(summary.grants_created, 2);
        assert_eq!(summary.users_created, 1);
        assert_eq!(summary.users_skipped, 1);
    }

    #[tokio::test]
    async fn failed_grant_skips_its_user() {
        let repo = Arc::new(InMemoryRepository::default());
        let engine = ImportEngine::shared(Arc::clone(&repo));
        let mut batch = batch(5);
        batch.rows[2] = row("", "G003", "No Title", "notitle@example.org");

        let summary = engine.execute(&batch, ImportLimit::All).await;
        assert_eq!(summary.grants_created, 4);
        assert_eq!(summary.users_created, 4);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].row, 3);
        assert_eq!(
            summary.errors[0].to_string(),
            "Row 3: Failed to create grant - grant title is empty"
        );
        assert!(repo
            .users()
            .await
            .iter()
            .all(|u| u.email != "notitle@example.org"));
    }

    #[tokio::test]
    async fn failed_user_is_reported_without_counting() {
        let repo = Arc::new(InMemoryRepository::default());
        let engine = ImportEngine::shared(Arc::clone(&repo));
        let batch = ImportBatch::new(
            "gpe",
            vec![
                row("Org A", "G1", "Ann Lee", "ann@acme.org"),
                row("Org B", "G2", "Ann Other", "ann@other.org"),
                row("Org C", "G3", "Nobody", "no-email"),
            ],
        );
        let summary = engine.execute(&batch, ImportLimit::All).await;
        assert_eq!(summary.grants_created, 3);
        assert_eq!(summary.users_created, 1);
        assert_eq!(summary.users_skipped, 0);
        let rows: Vec<usize> = summary.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![2, 3]);
        assert!(summary.errors[0].reason.contains("login already exists"));
    }

    #[tokio::test]
    async fn limit_processes_a_prefix() {
        let repo = Arc::new(InMemoryRepository::default());
        let engine = ImportEngine::shared(Arc::clone(&repo));
        let batch = batch(20);

        let first = engine.execute(&batch, ImportLimit::One).await;
        assert_eq!(first.grants_created, 1);

        let five = engine.execute(&batch, ImportLimit::Five).await;
        assert_eq!(five.grants_skipped, 1);
        assert_eq!(five.grants_created, 4);
        let numbers: Vec<String> = repo
            .grants()
            .await
            .into_iter()
            .map(|g| g.grant_number)
            .collect();
        assert_eq!(numbers, vec!["G001", "G002", "G003", "G004", "G005"]);
    }

    #[tokio::test]
    async fn unknown_category_creates_untagged_grant_with_default_role() {
        let repo = Arc::new(InMemoryRepository::with_categories(["gpe"]));
        let engine = ImportEngine::shared(Arc::clone(&repo));
        let mut batch = batch(1);
        batch.category = "pilot-program".into();

        let summary = engine.execute(&batch, ImportLimit::All).await;
        assert_eq!(summary.grants_created, 1);
        assert_eq!(repo.grants().await[0].category, None);
        assert_eq!(repo.users().await[0].role, "subscriber");
    }

    /// Grant backend that refuses one grant number.
    struct RefusingGrants {
        inner: InMemoryRepository,
        refuse: &'static str,
    }

    #[async_trait]
    impl GrantRepository for RefusingGrants {
        async fn find_grant_by_number(&self, n: &str) -> RepoResult<Option<GrantRecord>> {
            self.inner.find_grant_by_number(n).await
        }

        async fn category_exists(&self, slug: &str) -> RepoResult<bool> {
            self.inner.category_exists(slug).await
        }

        async fn create_grant(&self, grant: NewGrant) -> RepoResult<GrantRecord> {
            if grant.grant_number == self.refuse {
                return Err(RepoError::Rejected("database is read-only".into()));
            }
            self.inner.create_grant(grant).await
        }
    }

    /// User backend whose lookups always fail.
    struct BrokenUsers;

    #[async_trait]
    impl UserRepository for BrokenUsers {
        async fn find_user_by_email(&self, _email: &str) -> RepoResult<Option<UserRecord>> {
            Err(RepoError::Io(std::io::Error::other("connection reset")))
        }

        async fn create_user(&self, _user: NewUser) -> RepoResult<UserRecord> {
            unreachable!("lookup fails first")
        }
    }

    #[tokio::test]
    async fn backends_can_be_swapped_independently() {
        let users = Arc::new(InMemoryRepository::default());
        let engine = ImportEngine::new(
            RefusingGrants {
                inner: InMemoryRepository::default(),
                refuse: "G002",
            },
            Arc::clone(&users),
        );
        let summary = engine.execute(&batch(3), ImportLimit::All).await;
        assert_eq!(summary.grants_created, 2);
        assert_eq!(summary.users_created, 2);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(
            summary.errors[0].to_string(),
            "Row 2: Failed to create grant - database is read-only"
        );
        assert!(users
            .users()
            .await
            .iter()
            .all(|u| u.email != "director2@example.org"));

        let engine = ImportEngine::new(InMemoryRepository::default(), BrokenUsers);
        let summary = engine.execute(&batch(2), ImportLimit::All).await;
        assert_eq!(summary.grants_created, 2);
        assert_eq!(summary.users_created, 0);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors[0].reason.contains("connection reset"));
    }
}
