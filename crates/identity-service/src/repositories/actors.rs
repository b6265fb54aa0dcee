//! Actor storage.
//!
//! All six kinds share the `actors` table, discriminated by `kind`. Reads
//! never return soft-deleted rows.

use crate::errors::IdentityError;
use crate::models::{Actor, ActorKind, ActorList, ActorProfile, Credential};
use async_trait::async_trait;
use common::types::ListFilter;
use sqlx::PgPool;
use uuid::Uuid;

macro_rules! actor_columns {
    () => {
        "id, kind, user_login, fullname, email, phone, birthday, gender, \
         branch_id, group_id, salary, ielts_score, ielts_attempts_count, paid_sum, \
         started_at, finished_at, created_at, updated_at"
    };
}

#[async_trait]
pub trait ActorRepository: Send + Sync {
    /// Insert a new actor with a freshly numbered login handle.
    ///
    /// With a `registration_key`, a repeated call returns the actor created by
    /// the first call instead of inserting again. If that actor has since been
    /// soft-deleted the call fails with `InvalidCredentials`.
    async fn create(
        &self,
        kind: ActorKind,
        profile: &ActorProfile,
        password_hash: &str,
        registration_key: Option<Uuid>,
    ) -> Result<Actor, IdentityError>;

    async fn update(
        &self,
        kind: ActorKind,
        id: Uuid,
        profile: &ActorProfile,
    ) -> Result<Option<Actor>, IdentityError>;

    async fn get_all(&self, kind: ActorKind, filter: &ListFilter)
        -> Result<ActorList, IdentityError>;

    async fn get_by_id(&self, kind: ActorKind, id: Uuid) -> Result<Option<Actor>, IdentityError>;

    /// Soft delete. Returns whether a live row was marked.
    async fn delete(&self, kind: ActorKind, id: Uuid) -> Result<bool, IdentityError>;

    async fn get_credential_by_login(
        &self,
        kind: ActorKind,
        login: &str,
    ) -> Result<Option<Credential>, IdentityError>;

    async fn get_password(&self, kind: ActorKind, login: &str)
        -> Result<Option<String>, IdentityError>;

    /// Swap the stored digest only if it still equals `expected_hash`.
    /// Returns whether the swap happened.
    async fn replace_password_hash(
        &self,
        kind: ActorKind,
        login: &str,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, IdentityError>;

    async fn exists(&self, kind: ActorKind, id: Uuid) -> Result<bool, IdentityError>;
}

pub struct PgActorRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct KeyedActor {
    #[sqlx(flatten)]
    actor: Actor,
    deleted: bool,
}

/// A registration replayed after its actor was deleted must not revive it.
fn live_registration(actor: Actor, deleted: bool) -> Result<Actor, IdentityError> {
    if deleted {
        tracing::warn!(
            target: "identity.repository",
            actor_id = %actor.id,
            "Registration replayed for a deleted actor"
        );
        return Err(IdentityError::InvalidCredentials);
    }
    Ok(actor)
}

impl PgActorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_registration_key(
        &self,
        key: Uuid,
    ) -> Result<Option<Actor>, IdentityError> {
        let row = sqlx::query_as::<_, KeyedActor>(concat!(
            "SELECT ",
            actor_columns!(),
            ", deleted_at IS NOT NULL AS deleted FROM actors WHERE registration_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to fetch actor by registration key: {}", e)))?;

        row.map(|row| live_registration(row.actor, row.deleted))
            .transpose()
    }
}

#[async_trait]
impl ActorRepository for PgActorRepository {
    async fn create(
        &self,
        kind: ActorKind,
        profile: &ActorProfile,
        password_hash: &str,
        registration_key: Option<Uuid>,
    ) -> Result<Actor, IdentityError> {
        if let Some(key) = registration_key {
            if let Some(existing) = self.find_by_registration_key(key).await? {
                return Ok(existing);
            }
        }

        let sequence: i64 = sqlx::query_scalar("SELECT nextval($1::regclass)")
            .bind(kind.login_sequence())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IdentityError::Database(format!("Failed to draw login sequence: {}", e)))?;

        let inserted = sqlx::query_as::<_, Actor>(concat!(
            r#"
            INSERT INTO actors (
                kind, user_login, password_hash, registration_key,
                fullname, email, phone, birthday, gender,
                branch_id, group_id, salary, ielts_score, ielts_attempts_count, paid_sum,
                started_at, finished_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (registration_key) DO NOTHING
            RETURNING "#,
            actor_columns!()
        ))
        .bind(kind)
        .bind(kind.format_login(sequence))
        .bind(password_hash)
        .bind(registration_key)
        .bind(profile.fullname.trim())
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(profile.birthday)
        .bind(&profile.gender)
        .bind(profile.branch_id)
        .bind(profile.group_id)
        .bind(profile.salary)
        .bind(profile.ielts_score)
        .bind(profile.ielts_attempts_count)
        .bind(profile.paid_sum)
        .bind(profile.started_at)
        .bind(profile.finished_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to create actor: {}", e)))?;

        match (inserted, registration_key) {
            (Some(actor), _) => Ok(actor),
            // Lost a race with a concurrent retry of the same registration.
            (None, Some(key)) => self
                .find_by_registration_key(key)
                .await?
                .ok_or_else(|| IdentityError::Database("Registration row vanished".to_string())),
            (None, None) => Err(IdentityError::Database(
                "Insert returned no row".to_string(),
            )),
        }
    }

    async fn update(
        &self,
        kind: ActorKind,
        id: Uuid,
        profile: &ActorProfile,
    ) -> Result<Option<Actor>, IdentityError> {
        sqlx::query_as::<_, Actor>(concat!(
            r#"
            UPDATE actors SET
                fullname = $3, email = $4, phone = $5, birthday = $6, gender = $7,
                branch_id = $8, group_id = $9, salary = $10, ielts_score = $11,
                ielts_attempts_count = $12, paid_sum = $13, started_at = $14,
                finished_at = $15, updated_at = NOW()
            WHERE id = $1 AND kind = $2 AND deleted_at IS NULL
            RETURNING "#,
            actor_columns!()
        ))
        .bind(id)
        .bind(kind)
        .bind(profile.fullname.trim())
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(profile.birthday)
        .bind(&profile.gender)
        .bind(profile.branch_id)
        .bind(profile.group_id)
        .bind(profile.salary)
        .bind(profile.ielts_score)
        .bind(profile.ielts_attempts_count)
        .bind(profile.paid_sum)
        .bind(profile.started_at)
        .bind(profile.finished_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to update actor: {}", e)))
    }

    async fn get_all(
        &self,
        kind: ActorKind,
        filter: &ListFilter,
    ) -> Result<ActorList, IdentityError> {
        let pattern = filter.search_pattern();

        let actors = sqlx::query_as::<_, Actor>(concat!(
            "SELECT ",
            actor_columns!(),
            r#"
            FROM actors
            WHERE kind = $1 AND deleted_at IS NULL
              AND ($2::text IS NULL OR fullname ILIKE $2)
            ORDER BY created_at DESC, user_login DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(kind)
        .bind(pattern.as_deref())
        .bind(filter.page_limit())
        .bind(filter.row_offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to list actors: {}", e)))?;

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM actors
            WHERE kind = $1 AND deleted_at IS NULL
              AND ($2::text IS NULL OR fullname ILIKE $2)
            "#,
        )
        .bind(kind)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to count actors: {}", e)))?;

        Ok(ActorList { actors, count })
    }

    async fn get_by_id(&self, kind: ActorKind, id: Uuid) -> Result<Option<Actor>, IdentityError> {
        sqlx::query_as::<_, Actor>(concat!(
            "SELECT ",
            actor_columns!(),
            " FROM actors WHERE id = $1 AND kind = $2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to fetch actor by id: {}", e)))
    }

    async fn delete(&self, kind: ActorKind, id: Uuid) -> Result<bool, IdentityError> {
        let result = sqlx::query(
            r#"
            UPDATE actors
            SET deleted_at = NOW()
            WHERE id = $1 AND kind = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(kind)
        .execute(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to delete actor: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_credential_by_login(
        &self,
        kind: ActorKind,
        login: &str,
    ) -> Result<Option<Credential>, IdentityError> {
        sqlx::query_as::<_, Credential>(
            r#"
            SELECT id AS subject_id, user_login AS login_handle, password_hash
            FROM actors
            WHERE kind = $1 AND user_login = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(kind)
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to fetch credential: {}", e)))
    }

    async fn get_password(
        &self,
        kind: ActorKind,
        login: &str,
    ) -> Result<Option<String>, IdentityError> {
        sqlx::query_scalar(
            r#"
            SELECT password_hash
            FROM actors
            WHERE kind = $1 AND user_login = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(kind)
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to fetch password hash: {}", e)))
    }

    async fn replace_password_hash(
        &self,
        kind: ActorKind,
        login: &str,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, IdentityError> {
        let result = sqlx::query(
            r#"
            UPDATE actors
            SET password_hash = $4, updated_at = NOW()
            WHERE kind = $1 AND user_login = $2 AND password_hash = $3
              AND deleted_at IS NULL
            "#,
        )
        .bind(kind)
        .bind(login)
        .bind(expected_hash)
        .bind(new_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to change password: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, kind: ActorKind, id: Uuid) -> Result<bool, IdentityError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM actors WHERE id = $1 AND kind = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to check actor: {}", e)))
    }
}

pub mod mock {
    //! In-memory actor store for tests and the local harness.

    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    struct StoredActor {
        actor: Actor,
        password_hash: String,
        registration_key: Option<Uuid>,
        deleted: bool,
    }

    #[derive(Default)]
    struct State {
        rows: Vec<StoredActor>,
        sequences: HashMap<ActorKind, i64>,
    }

    /// Mock actor repository backed by a `Vec`.
    #[derive(Default)]
    pub struct InMemoryActorRepository {
        state: Mutex<State>,
        create_calls: AtomicUsize,
        /// Number of upcoming `create` calls that fail with a database error.
        failing_creates: AtomicUsize,
    }

    impl InMemoryActorRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next `n` creates fail, simulating a crash between
        /// code confirmation and record insertion.
        pub fn fail_next_creates(&self, n: usize) {
            self.failing_creates.store(n, Ordering::SeqCst);
        }

        pub fn create_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }

        /// Number of live actors of a kind.
        pub async fn live_count(&self, kind: ActorKind) -> usize {
            let state = self.state.lock().await;
            state
                .rows
                .iter()
                .filter(|row| row.actor.kind == kind && !row.deleted)
                .count()
        }

        /// Stored digest, including for soft-deleted rows.
        pub async fn stored_hash(&self, kind: ActorKind, login: &str) -> Option<String> {
            let state = self.state.lock().await;
            state
                .rows
                .iter()
                .find(|row| row.actor.kind == kind && row.actor.user_login == login)
                .map(|row| row.password_hash.clone())
        }

        fn live<'a>(
            state: &'a mut State,
            kind: ActorKind,
            matches: impl Fn(&StoredActor) -> bool,
        ) -> Option<&'a mut StoredActor> {
            state
                .rows
                .iter_mut()
                .find(|row| row.actor.kind == kind && !row.deleted && matches(row))
        }
    }

    #[async_trait]
    impl ActorRepository for InMemoryActorRepository {
        async fn create(
            &self,
            kind: ActorKind,
            profile: &ActorProfile,
            password_hash: &str,
            registration_key: Option<Uuid>,
        ) -> Result<Actor, IdentityError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);

            let failing = self.failing_creates.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_creates.store(failing - 1, Ordering::SeqCst);
                return Err(IdentityError::Database(
                    "Mock actor repository failure".to_string(),
                ));
            }

            let mut state = self.state.lock().await;

            if let Some(key) = registration_key {
                if let Some(existing) = state
                    .rows
                    .iter()
                    .find(|row| row.registration_key == Some(key))
                {
                    return live_registration(existing.actor.clone(), existing.deleted);
                }
            }

            let sequence = state.sequences.entry(kind).or_insert(0);
            *sequence += 1;
            let user_login = kind.format_login(*sequence);

            let now = Utc::now();
            let actor = Actor {
                id: Uuid::new_v4(),
                kind,
                user_login,
                fullname: profile.fullname.trim().to_string(),
                email: profile.email.clone(),
                phone: profile.phone.clone(),
                birthday: profile.birthday,
                gender: profile.gender.clone(),
                branch_id: profile.branch_id,
                group_id: profile.group_id,
                salary: profile.salary,
                ielts_score: profile.ielts_score,
                ielts_attempts_count: profile.ielts_attempts_count,
                paid_sum: profile.paid_sum,
                started_at: profile.started_at,
                finished_at: profile.finished_at,
                created_at: now,
                updated_at: now,
            };

            state.rows.push(StoredActor {
                actor: actor.clone(),
                password_hash: password_hash.to_string(),
                registration_key,
                deleted: false,
            });

            Ok(actor)
        }

        async fn update(
            &self,
            kind: ActorKind,
            id: Uuid,
            profile: &ActorProfile,
        ) -> Result<Option<Actor>, IdentityError> {
            let mut state = self.state.lock().await;
            let Some(row) = Self::live(&mut state, kind, |row| row.actor.id == id) else {
                return Ok(None);
            };

            let actor = &mut row.actor;
            actor.fullname = profile.fullname.trim().to_string();
            actor.email = profile.email.clone();
            actor.phone = profile.phone.clone();
            actor.birthday = profile.birthday;
            actor.gender = profile.gender.clone();
            actor.branch_id = profile.branch_id;
            actor.group_id = profile.group_id;
            actor.salary = profile.salary;
            actor.ielts_score = profile.ielts_score;
            actor.ielts_attempts_count = profile.ielts_attempts_count;
            actor.paid_sum = profile.paid_sum;
            actor.started_at = profile.started_at;
            actor.finished_at = profile.finished_at;
            actor.updated_at = Utc::now();

            Ok(Some(actor.clone()))
        }

        async fn get_all(
            &self,
            kind: ActorKind,
            filter: &ListFilter,
        ) -> Result<ActorList, IdentityError> {
            let state = self.state.lock().await;
            let needle = filter
                .search
                .as_deref()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty());

            let matching: Vec<&Actor> = state
                .rows
                .iter()
                .rev()
                .filter(|row| row.actor.kind == kind && !row.deleted)
                .map(|row| &row.actor)
                .filter(|actor| match &needle {
                    Some(needle) => actor.fullname.to_lowercase().contains(needle),
                    None => true,
                })
                .collect();

            let count = i64::try_from(matching.len()).unwrap_or(i64::MAX);
            let skip = usize::try_from(filter.row_offset()).unwrap_or(usize::MAX);
            let take = usize::try_from(filter.page_limit()).unwrap_or(0);
            let actors = matching.into_iter().skip(skip).take(take).cloned().collect();

            Ok(ActorList { actors, count })
        }

        async fn get_by_id(
            &self,
            kind: ActorKind,
            id: Uuid,
        ) -> Result<Option<Actor>, IdentityError> {
            let mut state = self.state.lock().await;
            Ok(Self::live(&mut state, kind, |row| row.actor.id == id).map(|row| row.actor.clone()))
        }

        async fn delete(&self, kind: ActorKind, id: Uuid) -> Result<bool, IdentityError> {
            let mut state = self.state.lock().await;
            match Self::live(&mut state, kind, |row| row.actor.id == id) {
                Some(row) => {
                    row.deleted = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn get_credential_by_login(
            &self,
            kind: ActorKind,
            login: &str,
        ) -> Result<Option<Credential>, IdentityError> {
            let mut state = self.state.lock().await;
            Ok(
                Self::live(&mut state, kind, |row| row.actor.user_login == login).map(|row| {
                    Credential {
                        subject_id: row.actor.id,
                        login_handle: row.actor.user_login.clone(),
                        password_hash: row.password_hash.clone(),
                    }
                }),
            )
        }

        async fn get_password(
            &self,
            kind: ActorKind,
            login: &str,
        ) -> Result<Option<String>, IdentityError> {
            let mut state = self.state.lock().await;
            Ok(Self::live(&mut state, kind, |row| row.actor.user_login == login)
                .map(|row| row.password_hash.clone()))
        }

        async fn replace_password_hash(
            &self,
            kind: ActorKind,
            login: &str,
            expected_hash: &str,
            new_hash: &str,
        ) -> Result<bool, IdentityError> {
            let mut state = self.state.lock().await;
            match Self::live(&mut state, kind, |row| {
                row.actor.user_login == login && row.password_hash == expected_hash
            }) {
                Some(row) => {
                    row.password_hash = new_hash.to_string();
                    row.actor.updated_at = Utc::now();
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn exists(&self, kind: ActorKind, id: Uuid) -> Result<bool, IdentityError> {
            let mut state = self.state.lock().await;
            Ok(Self::live(&mut state, kind, |row| row.actor.id == id).is_some())
        }
    }

}
