use crate::errors::IdentityError;
use crate::models::{EventRegistration, StudentEvent};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait EventRegistrationRepository: Send + Sync {
    /// Insert a registration. A live duplicate for the same event and
    /// student fails with `AlreadyRegistered`.
    async fn create(
        &self,
        event_id: Uuid,
        student_id: Uuid,
    ) -> Result<EventRegistration, IdentityError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<EventRegistration>, IdentityError>;

    async fn delete(&self, id: Uuid) -> Result<bool, IdentityError>;

    async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<StudentEvent>, IdentityError>;

    async fn exists_for(&self, event_id: Uuid, student_id: Uuid) -> Result<bool, IdentityError>;

    /// Live registrations of the student for events of other branches
    /// starting on `day` (UTC calendar date).
    async fn count_other_branch_same_day(
        &self,
        student_id: Uuid,
        branch_id: Uuid,
        day: NaiveDate,
    ) -> Result<i64, IdentityError>;
}

pub struct PgEventRegistrationRepository {
    pool: PgPool,
}

impl PgEventRegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRegistrationRepository for PgEventRegistrationRepository {
    async fn create(
        &self,
        event_id: Uuid,
        student_id: Uuid,
    ) -> Result<EventRegistration, IdentityError> {
        sqlx::query_as::<_, EventRegistration>(
            r#"
            INSERT INTO event_registrations (event_id, student_id)
            VALUES ($1, $2)
            RETURNING id, event_id, student_id, created_at
            "#,
        )
        .bind(event_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                IdentityError::AlreadyRegistered
            }
            other => IdentityError::Database(format!("Failed to create registration: {}", other)),
        })
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<EventRegistration>, IdentityError> {
        sqlx::query_as::<_, EventRegistration>(
            r#"
            SELECT id, event_id, student_id, created_at
            FROM event_registrations
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to fetch registration: {}", e)))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, IdentityError> {
        let result = sqlx::query(
            r#"
            UPDATE event_registrations
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to delete registration: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<StudentEvent>, IdentityError> {
        sqlx::query_as::<_, StudentEvent>(
            r#"
            SELECT er.id AS registration_id, e.id AS event_id, e.topic,
                   e.start_time, e.end_time, e.branch_id
            FROM event_registrations er
            JOIN events e ON e.id = er.event_id
            WHERE er.student_id = $1
              AND er.deleted_at IS NULL
              AND e.deleted_at IS NULL
            ORDER BY e.start_time NULLS LAST
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to list student events: {}", e)))
    }

    async fn exists_for(&self, event_id: Uuid, student_id: Uuid) -> Result<bool, IdentityError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM event_registrations
                WHERE event_id = $1 AND student_id = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(event_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to check registration: {}", e)))
    }

    async fn count_other_branch_same_day(
        &self,
        student_id: Uuid,
        branch_id: Uuid,
        day: NaiveDate,
    ) -> Result<i64, IdentityError> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM event_registrations er
            JOIN events e ON e.id = er.event_id
            WHERE er.student_id = $1
              AND er.deleted_at IS NULL
              AND e.deleted_at IS NULL
              AND e.branch_id <> $2
              AND (e.start_time AT TIME ZONE 'UTC')::date = $3
            "#,
        )
        .bind(student_id)
        .bind(branch_id)
        .bind(day)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to check branch conflicts: {}", e)))
    }
}

pub mod mock {
    use super::*;
    use crate::repositories::events::mock::InMemoryEventRepository;
    use chrono::Utc;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct Row {
        registration: EventRegistration,
        deleted: bool,
    }

    /// In-memory registrations joined against an in-memory event store.
    pub struct InMemoryEventRegistrationRepository {
        events: Arc<InMemoryEventRepository>,
        rows: Mutex<Vec<Row>>,
    }

    impl InMemoryEventRegistrationRepository {
        pub fn new(events: Arc<InMemoryEventRepository>) -> Self {
            Self {
                events,
                rows: Mutex::new(Vec::new()),
            }
        }

        pub async fn live_count(&self) -> usize {
            self.rows.lock().await.iter().filter(|r| !r.deleted).count()
        }
    }

    #[async_trait]
    impl EventRegistrationRepository for InMemoryEventRegistrationRepository {
        async fn create(
            &self,
            event_id: Uuid,
            student_id: Uuid,
        ) -> Result<EventRegistration, IdentityError> {
            let mut rows = self.rows.lock().await;
            if rows.iter().any(|r| {
                !r.deleted
                    && r.registration.event_id == event_id
                    && r.registration.student_id == student_id
            }) {
                return Err(IdentityError::AlreadyRegistered);
            }
            let registration = EventRegistration {
                id: Uuid::new_v4(),
                event_id,
                student_id,
                created_at: Utc::now(),
            };
            rows.push(Row {
                registration: registration.clone(),
                deleted: false,
            });
            Ok(registration)
        }

        async fn get_by_id(&self, id: Uuid) -> Result<Option<EventRegistration>, IdentityError> {
            Ok(self
                .rows
                .lock()
                .await
                .iter()
                .find(|r| !r.deleted && r.registration.id == id)
                .map(|r| r.registration.clone()))
        }

        async fn delete(&self, id: Uuid) -> Result<bool, IdentityError> {
            let mut rows = self.rows.lock().await;
            match rows
                .iter_mut()
                .find(|r| !r.deleted && r.registration.id == id)
            {
                Some(row) => {
                    row.deleted = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn list_for_student(
            &self,
            student_id: Uuid,
        ) -> Result<Vec<StudentEvent>, IdentityError> {
            let registrations: Vec<EventRegistration> = self
                .rows
                .lock()
                .await
                .iter()
                .filter(|r| !r.deleted && r.registration.student_id == student_id)
                .map(|r| r.registration.clone())
                .collect();

            let mut listed = Vec::new();
            for registration in registrations {
                if let Some(event) = self.events.live(registration.event_id).await {
                    listed.push(StudentEvent {
                        registration_id: registration.id,
                        event_id: event.id,
                        topic: event.topic,
                        start_time: event.start_time,
                        end_time: event.end_time,
                        branch_id: event.branch_id,
                    });
                }
            }
            listed.sort_by_key(|e| (e.start_time.is_none(), e.start_time));
            Ok(listed)
        }

        async fn exists_for(&self, event_id: Uuid, student_id: Uuid) -> Result<bool, IdentityError> {
            Ok(self.rows.lock().await.iter().any(|r| {
                !r.deleted
                    && r.registration.event_id == event_id
                    && r.registration.student_id == student_id
            }))
        }

        async fn count_other_branch_same_day(
            &self,
            student_id: Uuid,
            branch_id: Uuid,
            day: NaiveDate,
        ) -> Result<i64, IdentityError> {
            let mut count = 0;
            for event in self.list_for_student(student_id).await? {
                let same_day = event
                    .start_time
                    .is_some_and(|start| start.date_naive() == day);
                if same_day && event.branch_id != branch_id {
                    count += 1;
                }
            }
            Ok(count)
        }
    }
}
