use crate::errors::IdentityError;
use crate::models::{Event, EventList, EventSchedule};
use async_trait::async_trait;
use common::types::ListFilter;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, schedule: &EventSchedule) -> Result<Event, IdentityError>;

    async fn update(
        &self,
        id: Uuid,
        schedule: &EventSchedule,
    ) -> Result<Option<Event>, IdentityError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Event>, IdentityError>;

    async fn get_all(&self, filter: &ListFilter) -> Result<EventList, IdentityError>;

    /// Soft delete. Returns whether a live row was marked.
    async fn delete(&self, id: Uuid) -> Result<bool, IdentityError>;
}

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn create(&self, schedule: &EventSchedule) -> Result<Event, IdentityError> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (branch_id, topic, start_time, end_time)
            VALUES ($1, $2, $3, $4)
            RETURNING id, branch_id, topic, start_time, end_time, created_at, updated_at
            "#,
        )
        .bind(schedule.branch_id)
        .bind(&schedule.topic)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to create event: {}", e)))
    }

    async fn update(
        &self,
        id: Uuid,
        schedule: &EventSchedule,
    ) -> Result<Option<Event>, IdentityError> {
        sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET branch_id = $2, topic = $3, start_time = $4, end_time = $5, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, branch_id, topic, start_time, end_time, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(schedule.branch_id)
        .bind(&schedule.topic)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to update event: {}", e)))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Event>, IdentityError> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT id, branch_id, topic, start_time, end_time, created_at, updated_at
            FROM events
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to fetch event: {}", e)))
    }

    async fn get_all(&self, filter: &ListFilter) -> Result<EventList, IdentityError> {
        let pattern = filter.search_pattern();

        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, branch_id, topic, start_time, end_time, created_at, updated_at
            FROM events
            WHERE deleted_at IS NULL
              AND ($1::text IS NULL OR topic ILIKE $1)
            ORDER BY start_time DESC NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(pattern.as_deref())
        .bind(filter.page_limit())
        .bind(filter.row_offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to list events: {}", e)))?;

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM events
            WHERE deleted_at IS NULL
              AND ($1::text IS NULL OR topic ILIKE $1)
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to count events: {}", e)))?;

        Ok(EventList { events, count })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, IdentityError> {
        let result = sqlx::query(
            "UPDATE events SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| IdentityError::Database(format!("Failed to delete event: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

pub mod mock {
    use super::*;
    use chrono::Utc;
    use tokio::sync::Mutex;

    /// In-memory event store. Tests may insert rows directly, including
    /// rows without a start time.
    #[derive(Default)]
    pub struct InMemoryEventRepository {
        rows: Mutex<Vec<(Event, bool)>>,
    }

    impl InMemoryEventRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn insert_raw(&self, event: Event) {
            self.rows.lock().await.push((event, false));
        }

        /// Live event by id; used by the registration mock to join.
        pub(crate) async fn live(&self, id: Uuid) -> Option<Event> {
            self.rows
                .lock()
                .await
                .iter()
                .find(|(event, deleted)| event.id == id && !deleted)
                .map(|(event, _)| event.clone())
        }
    }

    #[async_trait]
    impl EventRepository for InMemoryEventRepository {
        async fn create(&self, schedule: &EventSchedule) -> Result<Event, IdentityError> {
            let now = Utc::now();
            let event = Event {
                id: Uuid::new_v4(),
                branch_id: schedule.branch_id,
                topic: schedule.topic.clone(),
                start_time: Some(schedule.start_time),
                end_time: Some(schedule.end_time),
                created_at: now,
                updated_at: now,
            };
            self.rows.lock().await.push((event.clone(), false));
            Ok(event)
        }

        async fn update(
            &self,
            id: Uuid,
            schedule: &EventSchedule,
        ) -> Result<Option<Event>, IdentityError> {
            let mut rows = self.rows.lock().await;
            let Some((event, _)) = rows
                .iter_mut()
                .find(|(event, deleted)| event.id == id && !deleted)
            else {
                return Ok(None);
            };
            event.branch_id = schedule.branch_id;
            event.topic = schedule.topic.clone();
            event.start_time = Some(schedule.start_time);
            event.end_time = Some(schedule.end_time);
            event.updated_at = Utc::now();
            Ok(Some(event.clone()))
        }

        async fn get_by_id(&self, id: Uuid) -> Result<Option<Event>, IdentityError> {
            Ok(self.live(id).await)
        }

        async fn get_all(&self, filter: &ListFilter) -> Result<EventList, IdentityError> {
            let rows = self.rows.lock().await;
            let needle = filter
                .search
                .as_deref()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty());

            let matching: Vec<&Event> = rows
                .iter()
                .filter(|(_, deleted)| !deleted)
                .map(|(event, _)| event)
                .filter(|event| match &needle {
                    Some(needle) => event.topic.to_lowercase().contains(needle),
                    None => true,
                })
                .collect();

            let count = i64::try_from(matching.len()).unwrap_or(i64::MAX);
            let skip = usize::try_from(filter.row_offset()).unwrap_or(usize::MAX);
            let take = usize::try_from(filter.page_limit()).unwrap_or(0);
            let events = matching.into_iter().skip(skip).take(take).cloned().collect();

            Ok(EventList { events, count })
        }

        async fn delete(&self, id: Uuid) -> Result<bool, IdentityError> {
            let mut rows = self.rows.lock().await;
            match rows
                .iter_mut()
                .find(|(event, deleted)| event.id == id && !deleted)
            {
                Some((_, deleted)) => {
                    *deleted = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}
