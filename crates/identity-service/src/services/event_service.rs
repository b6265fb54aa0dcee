use crate::errors::IdentityError;
use crate::models::{Event, EventInput, EventList};
use crate::repositories::EventRepository;
use common::types::ListFilter;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Event records. Enrollment rules live in `EnrollmentService`.
pub struct EventService {
    events: Arc<dyn EventRepository>,
}

fn not_found() -> IdentityError {
    IdentityError::NotFound("event".to_string())
}

impl EventService {
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        Self { events }
    }

    #[instrument(skip_all)]
    pub async fn create(&self, input: EventInput) -> Result<Event, IdentityError> {
        let schedule = input.parse()?;
        let event = self.events.create(&schedule).await?;
        info!(target: "identity.events", event_id = %event.id, "Event created");
        Ok(event)
    }

    #[instrument(skip_all, fields(event_id = %id))]
    pub async fn update(&self, id: Uuid, input: EventInput) -> Result<Event, IdentityError> {
        let schedule = input.parse()?;
        self.events
            .update(id, &schedule)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Event, IdentityError> {
        self.events.get_by_id(id).await?.ok_or_else(not_found)
    }

    pub async fn get_list(&self, filter: &ListFilter) -> Result<EventList, IdentityError> {
        self.events.get_all(filter).await
    }

    #[instrument(skip_all, fields(event_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), IdentityError> {
        if self.events.delete(id).await? {
            Ok(())
        } else {
            Err(not_found())
        }
    }
}
