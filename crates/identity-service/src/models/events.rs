use crate::errors::IdentityError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Event as stored. Start and end are nullable in the table; an event
/// without a start time cannot be enrolled into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub topic: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event create/update body. Times are RFC 3339 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInput {
    pub branch_id: Uuid,
    pub topic: String,
    pub start_time: String,
    pub end_time: String,
}

/// Validated event fields ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSchedule {
    pub branch_id: Uuid,
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl EventInput {
    pub fn parse(&self) -> Result<EventSchedule, IdentityError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(IdentityError::Validation(
                "topic must not be empty".to_string(),
            ));
        }

        let start_time = parse_time("start_time", &self.start_time)?;
        let end_time = parse_time("end_time", &self.end_time)?;
        if end_time <= start_time {
            return Err(IdentityError::TimeParse(
                "end_time must be after start_time".to_string(),
            ));
        }

        Ok(EventSchedule {
            branch_id: self.branch_id,
            topic: topic.to_string(),
            start_time,
            end_time,
        })
    }
}

fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>, IdentityError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| IdentityError::TimeParse(format!("{} is not RFC 3339: {}", field, e)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventList {
    pub events: Vec<Event>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEventRegistration {
    pub event_id: Uuid,
    pub student_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EventRegistration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub student_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An event a student is registered for, as listed on the student's page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StudentEvent {
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub topic: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub branch_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EligibilityQuery {
    pub student_id: Uuid,
}
