//! Request body builders
//!
//! Bodies are built as `serde_json::Value` so tests can also send shapes
//! the service should reject.

use crate::test_ids::{TEST_BRANCH_CHILONZOR, TEST_GROUP_IELTS_A, TEST_PASSWORD};
use chrono::{DateTime, Duration, Utc};
use identity_service::models::ActorKind;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Builder for actor create bodies and registration drafts.
///
/// # Example
/// ```rust,ignore
/// let body = ActorDraftBuilder::teacher("Dilnoza")
///     .with_field("ielts_score", 8.5)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ActorDraftBuilder {
    fields: Map<String, Value>,
}

impl ActorDraftBuilder {
    /// Draft with only a name and the default test password.
    pub fn new(fullname: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("fullname".to_string(), json!(fullname));
        fields.insert("password".to_string(), json!(TEST_PASSWORD));
        Self { fields }
    }

    /// Draft with the role fields typical for the kind filled in.
    pub fn for_kind(kind: ActorKind, fullname: &str) -> Self {
        let builder = Self::new(fullname);
        match kind {
            ActorKind::Student => builder
                .with_field("group_id", TEST_GROUP_IELTS_A.to_string())
                .with_field("paid_sum", 1_200_000.0),
            ActorKind::Teacher | ActorKind::SupportTeacher => builder
                .with_field("branch_id", TEST_BRANCH_CHILONZOR.to_string())
                .with_field("ielts_score", 8.0),
            ActorKind::Manager | ActorKind::Administrator => builder
                .with_field("branch_id", TEST_BRANCH_CHILONZOR.to_string())
                .with_field("salary", 9_000_000.0),
            ActorKind::Superadmin => builder,
        }
    }

    pub fn student(fullname: &str) -> Self {
        Self::for_kind(ActorKind::Student, fullname)
    }

    pub fn teacher(fullname: &str) -> Self {
        Self::for_kind(ActorKind::Teacher, fullname)
    }

    pub fn with_password(self, password: &str) -> Self {
        self.with_field("password", password)
    }

    pub fn with_email(self, email: &str) -> Self {
        self.with_field("email", email)
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn without_field(mut self, name: &str) -> Self {
        self.fields.remove(name);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Builder for event bodies with times relative to now.
///
/// # Example
/// ```rust,ignore
/// let body = EventBuilder::new()
///     .starting_in(Duration::hours(12))
///     .in_branch(TEST_BRANCH_YUNUSOBOD)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct EventBuilder {
    branch_id: Uuid,
    topic: String,
    start_time: DateTime<Utc>,
    length: Duration,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuilder {
    /// A two-hour event one day from now.
    pub fn new() -> Self {
        Self {
            branch_id: TEST_BRANCH_CHILONZOR,
            topic: "Speaking club".to_string(),
            start_time: Utc::now() + Duration::days(1),
            length: Duration::hours(2),
        }
    }

    pub fn starting_in(mut self, lead: Duration) -> Self {
        self.start_time = Utc::now() + lead;
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = start;
        self
    }

    pub fn in_branch(mut self, branch_id: Uuid) -> Self {
        self.branch_id = branch_id;
        self
    }

    pub fn with_topic(mut self, topic: &str) -> Self {
        self.topic = topic.to_string();
        self
    }

    pub fn build(self) -> Value {
        json!({
            "branch_id": self.branch_id,
            "topic": self.topic,
            "start_time": self.start_time.to_rfc3339(),
            "end_time": (self.start_time + self.length).to_rfc3339(),
        })
    }
}
