mod events;

pub use events::{
    EligibilityQuery, Event, EventInput, EventList, EventRegistration, EventSchedule,
    NewEventRegistration, StudentEvent,
};

use crate::errors::IdentityError;
use chrono::{DateTime, NaiveDate, Utc};
use common::secret::SecretString;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Minimum password length accepted on create and change-password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length. bcrypt ignores input past 72 bytes.
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// The six kinds of people the system manages.
///
/// Every kind shares one identity lifecycle; the kind supplies the role tag
/// put into tokens, the login handle prefix, and which role fields apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "actor_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Student,
    Teacher,
    SupportTeacher,
    Manager,
    Administrator,
    Superadmin,
}

impl ActorKind {
    pub const ALL: [ActorKind; 6] = [
        ActorKind::Student,
        ActorKind::Teacher,
        ActorKind::SupportTeacher,
        ActorKind::Manager,
        ActorKind::Administrator,
        ActorKind::Superadmin,
    ];

    /// Role claim written into tokens.
    pub fn role_tag(&self) -> &'static str {
        match self {
            ActorKind::Student => "student",
            ActorKind::Teacher => "teacher",
            ActorKind::SupportTeacher => "support_teacher",
            ActorKind::Manager => "manager",
            ActorKind::Administrator => "administrator",
            ActorKind::Superadmin => "superadmin",
        }
    }

    pub fn login_prefix(&self) -> &'static str {
        match self {
            ActorKind::Student => "S",
            ActorKind::Teacher => "T",
            ActorKind::SupportTeacher => "ST",
            ActorKind::Manager => "M",
            ActorKind::Administrator => "A",
            ActorKind::Superadmin => "SA",
        }
    }

    /// URL segment used by the HTTP routes.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ActorKind::Student => "students",
            ActorKind::Teacher => "teachers",
            ActorKind::SupportTeacher => "support-teachers",
            ActorKind::Manager => "managers",
            ActorKind::Administrator => "administrators",
            ActorKind::Superadmin => "superadmins",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.path_segment() == segment)
    }

    /// Human-readable noun for messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ActorKind::Student => "student",
            ActorKind::Teacher => "teacher",
            ActorKind::SupportTeacher => "support teacher",
            ActorKind::Manager => "manager",
            ActorKind::Administrator => "administrator",
            ActorKind::Superadmin => "superadmin",
        }
    }

    /// Database sequence that numbers this kind's login handles.
    pub fn login_sequence(&self) -> &'static str {
        match self {
            ActorKind::Student => "student_login_seq",
            ActorKind::Teacher => "teacher_login_seq",
            ActorKind::SupportTeacher => "support_teacher_login_seq",
            ActorKind::Manager => "manager_login_seq",
            ActorKind::Administrator => "administrator_login_seq",
            ActorKind::Superadmin => "superadmin_login_seq",
        }
    }

    /// Login handle for the n-th actor of this kind, e.g. `S00001`.
    pub fn format_login(&self, sequence: i64) -> String {
        format!("{}{:05}", self.login_prefix(), sequence)
    }

    pub fn allows(&self, field: RoleField) -> bool {
        use RoleField::*;
        match self {
            ActorKind::Student => matches!(field, GroupId | PaidSum | StartedAt | FinishedAt),
            ActorKind::Teacher | ActorKind::SupportTeacher => matches!(
                field,
                BranchId | Salary | IeltsScore | IeltsAttemptsCount | StartedAt | FinishedAt
            ),
            ActorKind::Manager | ActorKind::Administrator => {
                matches!(field, BranchId | Salary | StartedAt | FinishedAt)
            }
            ActorKind::Superadmin => false,
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role_tag())
    }
}

impl FromStr for ActorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.role_tag() == s)
            .ok_or_else(|| format!("Invalid actor kind: {}", s))
    }
}

/// Fields that only some kinds carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleField {
    GroupId,
    PaidSum,
    BranchId,
    Salary,
    IeltsScore,
    IeltsAttemptsCount,
    StartedAt,
    FinishedAt,
}

impl RoleField {
    pub fn name(&self) -> &'static str {
        match self {
            RoleField::GroupId => "group_id",
            RoleField::PaidSum => "paid_sum",
            RoleField::BranchId => "branch_id",
            RoleField::Salary => "salary",
            RoleField::IeltsScore => "ielts_score",
            RoleField::IeltsAttemptsCount => "ielts_attempts_count",
            RoleField::StartedAt => "started_at",
            RoleField::FinishedAt => "finished_at",
        }
    }
}

/// Identity and role fields shared by create, update and registration drafts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub fullname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub branch_id: Option<Uuid>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub salary: Option<f64>,
    #[serde(default)]
    pub ielts_score: Option<f64>,
    #[serde(default)]
    pub ielts_attempts_count: Option<i32>,
    #[serde(default)]
    pub paid_sum: Option<f64>,
    /// Study start for students, employment start for staff.
    #[serde(default)]
    pub started_at: Option<NaiveDate>,
    #[serde(default)]
    pub finished_at: Option<NaiveDate>,
}

impl ActorProfile {
    fn present_role_fields(&self) -> Vec<RoleField> {
        let mut present = Vec::new();
        if self.group_id.is_some() {
            present.push(RoleField::GroupId);
        }
        if self.paid_sum.is_some() {
            present.push(RoleField::PaidSum);
        }
        if self.branch_id.is_some() {
            present.push(RoleField::BranchId);
        }
        if self.salary.is_some() {
            present.push(RoleField::Salary);
        }
        if self.ielts_score.is_some() {
            present.push(RoleField::IeltsScore);
        }
        if self.ielts_attempts_count.is_some() {
            present.push(RoleField::IeltsAttemptsCount);
        }
        if self.started_at.is_some() {
            present.push(RoleField::StartedAt);
        }
        if self.finished_at.is_some() {
            present.push(RoleField::FinishedAt);
        }
        present
    }

    /// Check the profile against the kind's field set and value ranges.
    pub fn validate_for(&self, kind: ActorKind) -> Result<(), IdentityError> {
        if self.fullname.trim().is_empty() {
            return Err(IdentityError::Validation(
                "fullname must not be empty".to_string(),
            ));
        }

        if let Some(field) = self
            .present_role_fields()
            .into_iter()
            .find(|field| !kind.allows(*field))
        {
            return Err(IdentityError::Validation(format!(
                "{} does not apply to a {}",
                field.name(),
                kind.display_name()
            )));
        }

        if let Some(email) = self.email.as_deref() {
            if !is_valid_email(email) {
                return Err(IdentityError::Validation("email is malformed".to_string()));
            }
        }

        if self.salary.is_some_and(|v| !v.is_finite() || v < 0.0) {
            return Err(IdentityError::Validation(
                "salary must not be negative".to_string(),
            ));
        }
        if self.paid_sum.is_some_and(|v| !v.is_finite() || v < 0.0) {
            return Err(IdentityError::Validation(
                "paid_sum must not be negative".to_string(),
            ));
        }
        if self
            .ielts_score
            .is_some_and(|v| !(0.0..=9.0).contains(&v))
        {
            return Err(IdentityError::Validation(
                "ielts_score must be between 0 and 9".to_string(),
            ));
        }
        if self.ielts_attempts_count.is_some_and(|v| v < 0) {
            return Err(IdentityError::Validation(
                "ielts_attempts_count must not be negative".to_string(),
            ));
        }
        if let (Some(start), Some(finish)) = (self.started_at, self.finished_at) {
            if finish < start {
                return Err(IdentityError::Validation(
                    "finished_at must not be before started_at".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Draft for a new actor: profile plus the initial password.
#[derive(Debug, Clone, Deserialize)]
pub struct NewActor {
    #[serde(flatten)]
    pub profile: ActorProfile,
    pub password: SecretString,
}

/// Stored actor, without credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Actor {
    pub id: Uuid,
    pub kind: ActorKind,
    pub user_login: String,
    pub fullname: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub gender: Option<String>,
    pub branch_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub salary: Option<f64>,
    pub ielts_score: Option<f64>,
    pub ielts_attempts_count: Option<i32>,
    pub paid_sum: Option<f64>,
    pub started_at: Option<NaiveDate>,
    pub finished_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of actors plus the total number of matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorList {
    pub actors: Vec<Actor>,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckResponse {
    pub check: bool,
}

/// Login material for one actor.
///
/// Custom `Debug` keeps the digest out of logs.
#[derive(Clone, FromRow)]
pub struct Credential {
    pub subject_id: Uuid,
    pub login_handle: String,
    pub password_hash: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject_id", &self.subject_id)
            .field("login_handle", &"[REDACTED]")
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Access/refresh pair returned by login and registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_login: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterConfirmRequest {
    pub email: String,
    pub otp: SecretString,
    pub actor: NewActor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterConfirmResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub subject_id: Uuid,
    pub user_login: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub user_login: String,
    pub old_password: SecretString,
    pub new_password: SecretString,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordResponse {
    pub comment: String,
}

/// Validate a password against the length policy.
pub fn validate_password(password: &str) -> Result<(), IdentityError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(IdentityError::Validation(format!(
            "password must be at most {} bytes",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Basic shape check for contact addresses: one `@`, a dotted domain,
/// no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
