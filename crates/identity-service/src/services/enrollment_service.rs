//! Event enrollment.
//!
//! # Eligibility
//!
//! Checks run in this order and the first failing one decides:
//!
//! 1. The event exists (`EventNotFound`).
//! 2. The event has a start time (`TimeParse`).
//! 3. Lead time: with `h` hours until start, `h - buffer <= min_lead`
//!    denies as too late. Defaults are 5 and 3, so registration closes
//!    8 hours before start.
//! 4. The student is not already registered for the event.
//! 5. The student holds no registration on the same UTC day at another
//!    branch. Advisory unless `enforce_branch_conflict` is set.

use crate::errors::IdentityError;
use crate::models::{ActorKind, EventRegistration, NewEventRegistration, StudentEvent};
use crate::observability::metrics::record_enrollment_decision;
use crate::repositories::{ActorRepository, EventRegistrationRepository, EventRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct EnrollmentPolicy {
    pub buffer_hours: f64,
    pub min_lead_hours: f64,
    pub enforce_branch_conflict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    TooLateToRegister,
    AlreadyRegistered,
    BranchConflict,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::TooLateToRegister => "too_late",
            DenyReason::AlreadyRegistered => "already_registered",
            DenyReason::BranchConflict => "branch_conflict",
        }
    }
}

impl From<DenyReason> for IdentityError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::TooLateToRegister => IdentityError::TooLateToRegister,
            DenyReason::AlreadyRegistered => IdentityError::AlreadyRegistered,
            DenyReason::BranchConflict => IdentityError::BranchConflict,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Registration may proceed. `branch_conflict` reports an advisory
    /// same-day registration at another branch.
    Allow { branch_conflict: bool },
    Deny(DenyReason),
}

impl Eligibility {
    fn decision_label(&self) -> &'static str {
        match self {
            Eligibility::Allow {
                branch_conflict: false,
            } => "allow",
            Eligibility::Allow {
                branch_conflict: true,
            } => "allow_with_conflict",
            Eligibility::Deny(reason) => reason.as_str(),
        }
    }
}

pub struct EnrollmentService {
    events: Arc<dyn EventRepository>,
    registrations: Arc<dyn EventRegistrationRepository>,
    actors: Arc<dyn ActorRepository>,
    policy: EnrollmentPolicy,
}

impl EnrollmentService {
    pub fn new(
        events: Arc<dyn EventRepository>,
        registrations: Arc<dyn EventRegistrationRepository>,
        actors: Arc<dyn ActorRepository>,
        policy: EnrollmentPolicy,
    ) -> Self {
        Self {
            events,
            registrations,
            actors,
            policy,
        }
    }

    async fn ensure_student(&self, student_id: Uuid) -> Result<(), IdentityError> {
        if self.actors.exists(ActorKind::Student, student_id).await? {
            Ok(())
        } else {
            Err(IdentityError::NotFound("student".to_string()))
        }
    }

    /// Decide whether `student_id` may register for `event_id` at `now`.
    #[instrument(skip_all, fields(event_id = %event_id, student_id = %student_id))]
    pub async fn check_eligibility(
        &self,
        event_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Eligibility, IdentityError> {
        self.ensure_student(student_id).await?;
        let eligibility = self.evaluate(event_id, student_id, now).await?;
        record_enrollment_decision(eligibility.decision_label());
        Ok(eligibility)
    }

    async fn evaluate(
        &self,
        event_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Eligibility, IdentityError> {
        let event = self
            .events
            .get_by_id(event_id)
            .await?
            .ok_or(IdentityError::EventNotFound)?;

        let start_time = event.start_time.ok_or_else(|| {
            IdentityError::TimeParse("event has no start time".to_string())
        })?;

        let hours_until_start = (start_time - now).num_seconds() as f64 / 3600.0;
        if hours_until_start - self.policy.buffer_hours <= self.policy.min_lead_hours {
            return Ok(Eligibility::Deny(DenyReason::TooLateToRegister));
        }

        if self.registrations.exists_for(event_id, student_id).await? {
            return Ok(Eligibility::Deny(DenyReason::AlreadyRegistered));
        }

        let conflicts = self
            .registrations
            .count_other_branch_same_day(student_id, event.branch_id, start_time.date_naive())
            .await?;
        let branch_conflict = conflicts > 0;
        if branch_conflict {
            if self.policy.enforce_branch_conflict {
                return Ok(Eligibility::Deny(DenyReason::BranchConflict));
            }
            warn!(
                target: "identity.enrollment",
                conflicts,
                "Student already registered at another branch on this day"
            );
        }

        Ok(Eligibility::Allow { branch_conflict })
    }

    /// Check eligibility and, when allowed, create the registration.
    #[instrument(skip_all, fields(event_id = %request.event_id, student_id = %request.student_id))]
    pub async fn register_for_event(
        &self,
        request: NewEventRegistration,
        now: DateTime<Utc>,
    ) -> Result<EventRegistration, IdentityError> {
        match self
            .check_eligibility(request.event_id, request.student_id, now)
            .await?
        {
            Eligibility::Deny(reason) => Err(reason.into()),
            Eligibility::Allow { .. } => {
                let registration = self
                    .registrations
                    .create(request.event_id, request.student_id)
                    .await?;
                info!(
                    target: "identity.enrollment",
                    registration_id = %registration.id,
                    "Student registered for event"
                );
                Ok(registration)
            }
        }
    }

    pub async fn get_registration(&self, id: Uuid) -> Result<EventRegistration, IdentityError> {
        self.registrations
            .get_by_id(id)
            .await?
            .ok_or_else(|| IdentityError::NotFound("event registration".to_string()))
    }

    #[instrument(skip_all, fields(registration_id = %id))]
    pub async fn delete_registration(&self, id: Uuid) -> Result<(), IdentityError> {
        if self.registrations.delete(id).await? {
            Ok(())
        } else {
            Err(IdentityError::NotFound(
                "event registration".to_string(),
            ))
        }
    }

    pub async fn student_events(&self, student_id: Uuid) -> Result<Vec<StudentEvent>, IdentityError> {
        self.ensure_student(student_id).await?;
        self.registrations.list_for_student(student_id).await
    }
}
