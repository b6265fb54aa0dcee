//! E2E tests for events and event registration.
//!
//! With the default policy (5h buffer, 3h minimum lead) an event must start
//! more than 8 hours from now to accept registrations.

use chrono::{Duration, Utc};
use identity_service::models::{ActorKind, Event};
use identity_test_utils::builders::{ActorDraftBuilder, EventBuilder};
use identity_test_utils::server_harness::{TestIdentityServer, TestServerOptions};
use identity_test_utils::test_ids::{TEST_BRANCH_CHILONZOR, TEST_BRANCH_YUNUSOBOD, TEST_MISSING_ID};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_event(server: &TestIdentityServer, body: Value) -> Result<String, anyhow::Error> {
    let response = server
        .client()
        .post(server.api("/api/v1/events"))
        .json(&body)
        .send()
        .await?;
    anyhow::ensure!(
        response.status() == StatusCode::CREATED,
        "create event returned {}",
        response.status()
    );
    let event: Value = response.json().await?;
    Ok(event["id"].as_str().unwrap_or_default().to_string())
}

async fn create_student(server: &TestIdentityServer) -> Result<String, anyhow::Error> {
    let student = server
        .create_actor(ActorKind::Student, &ActorDraftBuilder::student("Ann").build())
        .await?;
    Ok(student["id"].as_str().unwrap_or_default().to_string())
}

async fn enroll(
    server: &TestIdentityServer,
    event_id: &str,
    student_id: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.api("/api/v1/event-registrations"))
        .json(&json!({ "event_id": event_id, "student_id": student_id }))
        .send()
        .await?)
}

async fn error_code(response: reqwest::Response) -> Result<String, anyhow::Error> {
    let body: Value = response.json().await?;
    Ok(body["error"]["code"].as_str().unwrap_or_default().to_string())
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_event_crud_lifecycle() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let id = create_event(&server, EventBuilder::new().build()).await?;
    let url = server.api(&format!("/api/v1/events/{}", id));

    let response = server
        .client()
        .put(&url)
        .json(&EventBuilder::new().with_topic("Mock exam").build())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let event: Value = response.json().await?;
    assert_eq!(event["topic"], "Mock exam");

    let list: Value = server
        .client()
        .get(server.api("/api/v1/events?search=mock"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(list["count"], 1);

    let response = server.client().delete(&url).send().await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = server.client().get(&url).send().await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_event_with_malformed_time_returns_400() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server
        .client()
        .post(server.api("/api/v1/events"))
        .json(&json!({
            "branch_id": TEST_BRANCH_CHILONZOR,
            "topic": "Speaking club",
            "start_time": "tomorrow at ten",
            "end_time": "tomorrow at noon"
        }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await?, "INVALID_TIME");
    Ok(())
}

// ============================================================================
// Enrollment
// ============================================================================

#[tokio::test]
async fn test_enroll_happy_path_lists_event_for_student() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    let event_id = create_event(
        &server,
        EventBuilder::new().starting_in(Duration::hours(12)).build(),
    )
    .await?;
    let student_id = create_student(&server).await?;

    // Act
    let response = enroll(&server, &event_id, &student_id).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);
    let registration: Value = response.json().await?;
    assert_eq!(registration["event_id"], event_id.as_str());

    let events: Value = server
        .client()
        .get(server.api(&format!("/api/v1/students/{}/events", student_id)))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(events.as_array().map(Vec::len), Some(1));
    assert_eq!(events[0]["topic"], "Speaking club");
    Ok(())
}

#[tokio::test]
async fn test_enroll_inside_lead_window_returns_409() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let event_id = create_event(
        &server,
        EventBuilder::new().starting_in(Duration::hours(7)).build(),
    )
    .await?;
    let student_id = create_student(&server).await?;

    let response = enroll(&server, &event_id, &student_id).await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(response).await?, "TOO_LATE_TO_REGISTER");
    assert_eq!(server.registrations().live_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_enroll_twice_returns_409() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let event_id = create_event(&server, EventBuilder::new().build()).await?;
    let student_id = create_student(&server).await?;
    enroll(&server, &event_id, &student_id).await?;

    let response = enroll(&server, &event_id, &student_id).await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(response).await?, "ALREADY_REGISTERED");
    assert_eq!(server.registrations().live_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_enroll_again_after_cancel_succeeds() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let event_id = create_event(&server, EventBuilder::new().build()).await?;
    let student_id = create_student(&server).await?;
    let first: Value = enroll(&server, &event_id, &student_id).await?.json().await?;

    let response = server
        .client()
        .delete(server.api(&format!(
            "/api/v1/event-registrations/{}",
            first["id"].as_str().unwrap_or_default()
        )))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = enroll(&server, &event_id, &student_id).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_enroll_unknown_event_or_student_returns_404() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let event_id = create_event(&server, EventBuilder::new().build()).await?;
    let student_id = create_student(&server).await?;

    let missing_event = enroll(&server, &TEST_MISSING_ID.to_string(), &student_id).await?;
    assert_eq!(missing_event.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(missing_event).await?, "EVENT_NOT_FOUND");

    let missing_student = enroll(&server, &event_id, &TEST_MISSING_ID.to_string()).await?;
    assert_eq!(missing_student.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(missing_student).await?, "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_enroll_event_without_start_returns_400() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let event_id = Uuid::new_v4();
    server
        .insert_event(Event {
            id: event_id,
            branch_id: TEST_BRANCH_CHILONZOR,
            topic: "Unscheduled".to_string(),
            start_time: None,
            end_time: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await;
    let student_id = create_student(&server).await?;

    let response = enroll(&server, &event_id.to_string(), &student_id).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await?, "INVALID_TIME");
    Ok(())
}

// ============================================================================
// Branch conflicts
// ============================================================================

/// Two events on the same UTC day in different branches.
async fn same_day_events(server: &TestIdentityServer) -> Result<(String, String), anyhow::Error> {
    let day = Utc::now().date_naive() + Duration::days(2);
    let morning = day
        .and_hms_opt(9, 0, 0)
        .map(|t| t.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid time"))?;
    let first = create_event(
        server,
        EventBuilder::new()
            .starting_at(morning)
            .in_branch(TEST_BRANCH_CHILONZOR)
            .build(),
    )
    .await?;
    let second = create_event(
        server,
        EventBuilder::new()
            .starting_at(morning + Duration::hours(6))
            .in_branch(TEST_BRANCH_YUNUSOBOD)
            .build(),
    )
    .await?;
    Ok((first, second))
}

#[tokio::test]
async fn test_branch_conflict_is_advisory_by_default() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    let (first, second) = same_day_events(&server).await?;
    let student_id = create_student(&server).await?;
    enroll(&server, &first, &student_id).await?;

    // Act: dry run
    let eligibility: Value = server
        .client()
        .get(server.api(&format!(
            "/api/v1/events/{}/eligibility?student_id={}",
            second, student_id
        )))
        .send()
        .await?
        .json()
        .await?;

    // Assert
    assert_eq!(eligibility["eligible"], true);
    assert_eq!(eligibility["branch_conflict"], true);
    let response = enroll(&server, &second, &student_id).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_branch_conflict_enforced_returns_409() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn_with(TestServerOptions {
        enforce_branch_conflict: true,
        ..TestServerOptions::default()
    })
    .await?;
    let (first, second) = same_day_events(&server).await?;
    let student_id = create_student(&server).await?;
    enroll(&server, &first, &student_id).await?;

    // Act
    let response = enroll(&server, &second, &student_id).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(response).await?, "BRANCH_CONFLICT");
    Ok(())
}

#[tokio::test]
async fn test_eligibility_dry_run_does_not_register() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let event_id = create_event(
        &server,
        EventBuilder::new().starting_in(Duration::hours(7)).build(),
    )
    .await?;
    let student_id = create_student(&server).await?;

    let eligibility: Value = server
        .client()
        .get(server.api(&format!(
            "/api/v1/events/{}/eligibility?student_id={}",
            event_id, student_id
        )))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(eligibility["eligible"], false);
    assert_eq!(eligibility["reason"], "too_late");
    assert_eq!(server.registrations().live_count().await, 0);
    Ok(())
}
