//! E2E tests for email one-time-code registration.
//!
//! ## Test Categories
//!
//! - **Issue**: code generation and delivery
//! - **Confirm**: code check, account creation, token issue
//! - **Failure**: wrong codes, delivery outages, retries

use identity_service::models::ActorKind;
use identity_service::services::otp_service::otp_key;
use identity_test_utils::assertions::TokenAssertions;
use identity_test_utils::builders::ActorDraftBuilder;
use identity_test_utils::server_harness::{TestIdentityServer, TestServerOptions};
use identity_test_utils::test_ids::{TEST_EMAIL_ANN, TEST_EMAIL_BOB, TEST_PASSWORD};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn request_code(
    server: &TestIdentityServer,
    segment: &str,
    email: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.api(&format!("/api/v1/auth/{}/register", segment)))
        .json(&json!({ "email": email }))
        .send()
        .await?)
}

async fn confirm(
    server: &TestIdentityServer,
    segment: &str,
    email: &str,
    otp: &str,
    draft: Value,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.api(&format!("/api/v1/auth/{}/register/confirm", segment)))
        .json(&json!({ "email": email, "otp": otp, "actor": draft }))
        .send()
        .await?)
}

// ============================================================================
// Issue
// ============================================================================

#[tokio::test]
async fn test_register_sends_code_and_returns_202() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;

    // Act
    let response = request_code(&server, "students", TEST_EMAIL_ANN).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: Value = response.json().await?;
    assert_eq!(body["comment"], "Otp code sent to your email");

    let code = server.notifier().last_code_for(TEST_EMAIL_ANN).await;
    assert!(code.is_some_and(|c| c.len() == 6 && c.chars().all(|ch| ch.is_ascii_digit())));
    assert!(server
        .otp_store()
        .peek(&otp_key(ActorKind::Student, TEST_EMAIL_ANN))
        .await
        .is_some());
    Ok(())
}

#[tokio::test]
async fn test_register_malformed_email_returns_400() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = request_code(&server, "students", "not-an-email").await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.notifier().messages().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_register_delivery_failure_returns_502() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.notifier().set_failing(true);

    let response = request_code(&server, "students", TEST_EMAIL_ANN).await?;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "DISPATCH_FAILED");
    Ok(())
}

#[tokio::test]
async fn test_register_store_outage_returns_500() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.otp_store().set_unavailable(true);

    let response = request_code(&server, "students", TEST_EMAIL_ANN).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(server.notifier().messages().await.is_empty());
    Ok(())
}

// ============================================================================
// Confirm
// ============================================================================

#[tokio::test]
async fn test_register_confirm_creates_account_and_logs_in() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;

    // Act
    let body = server
        .register(
            ActorKind::Student,
            TEST_EMAIL_ANN,
            ActorDraftBuilder::student("Ann").build(),
        )
        .await?;

    // Assert
    assert_eq!(body["user_login"], "S00001");
    assert_eq!(body["token_type"], "Bearer");
    let access = body["access_token"].as_str().unwrap_or_default().to_string();
    access
        .assert_valid_jwt()
        .assert_role("student")
        .assert_for_subject(body["subject_id"].as_str().unwrap_or_default());

    // The stored record carries the verified address
    let actor: Value = server
        .client()
        .get(server.api(&format!(
            "/api/v1/actors/students/{}",
            body["subject_id"].as_str().unwrap_or_default()
        )))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(actor["email"], TEST_EMAIL_ANN);

    // The new account can log in with the draft password
    let response = server
        .client()
        .post(server.api("/api/v1/auth/students/login"))
        .json(&json!({ "user_login": "S00001", "password": TEST_PASSWORD }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_register_confirm_normalizes_contact() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    request_code(&server, "teachers", "  Ann@Example.COM ").await?;
    let code = server
        .notifier()
        .last_code_for(TEST_EMAIL_ANN)
        .await
        .unwrap_or_default();
    let response = confirm(
        &server,
        "teachers",
        TEST_EMAIL_ANN,
        &code,
        ActorDraftBuilder::teacher("Ann").build(),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_register_confirm_wrong_code_returns_401() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    request_code(&server, "students", TEST_EMAIL_ANN).await?;
    let code = server
        .notifier()
        .last_code_for(TEST_EMAIL_ANN)
        .await
        .unwrap_or_default();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    // Act
    let response = confirm(
        &server,
        "students",
        TEST_EMAIL_ANN,
        wrong,
        ActorDraftBuilder::student("Ann").build(),
    )
    .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INCORRECT_OTP");
    assert_eq!(server.actors().live_count(ActorKind::Student).await, 0);
    Ok(())
}

/// A code is tied to the kind it was requested for.
#[tokio::test]
async fn test_register_confirm_other_kind_returns_401() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    request_code(&server, "students", TEST_EMAIL_ANN).await?;
    let code = server
        .notifier()
        .last_code_for(TEST_EMAIL_ANN)
        .await
        .unwrap_or_default();

    let response = confirm(
        &server,
        "teachers",
        TEST_EMAIL_ANN,
        &code,
        ActorDraftBuilder::teacher("Ann").build(),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.actors().live_count(ActorKind::Teacher).await, 0);
    Ok(())
}

/// A code for one address does not confirm another.
#[tokio::test]
async fn test_register_confirm_other_address_returns_401() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    request_code(&server, "students", TEST_EMAIL_ANN).await?;
    let code = server
        .notifier()
        .last_code_for(TEST_EMAIL_ANN)
        .await
        .unwrap_or_default();

    let response = confirm(
        &server,
        "students",
        TEST_EMAIL_BOB,
        &code,
        ActorDraftBuilder::student("Bob").build(),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

/// An invalid draft is rejected before the code is spent.
#[tokio::test]
async fn test_register_confirm_invalid_draft_keeps_code() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    request_code(&server, "students", TEST_EMAIL_ANN).await?;
    let code = server
        .notifier()
        .last_code_for(TEST_EMAIL_ANN)
        .await
        .unwrap_or_default();

    // Act: draft with a staff-only field
    let response = confirm(
        &server,
        "students",
        TEST_EMAIL_ANN,
        &code,
        ActorDraftBuilder::student("Ann").with_field("salary", 1.0).build(),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Assert: the same code still works with a valid draft
    let response = confirm(
        &server,
        "students",
        TEST_EMAIL_ANN,
        &code,
        ActorDraftBuilder::student("Ann").build(),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

/// A confirmed code cannot create a second account.
#[tokio::test]
async fn test_register_confirm_replay_does_not_duplicate() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    request_code(&server, "students", TEST_EMAIL_ANN).await?;
    let code = server
        .notifier()
        .last_code_for(TEST_EMAIL_ANN)
        .await
        .unwrap_or_default();
    let first = confirm(
        &server,
        "students",
        TEST_EMAIL_ANN,
        &code,
        ActorDraftBuilder::student("Ann").build(),
    )
    .await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    // Act
    let replay = confirm(
        &server,
        "students",
        TEST_EMAIL_ANN,
        &code,
        ActorDraftBuilder::student("Ann").build(),
    )
    .await?;

    // Assert
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.actors().live_count(ActorKind::Student).await, 1);
    Ok(())
}

/// A code that stays valid after confirm cannot revive a deleted account.
#[tokio::test]
async fn test_register_confirm_replay_after_delete_returns_401() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn_with(TestServerOptions {
        invalidate_otp_on_confirm: false,
        ..TestServerOptions::default()
    })
    .await?;
    request_code(&server, "students", TEST_EMAIL_ANN).await?;
    let code = server
        .notifier()
        .last_code_for(TEST_EMAIL_ANN)
        .await
        .unwrap_or_default();
    let first: Value = confirm(
        &server,
        "students",
        TEST_EMAIL_ANN,
        &code,
        ActorDraftBuilder::student("Ann").build(),
    )
    .await?
    .json()
    .await?;
    let response = server
        .client()
        .delete(server.api(&format!(
            "/api/v1/actors/students/{}",
            first["subject_id"].as_str().unwrap_or_default()
        )))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Act
    let replay = confirm(
        &server,
        "students",
        TEST_EMAIL_ANN,
        &code,
        ActorDraftBuilder::student("Ann").build(),
    )
    .await?;

    // Assert
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    let body: Value = replay.json().await?;
    assert!(body.get("access_token").is_none());
    assert_eq!(server.actors().live_count(ActorKind::Student).await, 0);
    Ok(())
}
