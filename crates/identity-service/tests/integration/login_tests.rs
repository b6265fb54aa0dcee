//! E2E tests for password login.
//!
//! Wrong password, unknown handle and wrong kind all answer the same way.

use identity_service::models::ActorKind;
use identity_test_utils::assertions::TokenAssertions;
use identity_test_utils::builders::ActorDraftBuilder;
use identity_test_utils::server_harness::TestIdentityServer;
use identity_test_utils::test_ids::TEST_PASSWORD;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn login(
    server: &TestIdentityServer,
    segment: &str,
    user_login: &str,
    password: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.api(&format!("/api/v1/auth/{}/login", segment)))
        .json(&json!({ "user_login": user_login, "password": password }))
        .send()
        .await?)
}

#[tokio::test]
async fn test_login_happy_path_returns_token_pair() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    let created = server
        .create_actor(ActorKind::Student, &ActorDraftBuilder::student("Ann").build())
        .await?;

    // Act
    let response = login(&server, "students", "S00001", TEST_PASSWORD).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);

    let subject = created["id"].as_str().unwrap_or_default();
    let access = body["access_token"].as_str().unwrap_or_default().to_string();
    access
        .assert_valid_jwt()
        .assert_role("student")
        .assert_token_use("access")
        .assert_for_subject(subject)
        .assert_expires_in(3600);

    let refresh = body["refresh_token"].as_str().unwrap_or_default().to_string();
    refresh
        .assert_valid_jwt()
        .assert_token_use("refresh")
        .assert_for_subject(subject);
    Ok(())
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    server
        .create_actor(ActorKind::Teacher, &ActorDraftBuilder::teacher("Dilnoza").build())
        .await?;

    // Act
    let wrong_password = login(&server, "teachers", "T00001", "not-the-password").await?;
    let unknown_handle = login(&server, "teachers", "T00099", TEST_PASSWORD).await?;
    let wrong_kind = login(&server, "managers", "T00001", TEST_PASSWORD).await?;

    // Assert
    let mut bodies = Vec::new();
    for response in [wrong_password, unknown_handle, wrong_kind] {
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await?;
        bodies.push(body);
    }
    assert!(bodies.iter().all(|b| b == &bodies[0]), "Bodies differ: {:?}", bodies);
    assert_eq!(bodies[0]["error"]["code"], "INVALID_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn test_login_after_delete_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let created = server
        .create_actor(ActorKind::Student, &ActorDraftBuilder::student("Ann").build())
        .await?;
    server
        .client()
        .delete(server.api(&format!(
            "/api/v1/actors/students/{}",
            created["id"].as_str().unwrap_or_default()
        )))
        .send()
        .await?;

    let response = login(&server, "students", "S00001", TEST_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_login_missing_field_returns_400() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server
        .client()
        .post(server.api("/api/v1/auth/students/login"))
        .json(&json!({ "user_login": "S00001" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
