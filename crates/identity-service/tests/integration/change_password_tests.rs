//! E2E tests for password change.

use identity_service::models::ActorKind;
use identity_test_utils::builders::ActorDraftBuilder;
use identity_test_utils::server_harness::TestIdentityServer;
use identity_test_utils::test_ids::{TEST_NEW_PASSWORD, TEST_PASSWORD};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn change_password(
    server: &TestIdentityServer,
    user_login: &str,
    old_password: &str,
    new_password: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.api("/api/v1/auth/administrators/change-password"))
        .json(&json!({
            "user_login": user_login,
            "old_password": old_password,
            "new_password": new_password
        }))
        .send()
        .await?)
}

async fn login_status(
    server: &TestIdentityServer,
    password: &str,
) -> Result<StatusCode, anyhow::Error> {
    Ok(server
        .client()
        .post(server.api("/api/v1/auth/administrators/login"))
        .json(&json!({ "user_login": "A00001", "password": password }))
        .send()
        .await?
        .status())
}

async fn spawn_with_admin() -> Result<TestIdentityServer, anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server
        .create_actor(
            ActorKind::Administrator,
            &ActorDraftBuilder::for_kind(ActorKind::Administrator, "Sardor").build(),
        )
        .await?;
    Ok(server)
}

#[tokio::test]
async fn test_change_password_happy_path() -> Result<(), anyhow::Error> {
    // Arrange
    let server = spawn_with_admin().await?;

    // Act
    let response = change_password(&server, "A00001", TEST_PASSWORD, TEST_NEW_PASSWORD).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["comment"], "Password changed successfully");

    assert_eq!(
        login_status(&server, TEST_PASSWORD).await?,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(login_status(&server, TEST_NEW_PASSWORD).await?, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_change_password_wrong_old_password_returns_401() -> Result<(), anyhow::Error> {
    let server = spawn_with_admin().await?;

    let response =
        change_password(&server, "A00001", "not-the-password", TEST_NEW_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "PASSWORD_MISMATCH");
    assert_eq!(login_status(&server, TEST_PASSWORD).await?, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_change_password_unknown_login_returns_401() -> Result<(), anyhow::Error> {
    let server = spawn_with_admin().await?;

    let response = change_password(&server, "A00042", TEST_PASSWORD, TEST_NEW_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INCORRECT_LOGIN");
    Ok(())
}

#[tokio::test]
async fn test_change_password_too_short_returns_400() -> Result<(), anyhow::Error> {
    let server = spawn_with_admin().await?;

    let response = change_password(&server, "A00001", TEST_PASSWORD, "short").await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(login_status(&server, TEST_PASSWORD).await?, StatusCode::OK);
    Ok(())
}
