//! E2E tests for actor record management.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use identity_service::models::ActorKind;
use identity_test_utils::builders::ActorDraftBuilder;
use identity_test_utils::server_harness::TestIdentityServer;
use identity_test_utils::test_ids::{TEST_BRANCH_YUNUSOBOD, TEST_MISSING_ID};
use reqwest::StatusCode;
use serde_json::Value;

// ============================================================================
// Create
// ============================================================================

/// Login handles are numbered per kind with the kind's prefix.
#[tokio::test]
async fn test_create_assigns_per_kind_login_handles() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;

    // Act
    let first_student = server
        .create_actor(ActorKind::Student, &ActorDraftBuilder::student("Ann").build())
        .await?;
    let second_student = server
        .create_actor(ActorKind::Student, &ActorDraftBuilder::student("Bob").build())
        .await?;
    let teacher = server
        .create_actor(ActorKind::Teacher, &ActorDraftBuilder::teacher("Dilnoza").build())
        .await?;

    // Assert
    assert_eq!(first_student["user_login"], "S00001");
    assert_eq!(second_student["user_login"], "S00002");
    assert_eq!(teacher["user_login"], "T00001");
    assert_eq!(teacher["kind"], "teacher");
    Ok(())
}

/// The response never carries password material.
#[tokio::test]
async fn test_create_response_hides_password() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let body = server
        .create_actor(ActorKind::Manager, &ActorDraftBuilder::for_kind(ActorKind::Manager, "Kamola").build())
        .await?;

    let text = body.to_string();
    assert!(!text.contains("password"), "Response leaked password field: {}", text);
    Ok(())
}

/// A role field that does not belong to the kind is rejected.
#[tokio::test]
async fn test_create_with_foreign_role_field_returns_400() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server
        .client()
        .post(server.api("/api/v1/actors/students"))
        .json(&ActorDraftBuilder::student("Ann").with_field("salary", 100.0).build())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(server.actors().live_count(ActorKind::Student).await, 0);
    Ok(())
}

#[tokio::test]
async fn test_create_with_short_password_returns_400() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server
        .client()
        .post(server.api("/api/v1/actors/teachers"))
        .json(&ActorDraftBuilder::teacher("Dilnoza").with_password("short").build())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

// ============================================================================
// Read, update, delete
// ============================================================================

#[tokio::test]
async fn test_get_update_delete_lifecycle() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    let created = server
        .create_actor(ActorKind::Teacher, &ActorDraftBuilder::teacher("Dilnoza").build())
        .await?;
    let url = server.api(&format!(
        "/api/v1/actors/teachers/{}",
        created["id"].as_str().unwrap_or_default()
    ));

    // Act: update
    let response = server
        .client()
        .put(&url)
        .json(&serde_json::json!({
            "fullname": "Dilnoza Karimova",
            "branch_id": TEST_BRANCH_YUNUSOBOD,
            "ielts_score": 8.5
        }))
        .send()
        .await?;

    // Assert: update applied, login handle untouched
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await?;
    assert_eq!(updated["fullname"], "Dilnoza Karimova");
    assert_eq!(updated["ielts_score"], 8.5);
    assert_eq!(updated["user_login"], created["user_login"]);

    // Act: delete, then read
    let response = server.client().delete(&url).send().await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server.client().get(&url).send().await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Deleting twice reports not found
    let response = server.client().delete(&url).send().await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

/// Records are scoped by kind: a teacher id is not a student.
#[tokio::test]
async fn test_get_with_wrong_kind_returns_404() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let teacher = server
        .create_actor(ActorKind::Teacher, &ActorDraftBuilder::teacher("Dilnoza").build())
        .await?;

    let response = server
        .client()
        .get(server.api(&format!(
            "/api/v1/actors/students/{}",
            teacher["id"].as_str().unwrap_or_default()
        )))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_get_missing_id_returns_404() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server
        .client()
        .get(server.api(&format!("/api/v1/actors/students/{}", TEST_MISSING_ID)))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["message"], "student not found");
    Ok(())
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_supports_search_and_paging() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    for name in ["Ann Lee", "Bob Stone", "Annabel Ray"] {
        server
            .create_actor(ActorKind::Student, &ActorDraftBuilder::student(name).build())
            .await?;
    }

    // Act
    let response = server
        .client()
        .get(server.api("/api/v1/actors/students?search=ann&limit=1&offset=1"))
        .send()
        .await?;

    // Assert: count covers every match, page holds one
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["count"], 2);
    assert_eq!(body["actors"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_list_with_bad_query_returns_400() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server
        .client()
        .get(server.api("/api/v1/actors/students?limit=lots"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

// ============================================================================
// Exists
// ============================================================================

#[tokio::test]
async fn test_exists_reports_live_and_deleted_actors() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    let created = server
        .create_actor(ActorKind::Student, &ActorDraftBuilder::student("Ann").build())
        .await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();
    let exists_url = server.api(&format!("/api/v1/actors/students/{}/exists", id));

    // Act
    let live: Value = server.client().get(&exists_url).send().await?.json().await?;
    let other_kind: Value = server
        .client()
        .get(server.api(&format!("/api/v1/actors/teachers/{}/exists", id)))
        .send()
        .await?
        .json()
        .await?;
    let missing: Value = server
        .client()
        .get(server.api(&format!(
            "/api/v1/actors/students/{}/exists",
            TEST_MISSING_ID
        )))
        .send()
        .await?
        .json()
        .await?;

    // Assert
    assert_eq!(live["check"], true);
    assert_eq!(other_kind["check"], false);
    assert_eq!(missing["check"], false);

    let response = server
        .client()
        .delete(server.api(&format!("/api/v1/actors/students/{}", id)))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server.client().get(&exists_url).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let deleted: Value = response.json().await?;
    assert_eq!(deleted["check"], false);
    Ok(())
}

#[tokio::test]
async fn test_exists_with_malformed_id_returns_400() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server
        .client()
        .get(server.api("/api/v1/actors/students/not-a-uuid/exists"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
