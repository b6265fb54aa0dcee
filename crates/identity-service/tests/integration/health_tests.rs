//! Operational endpoint tests.

use identity_test_utils::server_harness::TestIdentityServer;
use reqwest::StatusCode;

#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server.client().get(server.api("/health")).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_exposed() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server.client().get(server.api("/metrics")).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = server
        .client()
        .get(server.api("/api/v1/nothing-here"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
