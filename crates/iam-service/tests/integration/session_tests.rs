//! E2E tests for refresh rotation, logout and bearer token checks.

use iam_service::errors::{INVALID_ACCESS_TOKEN, INVALID_REFRESH_TOKEN};
use iam_test_utils::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn refresh_tokens(
    server: &TestIamServer,
    refresh_token: &str,
) -> Result<(StatusCode, Value), anyhow::Error> {
    let response = server.refresh(refresh_token).await?;
    let status = response.status();
    Ok((status, response.json().await?))
}

// ============================================================================
// Refresh rotation
// ============================================================================

#[tokio::test]
async fn test_refresh_rotates_and_invalidates_presented_token() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let session = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let (status, body) = refresh_tokens(&server, &session.refresh_token).await?;
    assert_eq!(status, StatusCode::OK);
    let new_refresh = body["refresh_token"].as_str().unwrap_or_default().to_string();
    new_refresh
        .assert_valid_jwt()
        .assert_for_subject(&session.user_id.to_string())
        .assert_distinct_from(&session.refresh_token);

    // Replaying the old token fails
    let (status, body) = refresh_tokens(&server, &session.refresh_token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], INVALID_REFRESH_TOKEN);

    // The rotated token keeps working
    let (status, _) = refresh_tokens(&server, &new_refresh).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_refresh_new_access_token_authenticates() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let session = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let (_, body) = refresh_tokens(&server, &session.refresh_token).await?;
    let access = body["access_token"].as_str().unwrap_or_default();

    let response = server.get_with_token("/api/v1/me", access).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_second_login_supersedes_first_session() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let first = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = refresh_tokens(&server, &first.refresh_token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_refresh_failures_share_one_message() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let session = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;
    let subject = session.user_id.to_string();

    let candidates = [
        // Never stored
        TestClaimsBuilder::new().for_subject(&subject).sign_refresh(),
        // Signed with the access secret
        TestClaimsBuilder::new().for_subject(&subject).sign_access(),
        // Expired
        TestClaimsBuilder::new()
            .for_subject(&subject)
            .expired_seconds_ago(60)
            .sign_refresh(),
        // An access token is not a refresh token
        session.access_token.clone(),
        "garbage".to_string(),
    ];

    for token in candidates {
        let (status, body) = refresh_tokens(&server, &token).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], INVALID_REFRESH_TOKEN);
    }
    Ok(())
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_then_refresh_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let session = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server
        .client()
        .post(format!("{}/api/v1/auth/logout", server.url()))
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = refresh_tokens(&server, &session.refresh_token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A second logout with the same token fails too
    let response = server
        .client()
        .post(format!("{}/api/v1/auth/logout", server.url()))
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_logout_all_ends_session() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let session = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server
        .client()
        .post(format!("{}/api/v1/auth/logout-all", server.url()))
        .bearer_auth(&session.access_token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = refresh_tokens(&server, &session.refresh_token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

// ============================================================================
// Bearer tokens
// ============================================================================

#[tokio::test]
async fn test_protected_route_without_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/api/v1/me", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_protected_route_rejects_bad_access_tokens() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let session = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;
    let subject = session.user_id.to_string();

    let candidates = [
        TestClaimsBuilder::new()
            .for_subject(&subject)
            .expired_seconds_ago(60)
            .sign_access(),
        TestClaimsBuilder::new()
            .for_subject(&subject)
            .issued_by("someone-else")
            .sign_access(),
        // Refresh tokens are not accepted as bearer tokens
        session.refresh_token.clone(),
        // Valid signature, unknown subject
        TestClaimsBuilder::new()
            .for_subject(&TEST_USER_BOB.to_string())
            .sign_access(),
    ];

    for token in candidates {
        let response = server.get_with_token("/api/v1/me", &token).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await?;
        assert_eq!(body["error"]["message"], INVALID_ACCESS_TOKEN);
    }
    Ok(())
}

#[tokio::test]
async fn test_forged_access_token_for_existing_user_is_accepted() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let session = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let token = TestClaimsBuilder::new()
        .for_subject(&session.user_id.to_string())
        .sign_access();
    let response = server.get_with_token("/api/v1/me", &token).await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
