//! E2E tests for policy-checked user endpoints.

use iam_test_utils::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_get_own_user_is_allowed() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let alice = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server
        .get_with_token(&format!("/api/v1/users/{}", alice.user_id), &alice.access_token)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let user: Value = response.json().await?;
    assert_eq!(user["email"], TEST_EMAIL_ALICE);
    Ok(())
}

#[tokio::test]
async fn test_get_other_user_is_forbidden() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let alice = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;
    let bob = server
        .register_and_login(TEST_EMAIL_BOB, TEST_PASSWORD)
        .await?;

    let response = server
        .get_with_token(&format!("/api/v1/users/{}", bob.user_id), &alice.access_token)
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn test_denied_caller_cannot_probe_for_existence() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let alice = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server
        .get_with_token(
            &format!("/api/v1/users/{}", TEST_USER_CHARLIE),
            &alice.access_token,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_get_user_malformed_id_is_bad_request() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let alice = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server
        .get_with_token("/api/v1/users/not-a-uuid", &alice.access_token)
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_update_own_profile() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let alice = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server
        .client()
        .put(format!("{}/api/v1/users/{}", server.url(), alice.user_id))
        .bearer_auth(&alice.access_token)
        .json(&json!({ "bio": "Down the rabbit hole", "timezone": "Europe/London" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let user: Value = response.json().await?;
    assert_eq!(user["bio"], "Down the rabbit hole");
    assert_eq!(user["timezone"], "Europe/London");
    assert_eq!(user["email"], TEST_EMAIL_ALICE);
    Ok(())
}

#[tokio::test]
async fn test_update_other_user_is_forbidden() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let alice = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;
    let bob = server
        .register_and_login(TEST_EMAIL_BOB, TEST_PASSWORD)
        .await?;

    let response = server
        .client()
        .put(format!("{}/api/v1/users/{}", server.url(), bob.user_id))
        .bearer_auth(&alice.access_token)
        .json(&json!({ "bio": "hijacked" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let bob_view = server.state().directory.get_by_id(&bob.user_id).await?;
    assert!(bob_view.bio.is_none());
    Ok(())
}

#[tokio::test]
async fn test_delete_self_removes_account_and_session() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let alice = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server
        .client()
        .delete(format!("{}/api/v1/users/{}", server.url(), alice.user_id))
        .bearer_auth(&alice.access_token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Still-signed access token no longer resolves to a user
    let response = server.get_with_token("/api/v1/me", &alice.access_token).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server.refresh(&alice.refresh_token).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
