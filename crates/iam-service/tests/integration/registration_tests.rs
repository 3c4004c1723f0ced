//! E2E tests for registration and login.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use iam_test_utils::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_with_email_returns_created_user() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;

    let body = TestRegistrationBuilder::new(TEST_PASSWORD)
        .with_email(TEST_EMAIL_ALICE)
        .with_name("Alice", "Liddell")
        .build();
    let response = server.register(&body).await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let user: Value = response.json().await?;
    assert_eq!(user["email"], TEST_EMAIL_ALICE);
    assert_eq!(user["username"], TEST_EMAIL_ALICE, "username defaults to the email");
    assert_eq!(user["first_name"], "Alice");
    assert_eq!(user["status"], "offline");
    assert!(user.get("id").is_some());
    assert!(user.get("password_hash").is_none(), "hash must never be returned");
    Ok(())
}

#[tokio::test]
async fn test_register_with_phone_only_succeeds() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;

    let body = TestRegistrationBuilder::new(TEST_PASSWORD)
        .with_phone(TEST_PHONE_CHARLIE)
        .build();
    let response = server.register(&body).await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let user: Value = response.json().await?;
    assert_eq!(user["phone_number"], TEST_PHONE_CHARLIE);
    assert!(user.get("email").is_none());
    Ok(())
}

#[tokio::test]
async fn test_register_without_contact_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;

    let response = server
        .register(&json!({ "username": "nobody", "password": TEST_PASSWORD }))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn test_register_weak_password_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;

    let body = TestRegistrationBuilder::new("password")
        .with_email(TEST_EMAIL_ALICE)
        .build();
    let response = server.register(&body).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_register_invalid_email_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;

    let body = TestRegistrationBuilder::new(TEST_PASSWORD)
        .with_email("not-an-email")
        .build();
    let response = server.register(&body).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_register_duplicate_email_differing_case_conflicts() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;

    let first = TestRegistrationBuilder::new(TEST_PASSWORD)
        .with_email(TEST_EMAIL_ALICE)
        .build();
    assert_eq!(server.register(&first).await?.status(), StatusCode::CREATED);

    let second = TestRegistrationBuilder::new(TEST_PASSWORD)
        .with_email("  Alice@Example.COM ")
        .build();
    let response = server.register(&second).await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "CONFLICT");
    Ok(())
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_returns_bearer_token_pair() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let body = TestRegistrationBuilder::new(TEST_PASSWORD)
        .with_email(TEST_EMAIL_ALICE)
        .build();
    server.register(&body).await?;

    let response = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 900);

    let user_id = body["user"]["id"].as_str().unwrap_or_default().to_string();
    let access = body["access_token"].as_str().unwrap_or_default().to_string();
    let refresh = body["refresh_token"].as_str().unwrap_or_default().to_string();

    access
        .assert_valid_jwt()
        .assert_for_subject(&user_id)
        .assert_issued_by(TEST_ISSUER)
        .assert_expires_in(900);
    refresh
        .assert_valid_jwt()
        .assert_for_subject(&user_id)
        .assert_expires_in(86_400 * 7);
    Ok(())
}

#[tokio::test]
async fn test_login_by_phone_username_succeeds() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let body = TestRegistrationBuilder::new(TEST_PASSWORD)
        .with_phone(TEST_PHONE_CHARLIE)
        .build();
    server.register(&body).await?;

    let response = server.login(TEST_PHONE_CHARLIE, TEST_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_user_look_identical() -> Result<(), anyhow::Error>
{
    let server = TestIamServer::spawn().await?;
    let body = TestRegistrationBuilder::new(TEST_PASSWORD)
        .with_email(TEST_EMAIL_ALICE)
        .build();
    server.register(&body).await?;

    let wrong_password = server.login(TEST_EMAIL_ALICE, TEST_WRONG_PASSWORD).await?;
    let unknown_user = server.login(TEST_EMAIL_BOB, TEST_PASSWORD).await?;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    let a: Value = wrong_password.json().await?;
    let b: Value = unknown_user.json().await?;
    assert_eq!(a, b);
    assert_eq!(a["error"]["code"], "INVALID_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn test_me_returns_logged_in_user() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let session = server
        .register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD)
        .await?;

    let response = server.get_with_token("/api/v1/me", &session.access_token).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = response.json().await?;
    assert_eq!(me["id"], session.user_id.to_string());
    assert_eq!(me["email"], TEST_EMAIL_ALICE);
    Ok(())
}
