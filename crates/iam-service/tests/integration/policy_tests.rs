//! Default policy scenarios against the engine wired into a running server.

use common::types::UserId;
use iam_service::authz::{Action, PolicyEngine, ResourceAttrs, SubjectAttrs};
use iam_test_utils::*;

fn alice() -> UserId {
    UserId(TEST_USER_ALICE)
}

fn bob() -> UserId {
    UserId(TEST_USER_BOB)
}

fn charlie() -> UserId {
    UserId(TEST_USER_CHARLIE)
}

fn ids(users: &[UserId]) -> Vec<String> {
    users.iter().map(ToString::to_string).collect()
}

fn can(engine: &dyn PolicyEngine, who: UserId, resource: &ResourceAttrs, action: Action) -> bool {
    engine
        .can(&SubjectAttrs::new(who), resource, action)
        .expect("default rules always evaluate on well-formed resources")
}

#[tokio::test]
async fn test_settings_are_owner_only() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let engine = server.state().policy.as_ref();

    let settings = ResourceAttrs::settings(&bob());

    assert!(can(engine, bob(), &settings, Action::Read));
    assert!(can(engine, bob(), &settings, Action::Update));
    assert!(!can(engine, alice(), &settings, Action::Read));
    assert!(!can(engine, alice(), &settings, Action::Delete));
    Ok(())
}

#[tokio::test]
async fn test_chat_group_roles() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let engine = server.state().policy.as_ref();

    let group = ResourceAttrs::chat_group(TEST_GROUP_GENERAL.to_string(), &alice())
        .with_admins(ids(&[bob()]))
        .with_members(ids(&[alice(), bob(), charlie()]));

    // Owner
    assert!(can(engine, alice(), &group, Action::Delete));
    assert!(can(engine, alice(), &group, Action::Ban));
    // Admin
    assert!(can(engine, bob(), &group, Action::Mute));
    assert!(!can(engine, bob(), &group, Action::Delete));
    // Member
    assert!(can(engine, charlie(), &group, Action::Post));
    assert!(can(engine, charlie(), &group, Action::Leave));
    assert!(!can(engine, charlie(), &group, Action::Ban));
    Ok(())
}

#[tokio::test]
async fn test_muted_member_cannot_post_but_can_read() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let engine = server.state().policy.as_ref();

    let group = ResourceAttrs::chat_group(TEST_GROUP_RANDOM.to_string(), &alice())
        .with_members(ids(&[alice(), charlie()]))
        .with_muted(ids(&[charlie()]));

    assert!(!can(engine, charlie(), &group, Action::Post));
    assert!(can(engine, charlie(), &group, Action::Read));
    assert!(can(engine, alice(), &group, Action::Post));
    Ok(())
}

#[tokio::test]
async fn test_message_access() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let engine = server.state().policy.as_ref();

    let message = ResourceAttrs::message(
        TEST_MESSAGE_1.to_string(),
        &alice(),
        TEST_GROUP_GENERAL.to_string(),
        ids(&[alice(), bob()]),
    );

    assert!(can(engine, bob(), &message, Action::Read));
    assert!(!can(engine, bob(), &message, Action::Delete));
    assert!(can(engine, alice(), &message, Action::Delete));
    assert!(!can(engine, charlie(), &message, Action::Read));
    Ok(())
}

#[tokio::test]
async fn test_resource_missing_attribute_is_an_error() -> Result<(), anyhow::Error> {
    let server = TestIamServer::spawn().await?;
    let engine = server.state().policy.as_ref();

    let bare_group = ResourceAttrs::new(iam_service::authz::ResourceType::ChatGroup);
    let result = engine.can(&SubjectAttrs::new(alice()), &bare_group, Action::Read);

    assert!(matches!(
        result,
        Err(iam_service::errors::IamError::PolicyEvaluation(_))
    ));
    Ok(())
}
