//! Attribute types for policy evaluation.
//!
//! Subjects and resources are presented to the engine as attribute bags.
//! Every fact a rule can reference is materialized before evaluation, so
//! the engine never touches a store.

use crate::models::User;
use common::types::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const ATTR_ID: &str = "id";
pub const ATTR_OWNER_ID: &str = "owner_id";
pub const ATTR_ADMIN_IDS: &str = "admin_ids";
pub const ATTR_MEMBER_IDS: &str = "member_ids";
pub const ATTR_MUTED_IDS: &str = "muted_ids";
pub const ATTR_GROUP_ID: &str = "group_id";
pub const ATTR_USER_TYPE: &str = "user_type";
pub const ATTR_STATUS: &str = "status";

/// Operations a subject can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Post,
    Join,
    Leave,
    Ban,
    Mute,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Post => "post",
            Action::Join => "join",
            Action::Leave => "leave",
            Action::Ban => "ban",
            Action::Mute => "mute",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    User,
    Settings,
    ChatGroup,
    Message,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Settings => "settings",
            ResourceType::ChatGroup => "chat_group",
            ResourceType::Message => "message",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value.
///
/// Ids and free text are kept apart so an equality rule can never match an
/// id against a display string by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Id(String),
    IdSet(Vec<String>),
    Text(String),
}

impl AttributeValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Id(_) => "id",
            AttributeValue::IdSet(_) => "id_set",
            AttributeValue::Text(_) => "text",
        }
    }
}

impl From<&UserId> for AttributeValue {
    fn from(id: &UserId) -> Self {
        AttributeValue::Id(id.to_string())
    }
}

/// Anything the engine can read attributes from.
pub trait Attributes {
    fn attribute(&self, name: &str) -> Option<&AttributeValue>;
}

/// The caller requesting access.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectAttrs {
    user_id: UserId,
    attrs: HashMap<String, AttributeValue>,
}

impl SubjectAttrs {
    /// Subject with only its `id` attribute.
    pub fn new(user_id: UserId) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert(ATTR_ID.to_string(), AttributeValue::from(&user_id));
        Self { user_id, attrs }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }
}

impl From<&User> for SubjectAttrs {
    fn from(user: &User) -> Self {
        SubjectAttrs::new(user.id)
            .with_attribute(
                ATTR_USER_TYPE,
                AttributeValue::Text(user.user_type.as_str().to_string()),
            )
            .with_attribute(
                ATTR_STATUS,
                AttributeValue::Text(user.status.as_str().to_string()),
            )
    }
}

impl Attributes for SubjectAttrs {
    fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attrs.get(name)
    }
}

/// The resource being accessed.
///
/// Opaque to the engine beyond its type and attributes. The constructors
/// seed the attributes the default rule set reads for each type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAttrs {
    resource_type: ResourceType,
    attrs: HashMap<String, AttributeValue>,
}

impl ResourceAttrs {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            attrs: HashMap::new(),
        }
    }

    /// A user profile. Its `id` is the user's own id.
    pub fn user(id: &UserId) -> Self {
        Self::new(ResourceType::User).with_attribute(ATTR_ID, id.into())
    }

    /// Settings belonging to `owner`.
    pub fn settings(owner: &UserId) -> Self {
        Self::new(ResourceType::Settings).with_attribute(ATTR_OWNER_ID, owner.into())
    }

    /// A chat group with empty admin, member and muted sets.
    pub fn chat_group(group_id: impl Into<String>, owner: &UserId) -> Self {
        Self::new(ResourceType::ChatGroup)
            .with_attribute(ATTR_ID, AttributeValue::Id(group_id.into()))
            .with_attribute(ATTR_OWNER_ID, owner.into())
            .with_attribute(ATTR_ADMIN_IDS, AttributeValue::IdSet(Vec::new()))
            .with_attribute(ATTR_MEMBER_IDS, AttributeValue::IdSet(Vec::new()))
            .with_attribute(ATTR_MUTED_IDS, AttributeValue::IdSet(Vec::new()))
    }

    /// A message sent by `sender` into a group whose current members are
    /// `member_ids`.
    pub fn message(
        message_id: impl Into<String>,
        sender: &UserId,
        group_id: impl Into<String>,
        member_ids: Vec<String>,
    ) -> Self {
        Self::new(ResourceType::Message)
            .with_attribute(ATTR_ID, AttributeValue::Id(message_id.into()))
            .with_attribute(ATTR_OWNER_ID, sender.into())
            .with_attribute(ATTR_GROUP_ID, AttributeValue::Id(group_id.into()))
            .with_attribute(ATTR_MEMBER_IDS, AttributeValue::IdSet(member_ids))
            .with_attribute(ATTR_MUTED_IDS, AttributeValue::IdSet(Vec::new()))
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_admins(self, ids: Vec<String>) -> Self {
        self.with_attribute(ATTR_ADMIN_IDS, AttributeValue::IdSet(ids))
    }

    #[must_use]
    pub fn with_members(self, ids: Vec<String>) -> Self {
        self.with_attribute(ATTR_MEMBER_IDS, AttributeValue::IdSet(ids))
    }

    #[must_use]
    pub fn with_muted(self, ids: Vec<String>) -> Self {
        self.with_attribute(ATTR_MUTED_IDS, AttributeValue::IdSet(ids))
    }
}

impl Attributes for ResourceAttrs {
    fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attrs.get(name)
    }
}
