//! Built-in rule set loaded at startup.

use super::engine::{PolicyRule, Predicate};
use super::types::{Action, ResourceType, ATTR_ADMIN_IDS, ATTR_MEMBER_IDS, ATTR_MUTED_IDS};

pub fn default_rules() -> Vec<PolicyRule> {
    use Action::{Ban, Create, Delete, Leave, Mute, Post, Read, Update};
    use ResourceType::{ChatGroup, Message, Settings, User};

    let mut rules = Vec::new();

    // Profiles and settings: only the user themself
    for action in [Read, Update, Delete] {
        rules.push(PolicyRule::allow(Predicate::is_self(), User, action));
    }
    for action in [Read, Create, Update, Delete] {
        rules.push(PolicyRule::allow(Predicate::owner(), Settings, action));
    }

    // Chat groups
    for action in [Read, Update, Delete, Ban, Mute] {
        rules.push(PolicyRule::allow(Predicate::owner(), ChatGroup, action));
    }
    for action in [Read, Update, Ban, Mute] {
        rules.push(PolicyRule::allow(
            Predicate::member_of(ATTR_ADMIN_IDS),
            ChatGroup,
            action,
        ));
    }
    for action in [Read, Post, Leave] {
        rules.push(PolicyRule::allow(
            Predicate::member_of(ATTR_MEMBER_IDS),
            ChatGroup,
            action,
        ));
    }
    rules.push(PolicyRule::deny(
        Predicate::member_of(ATTR_MUTED_IDS),
        ChatGroup,
        Post,
    ));

    // Messages
    rules.push(PolicyRule::allow(
        Predicate::member_of(ATTR_MEMBER_IDS),
        Message,
        Read,
    ));
    rules.push(PolicyRule::allow(
        Predicate::member_of(ATTR_MEMBER_IDS),
        Message,
        Create,
    ));
    rules.push(PolicyRule::deny(
        Predicate::member_of(ATTR_MUTED_IDS),
        Message,
        Create,
    ));
    for action in [Update, Delete] {
        rules.push(PolicyRule::allow(Predicate::owner(), Message, action));
    }

    rules
}
