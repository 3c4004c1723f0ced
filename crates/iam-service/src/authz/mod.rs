//! Attribute-based access control.
//!
//! Callers build a [`SubjectAttrs`] (usually from the authenticated
//! [`User`](crate::models::User)) and a [`ResourceAttrs`] describing what is
//! being touched, then ask a [`PolicyEngine`] whether an [`Action`] is
//! allowed. Denial is `Ok(false)`; an unevaluable rule is an error.

pub mod engine;
pub mod policies;
pub mod types;

pub use engine::{Effect, PolicyEngine, PolicyRule, Predicate, RuleSetEngine};
pub use types::{Action, AttributeValue, Attributes, ResourceAttrs, ResourceType, SubjectAttrs};
