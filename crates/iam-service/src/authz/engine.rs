//! Rule-set policy engine.
//!
//! A rule is `(predicate, resource type, action, effect)`. Evaluating a
//! request walks every rule with a matching resource type and action:
//!
//! 1. A predicate that cannot be evaluated (missing attribute, wrong value
//!    shape) fails the whole check with `IamError::PolicyEvaluation`. That is
//!    never reported as a denial.
//! 2. Any holding `Deny` rule denies.
//! 3. Otherwise at least one holding `Allow` rule is required.
//!
//! No rules, or rules never loaded, means every check returns `false`.

use super::types::{
    Action, AttributeValue, Attributes, ResourceAttrs, ResourceType, SubjectAttrs, ATTR_ID,
    ATTR_OWNER_ID,
};
use crate::errors::IamError;
use crate::observability::{hash_for_correlation, metrics};
use std::sync::OnceLock;
use tracing::instrument;

/// Closed set of predicate shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `subject.<subject_attr> == resource.<resource_attr>`
    Equals {
        subject_attr: String,
        resource_attr: String,
    },
    /// `subject.<subject_attr>` is an element of `resource.<resource_attr>`
    MemberOf {
        subject_attr: String,
        resource_attr: String,
    },
}

impl Predicate {
    /// `subject.id == resource.owner_id`
    pub fn owner() -> Self {
        Predicate::Equals {
            subject_attr: ATTR_ID.to_string(),
            resource_attr: ATTR_OWNER_ID.to_string(),
        }
    }

    /// `subject.id == resource.id`
    pub fn is_self() -> Self {
        Predicate::Equals {
            subject_attr: ATTR_ID.to_string(),
            resource_attr: ATTR_ID.to_string(),
        }
    }

    /// `subject.id in resource.<set_attr>`
    pub fn member_of(set_attr: impl Into<String>) -> Self {
        Predicate::MemberOf {
            subject_attr: ATTR_ID.to_string(),
            resource_attr: set_attr.into(),
        }
    }

    fn attribute_names(&self) -> (&str, &str) {
        match self {
            Predicate::Equals {
                subject_attr,
                resource_attr,
            }
            | Predicate::MemberOf {
                subject_attr,
                resource_attr,
            } => (subject_attr, resource_attr),
        }
    }

    pub fn evaluate(
        &self,
        subject: &impl Attributes,
        resource: &impl Attributes,
    ) -> Result<bool, IamError> {
        let (subject_attr, resource_attr) = self.attribute_names();
        let left = subject
            .attribute(subject_attr)
            .ok_or_else(|| missing("subject", subject_attr))?;
        let right = resource
            .attribute(resource_attr)
            .ok_or_else(|| missing("resource", resource_attr))?;

        match (self, left, right) {
            (Predicate::Equals { .. }, AttributeValue::Id(a), AttributeValue::Id(b))
            | (Predicate::Equals { .. }, AttributeValue::Text(a), AttributeValue::Text(b)) => {
                Ok(a == b)
            }
            (Predicate::MemberOf { .. }, AttributeValue::Id(id), AttributeValue::IdSet(set)) => {
                Ok(set.contains(id))
            }
            (_, left, right) => Err(IamError::PolicyEvaluation(format!(
                "cannot apply {} to subject.{subject_attr} ({}) and resource.{resource_attr} ({})",
                self.name(),
                left.kind(),
                right.kind()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Predicate::Equals { .. } => "equals",
            Predicate::MemberOf { .. } => "member_of",
        }
    }
}

fn missing(side: &str, attr: &str) -> IamError {
    IamError::PolicyEvaluation(format!("{side} attribute '{attr}' is not present"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub predicate: Predicate,
    pub resource_type: ResourceType,
    pub action: Action,
    pub effect: Effect,
}

impl PolicyRule {
    pub fn allow(predicate: Predicate, resource_type: ResourceType, action: Action) -> Self {
        Self {
            predicate,
            resource_type,
            action,
            effect: Effect::Allow,
        }
    }

    pub fn deny(predicate: Predicate, resource_type: ResourceType, action: Action) -> Self {
        Self {
            predicate,
            resource_type,
            action,
            effect: Effect::Deny,
        }
    }

    fn applies_to(&self, resource_type: ResourceType, action: Action) -> bool {
        self.resource_type == resource_type && self.action == action
    }
}

/// Answers "can this subject perform this action on this resource".
pub trait PolicyEngine: Send + Sync {
    /// Install the rule set. Safe to call more than once; only the first
    /// call has an effect.
    fn load_policies(&self) -> Result<(), IamError>;

    fn can(
        &self,
        subject: &SubjectAttrs,
        resource: &ResourceAttrs,
        action: Action,
    ) -> Result<bool, IamError>;
}

/// Engine over a fixed list of rules.
///
/// The rule list is written once by [`PolicyEngine::load_policies`] and
/// only read afterwards, so concurrent checks need no lock.
#[derive(Debug)]
pub struct RuleSetEngine {
    pending: Vec<PolicyRule>,
    rules: OnceLock<Vec<PolicyRule>>,
}

impl RuleSetEngine {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            pending: rules,
            rules: OnceLock::new(),
        }
    }

    pub fn with_default_policies() -> Self {
        Self::new(super::policies::default_rules())
    }

    pub fn is_loaded(&self) -> bool {
        self.rules.get().is_some()
    }

    fn validate(rule: &PolicyRule) -> Result<(), IamError> {
        let (subject_attr, resource_attr) = rule.predicate.attribute_names();
        if subject_attr.trim().is_empty() || resource_attr.trim().is_empty() {
            return Err(IamError::Validation(format!(
                "Policy rule for {} {} has an empty attribute name",
                rule.resource_type, rule.action
            )));
        }
        Ok(())
    }
}

impl PolicyEngine for RuleSetEngine {
    fn load_policies(&self) -> Result<(), IamError> {
        if self.is_loaded() {
            return Ok(());
        }
        self.pending.iter().try_for_each(Self::validate)?;

        // A concurrent loader may win the race; both hold the same rules.
        let _ = self.rules.set(self.pending.clone());
        tracing::info!(
            target: "iam.authz",
            rule_count = self.pending.len(),
            "Policy rules loaded"
        );
        Ok(())
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(resource_type = %resource.resource_type(), action = %action)
    )]
    fn can(
        &self,
        subject: &SubjectAttrs,
        resource: &ResourceAttrs,
        action: Action,
    ) -> Result<bool, IamError> {
        let resource_type = resource.resource_type();
        let Some(rules) = self.rules.get() else {
            tracing::debug!(target: "iam.authz", "Policy rules not loaded, denying");
            metrics::record_authz_decision(resource_type.as_str(), action.as_str(), "deny");
            return Ok(false);
        };

        let mut allowed = false;
        let mut denied = false;
        for rule in rules.iter().filter(|r| r.applies_to(resource_type, action)) {
            let holds = match rule.predicate.evaluate(subject, resource) {
                Ok(holds) => holds,
                Err(e) => {
                    tracing::warn!(target: "iam.authz", error = %e, "Policy evaluation failed");
                    metrics::record_authz_decision(
                        resource_type.as_str(),
                        action.as_str(),
                        "error",
                    );
                    return Err(e);
                }
            };
            if holds {
                match rule.effect {
                    Effect::Allow => allowed = true,
                    Effect::Deny => denied = true,
                }
            }
        }

        let decision = allowed && !denied;
        tracing::debug!(
            target: "iam.authz",
            subject = %hash_for_correlation(&subject.user_id().to_string()),
            decision = if decision { "allow" } else { "deny" },
            "Policy decision"
        );
        metrics::record_authz_decision(
            resource_type.as_str(),
            action.as_str(),
            if decision { "allow" } else { "deny" },
        );
        Ok(decision)
    }
}
