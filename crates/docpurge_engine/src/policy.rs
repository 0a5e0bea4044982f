//! The pluggable purge policy.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// An error raised by a policy while evaluating a group.
///
/// Policy errors abort the whole run; a policy that merely does not want
/// to purge anything returns [`PolicyVerdict::Ignore`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PolicyError {
    message: String,
}

impl PolicyError {
    /// Creates a policy error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What a policy decided for one contact group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// Purge the named document ids.
    ///
    /// Ids outside the group under evaluation are untrusted and dropped
    /// by the engine.
    Purge(Vec<String>),
    /// Purge nothing for this group.
    Ignore,
}

impl PolicyVerdict {
    /// Convenience constructor for a purge verdict.
    pub fn purge<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Purge(ids.into_iter().map(Into::into).collect())
    }
}

/// Decides, per role set, which documents of a contact group to purge.
///
/// The engine calls this once per contact group per role group. `contact`
/// is the group's contact document (`{}` for unallocated records and
/// standalone reports, `{"_deleted": true}` for deleted contacts).
pub trait PurgePolicy: Send + Sync {
    /// Evaluates one group for the given user roles.
    fn evaluate(
        &self,
        roles: &[String],
        contact: &Value,
        reports: &[Value],
        messages: &[Value],
    ) -> Result<PolicyVerdict, PolicyError>;
}

impl<F> PurgePolicy for F
where
    F: Fn(&[String], &Value, &[Value], &[Value]) -> Result<PolicyVerdict, PolicyError>
        + Send
        + Sync,
{
    fn evaluate(
        &self,
        roles: &[String],
        contact: &Value,
        reports: &[Value],
        messages: &[Value],
    ) -> Result<PolicyVerdict, PolicyError> {
        self(roles, contact, reports, messages)
    }
}

/// Supplies the currently configured policy, if any.
///
/// A deployment without a configured policy yields `None` and purge runs
/// become no-ops.
pub trait PolicyProvider: Send + Sync {
    /// Returns the active policy.
    fn current(&self) -> Option<Arc<dyn PurgePolicy>>;
}

/// A provider holding a fixed, optional policy.
#[derive(Default)]
pub struct StaticPolicyProvider {
    policy: Option<Arc<dyn PurgePolicy>>,
}

impl StaticPolicyProvider {
    /// A provider with no policy configured.
    pub fn none() -> Self {
        Self::default()
    }

    /// A provider that always returns the given policy.
    pub fn with_policy(policy: Arc<dyn PurgePolicy>) -> Self {
        Self {
            policy: Some(policy),
        }
    }
}

impl PolicyProvider for StaticPolicyProvider {
    fn current(&self) -> Option<Arc<dyn PurgePolicy>> {
        self.policy.clone()
    }
}
