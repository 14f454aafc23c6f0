//! Group-based access control
//!
//! Authorization is deliberately coarse: a resource lists the groups allowed
//! to reach it and an identity passes when it belongs to at least one of
//! them. Applications that need more can install [`AuthorizeHook`]s, which
//! are AND-ed with the group rule.
//!
//! ## Example
//!
//! ```
//! use fusion_core::authz::{Authorizer, Operation, RequestMetadata, ResourceConfig};
//! use fusion_core::Identity;
//!
//! let config = ResourceConfig::default().with_required_groups(["TEST"]);
//! let meta = RequestMetadata::new("GET", "/case", "case", Operation::Enumerate);
//! let authorizer = Authorizer::default();
//!
//! assert!(authorizer.authorize(&Identity::new("test", ["TEST"]), &config, &meta));
//! assert!(!authorizer.authorize(&Identity::new("eve", ["OTHER"]), &config, &meta));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::identity::Identity;

/// Per-resource access policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// When false the resource is public and the authorizer is skipped
    #[serde(default = "default_auth_required")]
    pub auth_required: bool,
    /// Groups allowed to reach the resource; empty admits any identity
    #[serde(default)]
    pub required_groups: BTreeSet<String>,
}

fn default_auth_required() -> bool {
    true
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            auth_required: true,
            required_groups: BTreeSet::new(),
        }
    }
}

impl ResourceConfig {
    pub fn public() -> Self {
        Self {
            auth_required: false,
            required_groups: BTreeSet::new(),
        }
    }

    pub fn with_required_groups<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        self.required_groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Lifecycle operation a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Retrieve,
    Update,
    Attach,
    Enumerate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Retrieve => "retrieve",
            Operation::Update => "update",
            Operation::Attach => "attach",
            Operation::Enumerate => "enumerate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request facts visible to authorization hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    pub method: String,
    pub path: String,
    pub resource: String,
    pub operation: Operation,
    pub resource_id: Option<String>,
}

impl RequestMetadata {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        resource: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            resource: resource.into(),
            operation,
            resource_id: None,
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

/// Application-level authorization predicate.
pub type AuthorizeHook =
    Arc<dyn Fn(&Identity, &RequestMetadata) -> bool + Send + Sync>;

/// Decides whether an identity may reach a resource.
///
/// Holds the global hooks; per-resource hooks are passed at call time.
#[derive(Clone, Default)]
pub struct Authorizer {
    hooks: Vec<AuthorizeHook>,
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Authorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(mut self, hook: AuthorizeHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn authorize(
        &self,
        identity: &Identity,
        config: &ResourceConfig,
        meta: &RequestMetadata,
    ) -> bool {
        self.authorize_with(identity, config, meta, &[])
    }

    /// Evaluate the group rule, then the global hooks, then `extra` hooks.
    /// Every check must pass.
    pub fn authorize_with(
        &self,
        identity: &Identity,
        config: &ResourceConfig,
        meta: &RequestMetadata,
        extra: &[AuthorizeHook],
    ) -> bool {
        if !config.auth_required {
            return true;
        }
        if identity.is_anonymous() {
            return false;
        }
        if !config.required_groups.is_empty()
            && identity.groups.is_disjoint(&config.required_groups)
        {
            return false;
        }
        self.hooks
            .iter()
            .chain(extra)
            .all(|hook| hook(identity, meta))
    }
}
