//! Provisioner trait definition
//!
//! All cloud providers (AWS, Azure, GCP) implement this trait to provide a
//! unified create/destroy/name surface for pipeline resources.
//!
//! # Contract
//!
//! - `create` on an existing resource whose actual spec matches the request
//!   is a no-op (`ResourceHandle.created == false`); a conflicting spec
//!   fails with [`CloudError::Drift`](crate::CloudError), never a silent
//!   overwrite.
//! - `destroy` on a missing resource is a no-op, not an error.
//! - `resource_name` is deterministic and shared by create and destroy, so
//!   destroy never depends on a handle from a previous run.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use twinflow_core::{LayerId, ProviderId, ResourceKind};

/// Authentication status of a provider account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub account_info: Option<String>,
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Input to the deterministic naming function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameContext {
    pub project: String,
    pub layer: LayerId,
    pub role: String,
}

impl NameContext {
    pub fn new(project: impl Into<String>, layer: LayerId, role: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            layer,
            role: role.into(),
        }
    }
}

/// Canonical resource name before provider-specific sanitization
///
/// `{project}-{layer short code}-{role}`, e.g. `factory-twin-l2-persist-fn`.
pub fn default_resource_name(ctx: &NameContext) -> String {
    format!("{}-{}-{}", ctx.project, ctx.layer.short(), ctx.role)
}

/// Desired configuration for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub role: String,
    pub layer: LayerId,
    pub provider: ProviderId,

    /// Deterministic name (output of `resource_name`)
    pub name: String,

    /// Resource-specific configuration
    pub config: serde_json::Value,

    /// Environment values injected into the resource (function env vars).
    /// BTreeMap keeps spec comparison deterministic for drift checks.
    pub environment: BTreeMap<String, String>,
}

impl ResourceSpec {
    pub fn new(
        kind: ResourceKind,
        role: impl Into<String>,
        layer: LayerId,
        provider: ProviderId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            role: role.into(),
            layer,
            provider,
            name: name.into(),
            config: serde_json::Value::Null,
            environment: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

/// Opaque identifier returned by a create call
///
/// Owned by the orchestrator for a single run; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub name: String,
    pub kind: ResourceKind,
    pub provider: ProviderId,

    /// Provider attributes (ARN/URL/endpoint etc.)
    pub attributes: HashMap<String, serde_json::Value>,

    /// false when create was a no-op on an already-matching resource
    pub created: bool,
}

impl ResourceHandle {
    pub fn created(name: impl Into<String>, kind: ResourceKind, provider: ProviderId) -> Self {
        Self {
            name: name.into(),
            kind,
            provider,
            attributes: HashMap::new(),
            created: true,
        }
    }

    pub fn existing(name: impl Into<String>, kind: ResourceKind, provider: ProviderId) -> Self {
        Self {
            created: false,
            ..Self::created(name, kind, provider)
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

/// Function invocation mode for the diagnostics passthrough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    Sync,
    Async,
}

/// Cloud provisioner abstraction
///
/// One implementation per provider variant. All network calls are blocking
/// points; implementations must be safe to share behind `Arc`.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// The provider this adapter drives
    fn provider_id(&self) -> ProviderId;

    /// Display name for UI/logs
    fn display_name(&self) -> &str;

    /// Check that the provider CLI/account is usable
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Whether a resource with this deterministic name exists
    async fn exists(&self, kind: ResourceKind, name: &str) -> Result<bool>;

    /// Create a resource, idempotently (see module docs for the contract)
    async fn create(&self, spec: &ResourceSpec) -> Result<ResourceHandle>;

    /// Destroy a resource; missing resource is a no-op
    async fn destroy(&self, kind: ResourceKind, name: &str) -> Result<()>;

    /// Deterministic naming, identical for create and destroy
    fn resource_name(&self, ctx: &NameContext) -> String;

    /// Push updated code/definition to an existing function resource
    async fn redeploy_function(&self, name: &str, spec: &ResourceSpec) -> Result<()>;

    /// Direct function invocation (diagnostics passthrough)
    async fn invoke_function(
        &self,
        name: &str,
        payload: serde_json::Value,
        mode: InvocationMode,
    ) -> Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resource_name() {
        let ctx = NameContext::new("factory-twin", LayerId::Compute, "persist-fn");
        assert_eq!(default_resource_name(&ctx), "factory-twin-l2-persist-fn");
    }

    #[test]
    fn test_existing_handle_is_not_created() {
        let handle =
            ResourceHandle::existing("n", ResourceKind::HotTable, ProviderId::Aws);
        assert!(!handle.created);
    }
}
