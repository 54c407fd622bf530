//! Bridge lifecycle management
//!
//! Drives two provisioners and the connection registry for one mismatched
//! edge. Provisioning is idempotent: an existing registry entry is reused
//! (same URL, same token) and the endpoint functions are re-asserted with
//! the identical spec, so repeated deploys cause no mutation.

use crate::error::Result;
use crate::token::mint_token;
use serde_json::json;
use twinflow_cloud::{CloudError, NameContext, Provisioner, ResourceSpec};
use twinflow_core::resolver::{bridge_egress_role, bridge_ingress_role};
use twinflow_core::{BoundaryEdge, ResourceKind};
use twinflow_registry::{ConnectionEntry, ConnectionRegistry, conn_id};

/// Environment keys injected into relay functions
pub const ENV_BRIDGE_URL: &str = "BRIDGE_URL";
pub const ENV_BRIDGE_TOKEN: &str = "BRIDGE_TOKEN";
pub const ENV_BRIDGE_CONN_ID: &str = "BRIDGE_CONN_ID";

/// Stateless manager for one project's bridges
pub struct BridgeManager {
    project: String,
}

impl BridgeManager {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    /// Provision both ends of a bridge and persist the connection entry.
    ///
    /// When the registry already holds an entry for this conn_id, its URL
    /// and token are reused — deploy never rotates a token.
    pub async fn provision(
        &self,
        edge: BoundaryEdge,
        source: &dyn Provisioner,
        target: &dyn Provisioner,
        registry: &ConnectionRegistry,
    ) -> Result<ConnectionEntry> {
        let src = source.provider_id();
        let dst = target.provider_id();
        let id = conn_id(edge, src, dst);
        let existing = registry.get(&id).await?;

        let token = match &existing {
            Some(entry) => entry.token.clone(),
            None => mint_token(),
        };

        // Target side: public HTTP-triggered ingress function
        let ingress_role = bridge_ingress_role(edge);
        let ingress_name = target.resource_name(&NameContext::new(
            &self.project,
            edge.target(),
            &ingress_role,
        ));
        let ingress_spec = ResourceSpec::new(
            ResourceKind::RelayIngress,
            &ingress_role,
            edge.target(),
            dst,
            &ingress_name,
        )
        .with_config(json!({ "trigger": "http", "auth": "bearer", "edge": edge.id() }))
        .with_env(ENV_BRIDGE_TOKEN, &token);

        let ingress = target.create(&ingress_spec).await?;

        let url = match (&existing, ingress.attribute_str("url")) {
            (_, Some(url)) => url.to_string(),
            (Some(entry), None) => entry.url.clone(),
            (None, None) => {
                return Err(CloudError::permanent(
                    "bridge provision",
                    format!("ingress {ingress_name} returned no public URL"),
                )
                .into());
            }
        };

        // Source side: relay with the same observable shape as a local call
        let egress_role = bridge_egress_role(edge);
        let egress_name = source.resource_name(&NameContext::new(
            &self.project,
            edge.source(),
            &egress_role,
        ));
        let egress_spec = ResourceSpec::new(
            ResourceKind::RelayEgress,
            &egress_role,
            edge.source(),
            src,
            &egress_name,
        )
        .with_config(json!({ "edge": edge.id() }))
        .with_env(ENV_BRIDGE_URL, &url)
        .with_env(ENV_BRIDGE_TOKEN, &token)
        .with_env(ENV_BRIDGE_CONN_ID, &id);

        source.create(&egress_spec).await?;

        let entry = match existing {
            Some(entry) if entry.url == url && entry.token == token => entry,
            _ => {
                let entry = ConnectionEntry::new(edge, src, dst, &url, &token);
                registry.put(entry.clone()).await?;
                entry
            }
        };

        tracing::info!(
            conn_id = %entry.conn_id,
            url = %entry.url,
            "ブリッジを構成しました"
        );
        Ok(entry)
    }

    /// Tear down both endpoint functions and the registry entry.
    ///
    /// Called when either owning layer is destroyed. After a partial
    /// teardown the surviving side fails closed: the relay client refuses
    /// to send once the registry entry is gone.
    pub async fn teardown(
        &self,
        edge: BoundaryEdge,
        source: &dyn Provisioner,
        target: &dyn Provisioner,
        registry: &ConnectionRegistry,
    ) -> Result<()> {
        let src = source.provider_id();
        let dst = target.provider_id();

        let egress_name = source.resource_name(&NameContext::new(
            &self.project,
            edge.source(),
            bridge_egress_role(edge),
        ));
        source
            .destroy(ResourceKind::RelayEgress, &egress_name)
            .await?;

        let ingress_name = target.resource_name(&NameContext::new(
            &self.project,
            edge.target(),
            bridge_ingress_role(edge),
        ));
        target
            .destroy(ResourceKind::RelayIngress, &ingress_name)
            .await?;

        let id = conn_id(edge, src, dst);
        registry.remove(&id).await?;
        tracing::info!(conn_id = %id, "ブリッジを破棄しました");
        Ok(())
    }

    /// Explicit destroy-then-provision. The only path that rotates a token.
    pub async fn recreate(
        &self,
        edge: BoundaryEdge,
        source: &dyn Provisioner,
        target: &dyn Provisioner,
        registry: &ConnectionRegistry,
    ) -> Result<ConnectionEntry> {
        self.teardown(edge, source, target, registry).await?;
        self.provision(edge, source, target, registry).await
    }

    /// Which end of the bridge a step role refers to
    pub fn is_ingress_role(edge: BoundaryEdge, role: &str) -> bool {
        role == bridge_ingress_role(edge)
    }
}
