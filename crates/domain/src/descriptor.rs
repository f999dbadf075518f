use std::collections::BTreeMap;

use helmspan_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::manifest::DeployTarget;

/// One container inside the project workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name, equal to the deploy target name.
    pub name: String,
    /// Published image reference to run.
    pub image: String,
    /// Environment variables in deterministic key order.
    pub env: BTreeMap<String, String>,
}

/// The stateless workload for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Workload name inside the namespace.
    pub name: String,
    /// Desired replica count.
    pub replicas: u32,
    /// Containers ordered by target name.
    pub containers: Vec<ContainerSpec>,
}

/// One persistent dependent store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSpec {
    /// Store name inside the namespace.
    pub name: String,
    /// Store engine identifier.
    pub engine: String,
    /// Volume claim name; stable across re-synthesis.
    pub volume_name: String,
    /// Requested volume size in GiB.
    pub storage_gib: u32,
}

/// Persistent stores declared only for backend deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulStores {
    /// Relational store.
    pub relational: StoreSpec,
    /// Document store.
    pub document: StoreSpec,
}

/// One routing rule mapping a hostname to a target service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteRule {
    /// Hostname to route.
    pub host: String,
    /// Target the route forwards to.
    pub target: DeployTarget,
    /// Service port the route forwards to.
    pub port: u16,
}

/// Complete declarative deployment descriptor for one project release.
///
/// Synthesis is deterministic: all collections are ordered, so two
/// descriptors built from identical inputs serialize byte-identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    namespace: String,
    workload: WorkloadSpec,
    stores: Option<StatefulStores>,
    routes: Vec<RouteRule>,
    tls_hosts: Vec<String>,
}

impl DeploymentDescriptor {
    /// Creates a descriptor, sorting routes and TLS hosts into stable order.
    pub fn new(
        namespace: impl Into<String>,
        workload: WorkloadSpec,
        stores: Option<StatefulStores>,
        mut routes: Vec<RouteRule>,
        mut tls_hosts: Vec<String>,
    ) -> AppResult<Self> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(AppError::Validation(
                "descriptor namespace must not be empty".to_owned(),
            ));
        }

        if workload.containers.is_empty() {
            return Err(AppError::Validation(
                "descriptor workload must declare at least one container".to_owned(),
            ));
        }

        routes.sort();
        routes.dedup();
        tls_hosts.sort();
        tls_hosts.dedup();

        Ok(Self {
            namespace,
            workload,
            stores,
            routes,
            tls_hosts,
        })
    }

    /// Returns the isolated resource group the descriptor applies to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.namespace.as_str()
    }

    /// Returns the stateless workload definition.
    #[must_use]
    pub fn workload(&self) -> &WorkloadSpec {
        &self.workload
    }

    /// Returns the persistent stores, declared only for backend targets.
    #[must_use]
    pub fn stores(&self) -> Option<&StatefulStores> {
        self.stores.as_ref()
    }

    /// Returns the routing rules in stable order.
    #[must_use]
    pub fn routes(&self) -> &[RouteRule] {
        self.routes.as_slice()
    }

    /// Returns every hostname needing TLS termination, in stable order.
    #[must_use]
    pub fn tls_hosts(&self) -> &[String] {
        self.tls_hosts.as_slice()
    }

    /// Serializes the descriptor to its canonical JSON form.
    pub fn to_canonical_json(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|error| {
            AppError::Internal(format!("failed to serialize descriptor: {error}"))
        })
    }
}
