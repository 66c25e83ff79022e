// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent creation of the executor's RBAC objects

use crate::constants::names;
use crate::error::Result;
use crate::store::{Store, StoredObject};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use kube::api::ObjectMeta;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Clone)]
pub struct RbacBootstrap {
    store: Arc<Store>,
}

impl RbacBootstrap {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Create the ClusterRole letting executor jobs manage state Secrets and leases
    #[instrument(skip(self))]
    pub fn ensure_cluster_role(&self, name: &str) -> Result<()> {
        let role = ClusterRole {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            rules: Some(vec![
                rule("", "secrets", &["get", "list", "create", "update", "delete"]),
                rule("coordination.k8s.io", "leases", &["get", "create", "update", "delete"]),
            ]),
            ..Default::default()
        };
        self.create_if_absent(role)
    }

    /// Bind the executor ClusterRole to the executor ServiceAccount of `namespace`
    #[instrument(skip(self))]
    pub fn ensure_cluster_role_binding(
        &self,
        namespace: &str,
        cluster_role: &str,
        service_account: &str,
    ) -> Result<()> {
        let binding = ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some(names::cluster_role_binding(namespace)),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: cluster_role.to_string(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: service_account.to_string(),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            }]),
        };
        self.create_if_absent(binding)
    }

    #[instrument(skip(self))]
    pub fn ensure_service_account(&self, namespace: &str, name: &str) -> Result<()> {
        let account = ServiceAccount {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.create_if_absent(account)
    }

    fn create_if_absent<K: StoredObject>(&self, obj: K) -> Result<()> {
        match self.store.get(&obj)? {
            Some(_) => {
                debug!("{} already exists", K::KIND);
                Ok(())
            }
            None => {
                let key = self.store.add(obj)?;
                info!("Created {}", key);
                Ok(())
            }
        }
    }
}

fn rule(api_group: &str, resource: &str, verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(vec![resource.to_string()]),
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    }
}
