// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Harvesting Terraform outputs from the backend state into the connection Secret.

use crate::constants::{labels, TERRAFORM_STATE_KEY};
use crate::error::{OperatorError, Result};
use crate::kubernetes::secrets::{make_secret, raw_value};
use crate::reconcilers::configuration::job::owner_labels;
use crate::reconcilers::configuration::meta::ConfigurationMeta;
use crate::store::Store;
use crate::terraform::state::{decompress_state, parse_outputs};
use crate::types::{Configuration, Property};
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Read outputs from the state backend Secret
pub fn read_outputs(store: &Store, meta: &ConfigurationMeta) -> Result<BTreeMap<String, Property>> {
    let backend: Option<Secret> =
        store.get_named(&meta.backend_namespace, &meta.backend_secret_name)?;
    let Some(backend) = backend else {
        return Err(OperatorError::State(
            "terraform state file backend secret is not generated".to_string(),
        ));
    };
    let Some(raw) = raw_value(&backend, TERRAFORM_STATE_KEY) else {
        return Err(OperatorError::State(format!(
            "failed to get {} from Terraform State secret {}",
            TERRAFORM_STATE_KEY, meta.backend_secret_name
        )));
    };
    parse_outputs(&decompress_state(&raw)?)
}

/// Whether a connection Secret belongs to a configuration other than `meta`.
/// Each owner label is compared only when set.
pub fn owned_by_other(secret: &Secret, meta: &ConfigurationMeta) -> Option<(String, String)> {
    let labels = secret.metadata.labels.as_ref()?;
    let label = |key: &str| labels.get(key).cloned().unwrap_or_default();
    let (namespace, name) = (label(labels::OWNED_NAMESPACE), label(labels::OWNED_BY));
    let foreign_name = !name.is_empty() && name != meta.name;
    let foreign_namespace = !namespace.is_empty() && namespace != meta.namespace;
    (foreign_name || foreign_namespace).then_some((namespace, name))
}

/// Harvest outputs and publish them to the connection Secret, if requested
pub fn generate_outputs(
    store: &Store,
    configuration: &Configuration,
    meta: &ConfigurationMeta,
) -> Result<BTreeMap<String, Property>> {
    let outputs = read_outputs(store, meta)?;
    let Some((namespace, name)) = configuration.connection_secret_reference() else {
        return Ok(outputs);
    };
    let data: BTreeMap<String, String> = outputs
        .iter()
        .map(|(k, v)| (k.clone(), v.value.clone()))
        .collect();

    match store.get_named::<Secret>(&namespace, &name)? {
        None => {
            store.add(make_secret(&namespace, &name, data, Some(owner_labels(meta))))?;
            info!("Created connection secret {}/{}", namespace, name);
        }
        Some(mut existing) => {
            if let Some((owner_namespace, owner_name)) = owned_by_other(&existing, meta) {
                return Err(OperatorError::OutputSecretConflict {
                    namespace: meta.namespace.clone(),
                    name: meta.name.clone(),
                    secret_namespace: namespace,
                    secret_name: name,
                    owner_namespace,
                    owner_name,
                });
            }
            existing.data = None;
            existing.string_data = Some(data);
            store.update(existing)?;
            debug!("Refreshed connection secret {}/{}", namespace, name);
        }
    }
    Ok(outputs)
}
