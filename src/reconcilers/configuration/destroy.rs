// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::meta::{ConfigurationMeta, ExecutionType};
use super::outputs::owned_by_other;
use super::ConfigurationReconciler;
use crate::constants::{messages, CONFIGURATION_FINALIZER};
use crate::controllers::ReconcileResult;
use crate::error::{OperatorError, Result};
use crate::store::{DeleteOutcome, Kind, ObjectKey};
use crate::terraform::JobState;
use crate::types::{Configuration, ConfigurationState};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::{debug, info, warn};

impl ConfigurationReconciler {
    pub(super) async fn destroy(
        &self,
        configuration: &Configuration,
        mut meta: ConfigurationMeta,
    ) -> Result<ReconcileResult> {
        let key = meta.key();
        if !configuration
            .finalizers()
            .iter()
            .any(|f| f == CONFIGURATION_FINALIZER)
        {
            debug!("{} carries no finalizer of ours, nothing to clean up", key);
            return Ok(ReconcileResult::done());
        }

        let deletable = self.engine.is_deletable(configuration).await?;
        if meta.delete_resource && !deletable {
            if let Err(e) = self.prepare(configuration, &mut meta).await {
                warn!("Cannot prepare destroy job of {}: {}", key, e);
                self.set_destroy_status(&key, ConfigurationState::DestroyFailed, &e.to_string());
                return Err(e);
            }

            let handle = self.converge_job(&meta, ExecutionType::Destroy).await?;
            self.set_destroy_status(&key, ConfigurationState::Destroying, messages::DESTROYING);
            let report = self.engine.get_status(&handle).await?;
            match report.state {
                JobState::Succeeded => info!("Destroy job of {} succeeded", key),
                JobState::Provisioning => return Err(OperatorError::DestroyJobNotCompleted),
                _ => {
                    warn!("Destroy job of {} failed: {}", key, report.message);
                    self.set_destroy_status(&key, ConfigurationState::DestroyFailed, &report.message);
                    return Err(OperatorError::DestroyJobNotCompleted);
                }
            }
        } else {
            debug!(
                "Skipping terraform destroy for {} (deleteResource={}, deletable={})",
                key, meta.delete_resource, deletable
            );
        }

        self.set_destroy_status(&key, ConfigurationState::Destroyed, messages::DESTROYED);
        self.cleanup(configuration, &meta);

        self.store.update_with::<Configuration, _>(&key, |c| {
            c.finalizers_mut().retain(|f| f != CONFIGURATION_FINALIZER);
        })?;
        if self.store.delete_by_key(&key) == DeleteOutcome::Removed {
            info!("Configuration {} is deleted", key);
        }
        Ok(ReconcileResult::done())
    }

    /// Remove everything generated for the Configuration; missing targets are fine
    fn cleanup(&self, configuration: &Configuration, meta: &ConfigurationMeta) {
        let mut targets = vec![
            ObjectKey::new(Kind::ConfigMap, meta.namespace.clone(), meta.input_bundle_name.clone()),
            ObjectKey::new(Kind::Secret, meta.namespace.clone(), meta.variable_secret_name.clone()),
            ObjectKey::new(
                Kind::Secret,
                meta.backend_namespace.clone(),
                meta.backend_secret_name.clone(),
            ),
            ObjectKey::new(Kind::Job, meta.namespace.clone(), meta.apply_job_name.clone()),
            ObjectKey::new(Kind::Job, meta.namespace.clone(), meta.destroy_job_name.clone()),
        ];

        if let Some((namespace, name)) = configuration.connection_secret_reference() {
            match self.store.get_named::<Secret>(&namespace, &name) {
                Ok(Some(secret)) => match owned_by_other(&secret, meta) {
                    Some((owner_namespace, owner_name)) => warn!(
                        "Keeping connection secret {}/{} owned by {}/{}",
                        namespace, name, owner_namespace, owner_name
                    ),
                    None => targets.push(ObjectKey::new(Kind::Secret, namespace, name)),
                },
                Ok(None) => {}
                Err(e) => warn!("Failed to look up connection secret {}/{}: {}", namespace, name, e),
            }
        }

        for target in targets {
            match self.store.delete_by_key(&target) {
                DeleteOutcome::NotFound => debug!("{} was already gone", target),
                outcome => debug!("Cleaned up {} ({:?})", target, outcome),
            }
        }
    }
}
