// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Configuration reconciler - drives Terraform apply and destroy jobs.
//!
//! Every pass re-derives the rendered source, the provider credentials and
//! the variable Secret from the stored objects, then converges the executor
//! Job towards them. Job progress that is merely incomplete surfaces as
//! [`OperatorError::is_not_completed`] and is retried on a fixed delay.

mod destroy;
pub mod job;
pub mod meta;
pub mod outputs;
pub mod render;


use crate::config::Config;
use crate::constants::{messages, names, CONFIGURATION_FINALIZER, REQUEUE_DELAY};
use crate::controllers::{ReconcileResult, Reconciler, Request};
use crate::error::{OperatorError, Result};
use crate::kubernetes::secrets::{make_secret, string_map};
use crate::kubernetes::RbacBootstrap;
use crate::provider::CredentialResolver;
use crate::store::{object_key, Kind, ObjectKey, ObjectState, Store, StoredObject};
use crate::terraform::values::variable_env;
use crate::terraform::{ExecutionEngine, JobHandle, JobState, JobStatusReport};
use crate::types::{ApplyStatus, Configuration, ConfigurationState, Property, Provider};
use async_trait::async_trait;
use job::{desired_job, owner_labels, plan, JobPlan};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use meta::{ConfigurationMeta, ExecutionType};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct ConfigurationReconciler {
    store: Arc<Store>,
    config: Config,
    resolver: Arc<dyn CredentialResolver>,
    engine: Arc<dyn ExecutionEngine>,
    rbac: RbacBootstrap,
}

impl ConfigurationReconciler {
    pub fn new(
        store: Arc<Store>,
        config: Config,
        resolver: Arc<dyn CredentialResolver>,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Self {
        Self {
            rbac: RbacBootstrap::new(store.clone()),
            store,
            config,
            resolver,
            engine,
        }
    }

    /// Best-effort apply status write; advances the observed generation
    fn set_apply_status(
        &self,
        key: &ObjectKey,
        state: ConfigurationState,
        message: &str,
        outputs: Option<BTreeMap<String, Property>>,
    ) {
        let result = self.store.update_with::<Configuration, _>(key, |c| {
            let generation = c.metadata.generation.unwrap_or_default();
            let mut status = c.status_or_default();
            status.observed_generation = generation;
            status.apply = ApplyStatus {
                state: Some(state),
                message: message.to_string(),
                outputs: outputs.unwrap_or_default(),
            };
            c.status = Some(status);
        });
        if let Err(e) = result {
            error!("Failed to update apply status of {}: {}", key, e);
        }
    }

    /// Best-effort destroy status write
    fn set_destroy_status(&self, key: &ObjectKey, state: ConfigurationState, message: &str) {
        let result = self.store.update_with::<Configuration, _>(key, |c| {
            let mut status = c.status_or_default();
            status.destroy.state = Some(state);
            status.destroy.message = message.to_string();
            c.status = Some(status);
        });
        if let Err(e) = result {
            error!("Failed to update destroy status of {}: {}", key, e);
        }
    }

    fn ensure_finalizer(&self, configuration: &Configuration) -> Result<()> {
        if configuration
            .finalizers()
            .iter()
            .any(|f| f == CONFIGURATION_FINALIZER)
        {
            return Ok(());
        }
        let key = object_key(configuration)?;
        self.store.update_with::<Configuration, _>(&key, |c| {
            if !c.finalizers().iter().any(|f| f == CONFIGURATION_FINALIZER) {
                c.finalizers_mut().push(CONFIGURATION_FINALIZER.to_string());
            }
        })?;
        debug!("Added finalizer to {}", key);
        Ok(())
    }

    /// Validate and render the source, then persist the input bundle.
    /// Sets `configuration_changed` when the rendered source differs from the
    /// previously persisted bundle.
    fn render_inputs(&self, configuration: &Configuration, meta: &mut ConfigurationMeta) -> Result<()> {
        let configuration_type = render::validate(&configuration.spec)?;
        meta.configuration_type = Some(configuration_type);
        meta.complete_configuration = render::render(
            &configuration.spec,
            configuration_type,
            &meta.name,
            &meta.backend_namespace,
        )?;

        let existing: Option<ConfigMap> =
            self.store.get_named(&meta.namespace, &meta.input_bundle_name)?;
        meta.configuration_changed = meta.remote_git.is_none()
            && existing
                .as_ref()
                .and_then(|cm| cm.data.as_ref())
                .and_then(|d| d.get(meta.bundle_file()))
                .is_some_and(|previous| *previous != meta.complete_configuration);

        let bundle = ConfigMap {
            metadata: ObjectMeta {
                name: Some(meta.input_bundle_name.clone()),
                namespace: Some(meta.namespace.clone()),
                labels: Some(owner_labels(meta)),
                ..Default::default()
            },
            data: Some(meta.bundle_data()),
            ..Default::default()
        };
        self.store.update(bundle)?;
        Ok(())
    }

    /// Resolve the referenced Provider and fetch its credentials
    async fn resolve_credentials(
        &self,
        configuration: &Configuration,
        meta: &mut ConfigurationMeta,
    ) -> Result<()> {
        let (namespace, name) = configuration.provider_reference();
        let Some(provider) = self.store.get_named::<Provider>(&namespace, &name)? else {
            return Err(OperatorError::Provider(format!(
                "{} {}/{}",
                messages::PROVIDER_NOT_FOUND,
                namespace,
                name
            )));
        };
        if provider.is_not_ready() {
            return Err(OperatorError::Provider(provider.status_message().to_string()));
        }

        let region = configuration
            .spec
            .custom_region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| provider.spec.region.clone())
            .unwrap_or_default();
        meta.credentials = self.resolver.get_credentials(&provider, &region).await?;
        Ok(())
    }

    /// Compute the variable Secret data and diff it against the stored Secret.
    /// A missing Secret is created as-is.
    fn sync_variables(&self, configuration: &Configuration, meta: &mut ConfigurationMeta) -> Result<()> {
        let mut data = variable_env(configuration.spec.variable.as_ref())?;
        data.extend(meta.credentials.clone());
        meta.variable_secret_data = data;

        let existing: Option<Secret> =
            self.store.get_named(&meta.namespace, &meta.variable_secret_name)?;
        match existing {
            None => {
                self.write_variable_secret(meta)?;
            }
            Some(secret) => {
                meta.env_changed = variables_differ(&string_map(&secret), &meta.variable_secret_data);
            }
        }
        Ok(())
    }

    fn write_variable_secret(&self, meta: &ConfigurationMeta) -> Result<()> {
        let secret = make_secret(
            &meta.namespace,
            &meta.variable_secret_name,
            meta.variable_secret_data.clone(),
            Some(owner_labels(meta)),
        );
        self.store.update(secret)
    }

    /// Bring the executor Job of `execution_type` in line with the current inputs
    async fn converge_job(&self, meta: &ConfigurationMeta, execution_type: ExecutionType) -> Result<JobHandle> {
        let desired = desired_job(meta, &self.config, execution_type);
        let handle = JobHandle::new(meta.namespace.clone(), meta.job_name(execution_type));
        let existing: Option<Job> = self.store.get_by_key(&handle.key())?;

        match plan(meta, existing.as_ref(), &desired) {
            JobPlan::Unchanged => return Ok(handle),
            JobPlan::Recreate => {
                info!("Inputs of job {} changed, recreating it", handle);
                self.store.delete_by_key(&handle.key());
                self.store.delete_by_key(&ObjectKey::new(
                    Kind::Secret,
                    meta.namespace.clone(),
                    meta.variable_secret_name.clone(),
                ));
            }
            JobPlan::Trigger => debug!("No {} job for {} yet", execution_type, meta.key()),
        }

        self.write_variable_secret(meta)?;
        self.rbac
            .ensure_service_account(&meta.namespace, names::SERVICE_ACCOUNT)?;
        self.rbac.ensure_cluster_role_binding(
            &meta.namespace,
            &names::cluster_role(&meta.namespace),
            names::SERVICE_ACCOUNT,
        )?;
        self.engine.trigger_job(desired).await
    }

    /// Everything both the apply and the destroy job consume
    async fn prepare(&self, configuration: &Configuration, meta: &mut ConfigurationMeta) -> Result<()> {
        self.render_inputs(configuration, meta)?;
        self.resolve_credentials(configuration, meta).await?;
        self.sync_variables(configuration, meta)?;
        self.rbac
            .ensure_cluster_role(&names::cluster_role(&meta.namespace))
    }

    async fn apply(&self, configuration: &Configuration, mut meta: ConfigurationMeta) -> Result<ReconcileResult> {
        let key = meta.key();
        self.ensure_finalizer(configuration)?;

        match self.render_inputs(configuration, &mut meta) {
            Err(e @ OperatorError::Validation(_)) => {
                warn!("Configuration {} is invalid: {}", key, e);
                self.set_apply_status(&key, ConfigurationState::StaticCheckFailed, &e.to_string(), None);
                return Ok(ReconcileResult::done());
            }
            other => other?,
        }
        if meta.configuration_changed {
            info!("Terraform source of {} changed", key);
            self.set_apply_status(
                &key,
                ConfigurationState::Reloading,
                messages::RELOADING_AS_HCL_CHANGED,
                None,
            );
            return Ok(ReconcileResult::requeue_after(REQUEUE_DELAY));
        }

        if let Err(e) = self.resolve_credentials(configuration, &mut meta).await {
            warn!("Configuration {} is waiting for its provider: {}", key, e);
            self.set_apply_status(&key, ConfigurationState::Authorizing, &e.to_string(), None);
            return Err(e);
        }

        self.sync_variables(configuration, &mut meta)?;
        if meta.env_changed {
            info!("Variables of {} changed", key);
            self.set_apply_status(
                &key,
                ConfigurationState::Reloading,
                messages::RELOADING_AS_VARIABLE_CHANGED,
                None,
            );
        }

        self.rbac
            .ensure_cluster_role(&names::cluster_role(&meta.namespace))?;

        let handle = self.converge_job(&meta, ExecutionType::Apply).await?;
        let report = self.engine.get_status(&handle).await?;
        self.record_apply_progress(configuration, &meta, report)
    }

    fn record_apply_progress(
        &self,
        configuration: &Configuration,
        meta: &ConfigurationMeta,
        report: JobStatusReport,
    ) -> Result<ReconcileResult> {
        let key = meta.key();
        match report.state {
            JobState::Succeeded => match outputs::generate_outputs(&self.store, configuration, meta) {
                Ok(outputs) => {
                    if configuration.apply_state() != Some(ConfigurationState::Available) {
                        info!("Configuration {} is available", key);
                    }
                    self.set_apply_status(
                        &key,
                        ConfigurationState::Available,
                        messages::CLOUD_RESOURCE_DEPLOYED,
                        Some(outputs),
                    );
                    Ok(ReconcileResult::done())
                }
                Err(e) => {
                    warn!("Failed to generate outputs of {}: {}", key, e);
                    self.set_apply_status(
                        &key,
                        ConfigurationState::GeneratingOutputs,
                        &format!("{}: {}", messages::GENERATE_OUTPUTS_FAILED, e),
                        None,
                    );
                    Err(e)
                }
            },
            JobState::Provisioning => {
                let current = self
                    .store
                    .get_by_key::<Configuration>(&key)?
                    .and_then(|c| c.apply_state());
                if !matches!(
                    current,
                    Some(ConfigurationState::ProvisioningAndChecking | ConfigurationState::InvalidRegion)
                ) {
                    self.set_apply_status(
                        &key,
                        ConfigurationState::ProvisioningAndChecking,
                        messages::PROVISIONING_AND_CHECKING,
                        None,
                    );
                }
                Err(OperatorError::ApplyJobNotCompleted)
            }
            failed => {
                let state = failed
                    .failure_state()
                    .unwrap_or(ConfigurationState::ApplyFailed);
                warn!("Apply job of {} failed ({}): {}", key, state, report.message);
                self.set_apply_status(&key, state, &report.message, None);
                Ok(ReconcileResult::done())
            }
        }
    }
}

/// Key-by-key comparison, case-insensitive on values
fn variables_differ(stored: &BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> bool {
    stored.len() != desired.len()
        || desired.iter().any(|(key, value)| {
            !stored
                .get(key)
                .is_some_and(|current| current.eq_ignore_ascii_case(value))
        })
}

#[async_trait]
impl Reconciler for ConfigurationReconciler {
    fn kind(&self) -> Kind {
        Kind::Configuration
    }

    #[instrument(skip(self), fields(configuration = %request))]
    async fn reconcile(&self, request: &Request) -> Result<ReconcileResult> {
        let key = request.key(Kind::Configuration);
        let Some(configuration) = self.store.get_by_key::<Configuration>(&key)? else {
            debug!("Configuration {} no longer exists", request);
            return Ok(ReconcileResult::done());
        };
        let meta = ConfigurationMeta::new(&configuration, &self.config);

        let result = match configuration.object_state() {
            ObjectState::Active => self.apply(&configuration, meta).await,
            ObjectState::Terminating => self.destroy(&configuration, meta).await,
        };
        match result {
            Err(e) if e.is_not_completed() => {
                debug!("{} for {}, checking again shortly", e, configuration.name_any());
                Ok(ReconcileResult::requeue_after(REQUEUE_DELAY))
            }
            other => other,
        }
    }
}
