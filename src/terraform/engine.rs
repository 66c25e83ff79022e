// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Boundary to whatever runs the Terraform jobs.

use crate::error::Result;
use crate::store::{Kind, ObjectKey, Store};
use crate::types::{Configuration, ConfigurationState, Provider};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Execution progress of a Terraform job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Provisioning,
    InitError,
    ApplyError,
    InvalidRegion,
    Succeeded,
}

impl JobState {
    /// Apply status a terminal failure is surfaced as
    pub fn failure_state(self) -> Option<ConfigurationState> {
        match self {
            JobState::InitError => Some(ConfigurationState::TerraformInitError),
            JobState::ApplyError => Some(ConfigurationState::ApplyFailed),
            JobState::InvalidRegion => Some(ConfigurationState::InvalidRegion),
            JobState::Provisioning | JobState::Succeeded => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobStatusReport {
    pub state: JobState,
    pub message: String,
}

impl JobStatusReport {
    pub fn new(state: JobState, message: impl Into<String>) -> Self {
        JobStatusReport {
            state,
            message: message.into(),
        }
    }
}

/// Reference to a triggered job
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub namespace: String,
    pub name: String,
}

impl JobHandle {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        JobHandle {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(Kind::Job, self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn trigger_job(&self, job: Job) -> Result<JobHandle>;

    async fn get_status(&self, job: &JobHandle) -> Result<JobStatusReport>;

    /// Whether the Configuration can go away without running `terraform destroy`
    async fn is_deletable(&self, configuration: &Configuration) -> Result<bool>;
}

/// Runs jobs by handing them to the object store, where an external
/// executor picks them up and reports back through the Job status.
#[derive(Clone)]
pub struct StoreExecutionEngine {
    store: Arc<Store>,
}

impl StoreExecutionEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

/// Condition reasons the executor uses to classify failures
pub mod reasons {
    pub const INVALID_REGION: &str = "InvalidRegion";
    pub const INIT_ERROR: &str = "InitError";
}

/// Map a Job's status onto the execution progress
pub fn job_status(job: &Job) -> JobStatusReport {
    let Some(status) = job.status.as_ref() else {
        return JobStatusReport::new(JobState::Provisioning, "");
    };
    if status.succeeded.unwrap_or(0) > 0 {
        return JobStatusReport::new(JobState::Succeeded, "");
    }
    let failed = status
        .conditions
        .iter()
        .flatten()
        .find(|c| c.type_ == "Failed" && c.status == "True");
    match failed {
        Some(condition) => {
            let state = match condition.reason.as_deref() {
                Some(reasons::INVALID_REGION) => JobState::InvalidRegion,
                Some(reasons::INIT_ERROR) => JobState::InitError,
                _ => JobState::ApplyError,
            };
            JobStatusReport::new(state, condition.message.clone().unwrap_or_default())
        }
        None => JobStatusReport::new(JobState::Provisioning, ""),
    }
}

#[async_trait]
impl ExecutionEngine for StoreExecutionEngine {
    #[instrument(skip(self, job), fields(job = %job.name_any()))]
    async fn trigger_job(&self, job: Job) -> Result<JobHandle> {
        let handle = JobHandle::new(job.namespace().unwrap_or_default(), job.name_any());
        self.store.add(job)?;
        info!("Triggered job {}", handle);
        Ok(handle)
    }

    async fn get_status(&self, job: &JobHandle) -> Result<JobStatusReport> {
        match self.store.get_by_key::<Job>(&job.key())? {
            Some(found) => Ok(job_status(&found)),
            None => {
                debug!("Job {} has not been observed yet", job);
                Ok(JobStatusReport::new(JobState::Provisioning, "job not observed yet"))
            }
        }
    }

    async fn is_deletable(&self, configuration: &Configuration) -> Result<bool> {
        let (namespace, name) = configuration.provider_reference();
        let provider: Option<Provider> = self.store.get_named(&namespace, &name)?;
        let provider_ready = provider.as_ref().is_some_and(Provider::is_ready);
        if !provider_ready {
            debug!("Provider {}/{} is absent or not ready, nothing was provisioned", namespace, name);
            return Ok(true);
        }
        let provisioned = matches!(
            configuration.apply_state(),
            Some(
                ConfigurationState::ProvisioningAndChecking
                    | ConfigurationState::Available
                    | ConfigurationState::GeneratingOutputs
                    | ConfigurationState::ApplyFailed
                    | ConfigurationState::Reloading
            )
        );
        Ok(!provisioned)
    }
}
