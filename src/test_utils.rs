// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: scripted collaborators and object fixtures.

use crate::constants::labels;
use crate::error::{OperatorError, Result};
use crate::provider::CredentialResolver;
use crate::store::Store;
use crate::terraform::{ExecutionEngine, JobHandle, JobState, JobStatusReport};
use crate::types::{
    Configuration, ConfigurationSpec, ConfigurationState, Provider, ProviderCredentials, ProviderSpec, ProviderState,
    ProviderStatus, SecretKeySelector,
};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Credential resolver returning a fixed answer
pub struct FakeCredentialResolver {
    answer: Mutex<std::result::Result<BTreeMap<String, String>, String>>,
    calls: AtomicUsize,
}

impl FakeCredentialResolver {
    pub fn ok(credentials: &[(&str, &str)]) -> Self {
        let map = credentials
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            answer: Mutex::new(Ok(map)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Mutex::new(Err(message.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_credentials(&self, credentials: &[(&str, &str)]) {
        *self.answer.lock().unwrap() = Ok(credentials
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialResolver for FakeCredentialResolver {
    async fn get_credentials(
        &self,
        _provider: &Provider,
        _region: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .lock()
            .unwrap()
            .clone()
            .map_err(OperatorError::Credentials)
    }
}

/// Execution engine that records triggered jobs in the store and reports scripted statuses
pub struct FakeExecutionEngine {
    store: Arc<Store>,
    statuses: Mutex<HashMap<String, JobStatusReport>>,
    triggered: Mutex<Vec<Job>>,
    destroy_states: Mutex<Vec<Option<ConfigurationState>>>,
    deletable: AtomicBool,
}

impl FakeExecutionEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            statuses: Mutex::new(HashMap::new()),
            triggered: Mutex::new(Vec::new()),
            destroy_states: Mutex::new(Vec::new()),
            deletable: AtomicBool::new(false),
        }
    }

    pub fn set_status(&self, job_name: &str, state: JobState, message: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_name.to_string(), JobStatusReport::new(state, message));
    }

    pub fn set_deletable(&self, deletable: bool) {
        self.deletable.store(deletable, Ordering::SeqCst);
    }

    pub fn triggered(&self) -> Vec<Job> {
        self.triggered.lock().unwrap().clone()
    }

    /// Destroy state of the owning Configuration at each status poll
    pub fn destroy_states_seen(&self) -> Vec<Option<ConfigurationState>> {
        self.destroy_states.lock().unwrap().clone()
    }

    pub fn triggered_names(&self) -> Vec<String> {
        self.triggered().iter().map(|j| j.name_any()).collect()
    }
}

#[async_trait]
impl ExecutionEngine for FakeExecutionEngine {
    async fn trigger_job(&self, job: Job) -> Result<JobHandle> {
        let handle = JobHandle::new(job.namespace().unwrap_or_default(), job.name_any());
        self.triggered.lock().unwrap().push(job.clone());
        self.store.add(job)?;
        Ok(handle)
    }

    async fn get_status(&self, job: &JobHandle) -> Result<JobStatusReport> {
        let owner = self
            .store
            .get_by_key::<Job>(&job.key())?
            .and_then(|j| j.labels().get(labels::OWNED_BY).cloned());
        if let Some(owner) = owner {
            let configuration: Option<Configuration> = self.store.get_named(&job.namespace, &owner)?;
            self.destroy_states
                .lock()
                .unwrap()
                .push(configuration.and_then(|c| c.destroy_state()));
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(&job.name)
            .cloned()
            .unwrap_or_else(|| JobStatusReport::new(JobState::Provisioning, "")))
    }

    async fn is_deletable(&self, _configuration: &Configuration) -> Result<bool> {
        Ok(self.deletable.load(Ordering::SeqCst))
    }
}

pub fn make_configuration(namespace: &str, name: &str, spec: ConfigurationSpec) -> Configuration {
    let mut configuration = Configuration::new(name, spec);
    configuration.metadata.namespace = Some(namespace.to_string());
    configuration
}

pub fn make_hcl_configuration(namespace: &str, name: &str, hcl: &str) -> Configuration {
    make_configuration(
        namespace,
        name,
        ConfigurationSpec {
            hcl: Some(hcl.to_string()),
            ..Default::default()
        },
    )
}

/// The `default/default` Provider, optionally already validated
pub fn make_provider(cloud: &str, state: Option<ProviderState>) -> Provider {
    let mut provider = Provider::new(
        "default",
        ProviderSpec {
            provider: cloud.to_string(),
            region: None,
            credentials: ProviderCredentials {
                secret_ref: Some(SecretKeySelector {
                    name: format!("{cloud}-account-creds"),
                    namespace: Some("vela-system".to_string()),
                    key: "credentials".to_string(),
                }),
                ..Default::default()
            },
        },
    );
    provider.metadata.namespace = Some("default".to_string());
    provider.status = state.map(|state| ProviderStatus {
        state: Some(state),
        message: String::new(),
    });
    provider
}
