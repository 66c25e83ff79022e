// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired shape of the Terraform executor Job and when to replace it.

use crate::config::{Config, ExecutorResources};
use crate::constants::{labels, names, OPERATOR_NAME};
use crate::reconcilers::configuration::meta::{ConfigurationMeta, ExecutionType};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EmptyDirVolumeSource, EnvVar, EnvVarSource, PodSpec,
    PodTemplateSpec, ResourceRequirements, SecretKeySelector, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ObjectMeta;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const WORKING_DIR: &str = "/data";
const INPUT_VOLUME: &str = "tf-input-configuration";
const INPUT_MOUNT: &str = "/opt/tf-configuration";
const BACKEND_VOLUME: &str = "tf-backend";
const BACKEND_MOUNT: &str = "/opt/tf-backend";

/// What to do with the executor Job of one execution type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobPlan {
    Trigger,
    Recreate,
    Unchanged,
}

/// Decide whether the existing Job still matches the desired inputs
pub fn plan(meta: &ConfigurationMeta, existing: Option<&Job>, desired: &Job) -> JobPlan {
    let Some(existing) = existing else {
        return JobPlan::Trigger;
    };
    if meta.configuration_changed || meta.env_changed {
        return JobPlan::Recreate;
    }
    if fingerprint_of(existing) != fingerprint_of(desired) {
        return JobPlan::Recreate;
    }
    JobPlan::Unchanged
}

fn fingerprint_of(job: &Job) -> Option<&String> {
    job.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(labels::INPUT_FINGERPRINT))
}

/// Hash of everything the executor consumes
pub fn input_fingerprint(meta: &ConfigurationMeta) -> String {
    let mut hasher = Sha256::new();
    hasher.update(meta.complete_configuration.as_bytes());
    if let Some(remote) = &meta.remote_git {
        hasher.update(remote.as_bytes());
        hasher.update(meta.remote_git_path.as_bytes());
    }
    // values are folded the same way the variable Secret diff compares them
    for (key, value) in &meta.variable_secret_data {
        hasher.update(key.as_bytes());
        hasher.update([0]);
        hasher.update(value.to_ascii_lowercase().as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}

/// Labels identifying objects generated on behalf of a Configuration
pub fn owner_labels(meta: &ConfigurationMeta) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::CREATED_BY.to_string(), OPERATOR_NAME.to_string()),
        (labels::OWNED_BY.to_string(), meta.name.clone()),
        (labels::OWNED_NAMESPACE.to_string(), meta.namespace.clone()),
    ])
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn shell(command: String) -> Option<Vec<String>> {
    Some(vec!["sh".to_string(), "-c".to_string(), command])
}

fn resources(config: &ExecutorResources) -> Option<ResourceRequirements> {
    let collect = |cpu: &Option<String>, memory: &Option<String>| {
        let map: BTreeMap<String, Quantity> = [("cpu", cpu), ("memory", memory)]
            .into_iter()
            .filter_map(|(name, value)| {
                value.as_ref().map(|v| (name.to_string(), Quantity(v.clone())))
            })
            .collect();
        (!map.is_empty()).then_some(map)
    };
    let limits = collect(&config.limits_cpu, &config.limits_memory);
    let requests = collect(&config.requests_cpu, &config.requests_memory);
    if limits.is_none() && requests.is_none() {
        return None;
    }
    Some(ResourceRequirements {
        limits,
        requests,
        ..Default::default()
    })
}

/// Build the Job running `terraform <execution_type>` for a Configuration
pub fn desired_job(meta: &ConfigurationMeta, config: &Config, execution_type: ExecutionType) -> Job {
    let working_volume = meta.name.clone();

    let mut init_containers = vec![Container {
        name: "prepare-input-terraform-configurations".to_string(),
        image: Some(config.busybox_image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: shell(format!("cp {INPUT_MOUNT}/* {WORKING_DIR}")),
        volume_mounts: Some(vec![
            mount(&working_volume, WORKING_DIR),
            mount(INPUT_VOLUME, INPUT_MOUNT),
        ]),
        ..Default::default()
    }];
    if let Some(remote) = &meta.remote_git {
        init_containers.push(Container {
            name: "git-configuration".to_string(),
            image: Some(config.git_image.clone()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: shell(format!(
                "git clone {remote} {BACKEND_MOUNT} && cp -r {BACKEND_MOUNT}/{}/* {WORKING_DIR}",
                meta.remote_git_path
            )),
            volume_mounts: Some(vec![
                mount(&working_volume, WORKING_DIR),
                mount(BACKEND_VOLUME, BACKEND_MOUNT),
            ]),
            ..Default::default()
        });
    }
    init_containers.push(Container {
        name: "terraform-init".to_string(),
        image: Some(config.terraform_image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: shell("terraform init".to_string()),
        working_dir: Some(WORKING_DIR.to_string()),
        volume_mounts: Some(vec![mount(&working_volume, WORKING_DIR)]),
        env: Some(env(meta)),
        ..Default::default()
    });

    let executor = Container {
        name: "terraform-executor".to_string(),
        image: Some(config.terraform_image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec![
            "bash".to_string(),
            "-c".to_string(),
            format!("terraform {execution_type} -lock=false -auto-approve"),
        ]),
        working_dir: Some(WORKING_DIR.to_string()),
        volume_mounts: Some(vec![mount(&working_volume, WORKING_DIR)]),
        env: Some(env(meta)),
        resources: resources(&config.resources),
        ..Default::default()
    };

    let volumes = vec![
        Volume {
            name: working_volume,
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
        Volume {
            name: INPUT_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: meta.input_bundle_name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: BACKEND_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ];

    Job {
        metadata: ObjectMeta {
            name: Some(meta.job_name(execution_type).to_string()),
            namespace: Some(meta.namespace.clone()),
            labels: Some(owner_labels(meta)),
            annotations: Some(BTreeMap::from([(
                labels::INPUT_FINGERPRINT.to_string(),
                input_fingerprint(meta),
            )])),
            ..Default::default()
        },
        spec: Some(JobSpec {
            parallelism: Some(1),
            completions: Some(1),
            backoff_limit: Some(i32::MAX),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    annotations: Some(BTreeMap::from([(
                        labels::SIDECAR_INJECT.to_string(),
                        "false".to_string(),
                    )])),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    init_containers: Some(init_containers),
                    containers: vec![executor],
                    restart_policy: Some("OnFailure".to_string()),
                    service_account_name: Some(names::SERVICE_ACCOUNT.to_string()),
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

/// Every variable is read from the variable Secret rather than inlined
fn env(meta: &ConfigurationMeta) -> Vec<EnvVar> {
    meta.variable_secret_data
        .keys()
        .map(|key| EnvVar {
            name: key.clone(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: meta.variable_secret_name.clone(),
                    key: key.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
}
