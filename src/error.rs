// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::store::{Kind, ObjectKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("couldn't create key for {kind} object: {reason}")]
    KeyError { kind: Kind, reason: String },

    #[error("object {key} is stored as {actual}, not {expected}")]
    KindMismatch {
        key: ObjectKey,
        expected: Kind,
        actual: Kind,
    },

    #[error("Configuration is invalid: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Credentials are not retrieved from referenced Provider: {0}")]
    Credentials(String),

    #[error("Terraform state error: {0}")]
    State(String),

    #[error(
        "configuration {namespace}/{name} cannot update secret {secret_namespace}/{secret_name} \
         owned by configuration {owner_namespace}/{owner_name}"
    )]
    OutputSecretConflict {
        namespace: String,
        name: String,
        secret_namespace: String,
        secret_name: String,
        owner_namespace: String,
        owner_name: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("configuration apply isn't completed")]
    ApplyJobNotCompleted,

    #[error("configuration deletion isn't completed")]
    DestroyJobNotCompleted,
}

impl OperatorError {
    /// Expected progress states that are retried on a fixed delay instead of backing off.
    pub fn is_not_completed(&self) -> bool {
        matches!(
            self,
            OperatorError::ApplyJobNotCompleted | OperatorError::DestroyJobNotCompleted
        )
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
