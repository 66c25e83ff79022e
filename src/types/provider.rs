// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::reference::SecretKeySelector;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "terraform.core.oam.dev", version = "v1beta1", kind = "Provider")]
#[kube(namespaced)]
#[kube(status = "ProviderStatus")]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Cloud the credentials belong to, e.g. `aws` or `hashicups`
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub credentials: ProviderCredentials,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    pub source: CredentialsSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub enum CredentialsSource {
    #[default]
    Secret,
    None,
    InjectedIdentity,
    Environment,
    Filesystem,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum ProviderState {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "ProviderNotReady")]
    NotReady,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ProviderState>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Provider {
    /// Check if the provider has validated its credentials
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.state == Some(ProviderState::Ready))
    }

    /// Check if the provider has been reconciled and reported a failure
    pub fn is_not_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.state == Some(ProviderState::NotReady))
    }

    pub fn status_message(&self) -> &str {
        self.status.as_ref().map(|s| s.message.as_str()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn make_provider(status: Option<ProviderStatus>) -> Provider {
        Provider {
            metadata: ObjectMeta {
                name: Some("aws".to_string()),
                namespace: Some("demo".to_string()),
                ..Default::default()
            },
            spec: ProviderSpec {
                provider: "aws".to_string(),
                region: Some("us-east-1".to_string()),
                credentials: ProviderCredentials::default(),
            },
            status,
        }
    }

    #[test]
    fn test_is_ready_with_ready_state() {
        let provider = make_provider(Some(ProviderStatus {
            state: Some(ProviderState::Ready),
            message: String::new(),
        }));
        assert!(provider.is_ready());
        assert!(!provider.is_not_ready());
    }

    #[test]
    fn test_is_ready_without_status() {
        let provider = make_provider(None);
        assert!(!provider.is_ready());
        assert!(!provider.is_not_ready());
    }

    #[test]
    fn test_not_ready_exposes_message() {
        let provider = make_provider(Some(ProviderStatus {
            state: Some(ProviderState::NotReady),
            message: "secret missing".to_string(),
        }));
        assert!(provider.is_not_ready());
        assert_eq!(provider.status_message(), "secret missing");
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProviderState::Ready).unwrap(),
            "\"ready\""
        );
        assert_eq!(
            serde_json::to_string(&ProviderState::NotReady).unwrap(),
            "\"ProviderNotReady\""
        );
    }

    #[test]
    fn test_spec_deserializes_secret_ref() {
        let spec: ProviderSpec = serde_json::from_value(serde_json::json!({
            "provider": "hashicups",
            "credentials": {
                "source": "Secret",
                "secretRef": {"name": "creds", "namespace": "hashicups", "key": "credentials"}
            }
        }))
        .unwrap();
        let secret_ref = spec.credentials.secret_ref.unwrap();
        assert_eq!(spec.credentials.source, CredentialsSource::Secret);
        assert_eq!(secret_ref.key, "credentials");
        assert_eq!(secret_ref.namespace.as_deref(), Some("hashicups"));
    }
}
