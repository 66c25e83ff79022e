// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::provider::{DEFAULT_NAME, DEFAULT_NAMESPACE};
use crate::types::reference::{Reference, SecretReference};
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "terraform.core.oam.dev", version = "v1beta1", kind = "Configuration")]
#[kube(namespaced)]
#[kube(status = "ConfigurationStatus")]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    /// Inline Terraform HCL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcl: Option<String>,
    /// Inline Terraform JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
    /// Git repository holding the Terraform sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Sub-directory of the remote repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Terraform input variables as a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<serde_json::Value>,
    #[serde(
        default,
        rename = "writeConnectionSecretToRef",
        skip_serializing_if = "Option::is_none"
    )]
    pub write_connection_secret_to_ref: Option<SecretReference>,
    #[serde(default, rename = "providerRef", skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<Reference>,
    /// Run `terraform destroy` when the Configuration is deleted
    #[serde(default = "default_delete_resource")]
    pub delete_resource: bool,
    /// Overrides the region of the referenced Provider
    #[serde(default, rename = "customRegion", skip_serializing_if = "Option::is_none")]
    pub custom_region: Option<String>,
}

fn default_delete_resource() -> bool {
    true
}

impl Default for ConfigurationSpec {
    fn default() -> Self {
        ConfigurationSpec {
            hcl: None,
            json: None,
            remote: None,
            path: None,
            variable: None,
            write_connection_secret_to_ref: None,
            provider_ref: None,
            delete_resource: default_delete_resource(),
            custom_region: None,
        }
    }
}

/// Where the Terraform sources of a Configuration come from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigurationType {
    Hcl,
    Json,
    Remote,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum ConfigurationState {
    Authorizing,
    ProviderNotReady,
    #[serde(rename = "ConfigurationSpecNotValid")]
    StaticCheckFailed,
    Available,
    ProvisioningAndChecking,
    Destroying,
    DestroyFailed,
    Destroyed,
    #[serde(rename = "ConfigurationReloading")]
    Reloading,
    #[serde(rename = "GeneratingTerraformOutputs")]
    GeneratingOutputs,
    InvalidRegion,
    TerraformInitError,
    ApplyFailed,
}

impl ConfigurationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigurationState::Authorizing => "Authorizing",
            ConfigurationState::ProviderNotReady => "ProviderNotReady",
            ConfigurationState::StaticCheckFailed => "ConfigurationSpecNotValid",
            ConfigurationState::Available => "Available",
            ConfigurationState::ProvisioningAndChecking => "ProvisioningAndChecking",
            ConfigurationState::Destroying => "Destroying",
            ConfigurationState::DestroyFailed => "DestroyFailed",
            ConfigurationState::Destroyed => "Destroyed",
            ConfigurationState::Reloading => "ConfigurationReloading",
            ConfigurationState::GeneratingOutputs => "GeneratingTerraformOutputs",
            ConfigurationState::InvalidRegion => "InvalidRegion",
            ConfigurationState::TerraformInitError => "TerraformInitError",
            ConfigurationState::ApplyFailed => "ApplyFailed",
        }
    }
}

impl fmt::Display for ConfigurationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Terraform output rendered as a string
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct Property {
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ConfigurationState>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Property>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DestroyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ConfigurationState>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    /// Generation the apply status was last computed for
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub apply: ApplyStatus,
    #[serde(default)]
    pub destroy: DestroyStatus,
}

impl Configuration {
    /// Namespace and name of the referenced Provider, defaulting to `default/default`
    pub fn provider_reference(&self) -> (String, String) {
        match &self.spec.provider_ref {
            Some(r) => (
                r.namespace
                    .clone()
                    .filter(|ns| !ns.is_empty())
                    .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
                r.name.clone(),
            ),
            None => (DEFAULT_NAMESPACE.to_string(), DEFAULT_NAME.to_string()),
        }
    }

    /// Namespace and name of the Secret receiving outputs, if one is requested
    pub fn connection_secret_reference(&self) -> Option<(String, String)> {
        self.spec
            .write_connection_secret_to_ref
            .as_ref()
            .filter(|r| !r.name.is_empty())
            .map(|r| {
                (
                    r.namespace
                        .clone()
                        .filter(|ns| !ns.is_empty())
                        .unwrap_or_else(|| "default".to_string()),
                    r.name.clone(),
                )
            })
    }

    pub fn apply_state(&self) -> Option<ConfigurationState> {
        self.status.as_ref().and_then(|s| s.apply.state)
    }

    pub fn destroy_state(&self) -> Option<ConfigurationState> {
        self.status.as_ref().and_then(|s| s.destroy.state)
    }

    /// Status with both apply and destroy records present
    pub fn status_or_default(&self) -> ConfigurationStatus {
        self.status.clone().unwrap_or_default()
    }

    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn make_configuration(spec: ConfigurationSpec) -> Configuration {
        Configuration {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("demo".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    #[test]
    fn test_provider_reference_defaults() {
        let configuration = make_configuration(ConfigurationSpec::default());
        assert_eq!(
            configuration.provider_reference(),
            ("default".to_string(), "default".to_string())
        );
    }

    #[test]
    fn test_provider_reference_without_namespace() {
        let configuration = make_configuration(ConfigurationSpec {
            provider_ref: Some(Reference {
                name: "aws".to_string(),
                namespace: None,
            }),
            ..Default::default()
        });
        assert_eq!(
            configuration.provider_reference(),
            ("default".to_string(), "aws".to_string())
        );
    }

    #[test]
    fn test_connection_secret_reference_defaults_namespace() {
        let configuration = make_configuration(ConfigurationSpec {
            write_connection_secret_to_ref: Some(SecretReference {
                name: "web-conn".to_string(),
                namespace: None,
            }),
            ..Default::default()
        });
        assert_eq!(
            configuration.connection_secret_reference(),
            Some(("default".to_string(), "web-conn".to_string()))
        );
    }

    #[test]
    fn test_connection_secret_reference_ignores_empty_name() {
        let configuration = make_configuration(ConfigurationSpec {
            write_connection_secret_to_ref: Some(SecretReference::default()),
            ..Default::default()
        });
        assert_eq!(configuration.connection_secret_reference(), None);
    }

    #[test]
    fn test_delete_resource_defaults_to_true() {
        let spec: ConfigurationSpec =
            serde_json::from_value(serde_json::json!({"hcl": "resource \"x\" \"y\" {}"})).unwrap();
        assert!(spec.delete_resource);
    }

    #[test]
    fn test_state_wire_names_match_display() {
        for state in [
            ConfigurationState::StaticCheckFailed,
            ConfigurationState::Reloading,
            ConfigurationState::GeneratingOutputs,
            ConfigurationState::Available,
        ] {
            let wire = serde_json::to_string(&state).unwrap();
            assert_eq!(wire, format!("\"{}\"", state));
        }
    }

    #[test]
    fn test_status_or_default_has_both_records() {
        let configuration = make_configuration(ConfigurationSpec::default());
        let status = configuration.status_or_default();
        assert_eq!(status.apply, ApplyStatus::default());
        assert_eq!(status.destroy, DestroyStatus::default());
        assert_eq!(configuration.apply_state(), None);
    }
}
