// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Shape validation and rendering of the Terraform input bundle.

use crate::error::{OperatorError, Result};
use crate::terraform::values::variable_env;
use crate::types::{ConfigurationSpec, ConfigurationType};
use serde_json::{json, Map, Value};
use url::Url;

const GITHUB_MIRROR: &str = "https://gitee.com/kubevela-terraform-modules";

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Determine the source type, rejecting anything but exactly one source
pub fn validate(spec: &ConfigurationSpec) -> Result<ConfigurationType> {
    let sources = [
        (present(&spec.hcl), ConfigurationType::Hcl),
        (present(&spec.json), ConfigurationType::Json),
        (present(&spec.remote), ConfigurationType::Remote),
    ];
    let mut set = sources.iter().filter(|(p, _)| *p).map(|(_, t)| *t);
    let configuration_type = match (set.next(), set.next()) {
        (Some(t), None) => t,
        (None, _) => {
            return Err(OperatorError::Validation(
                "spec.hcl, spec.json or spec.remote should be set".to_string(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(OperatorError::Validation(
                "only one of spec.hcl, spec.json or spec.remote can be set".to_string(),
            ))
        }
    };

    match configuration_type {
        ConfigurationType::Json => {
            let json = spec.json.as_deref().unwrap_or_default();
            match serde_json::from_str::<Value>(json) {
                Ok(Value::Object(mut document)) => {
                    if terraform_block_mut(&mut document).is_none() {
                        return Err(OperatorError::Validation(
                            "spec.json terraform block must be an object or a list of objects"
                                .to_string(),
                        ));
                    }
                }
                Ok(_) => {
                    return Err(OperatorError::Validation(
                        "spec.json must be a JSON object".to_string(),
                    ))
                }
                Err(e) => {
                    return Err(OperatorError::Validation(format!(
                        "spec.json is not valid JSON: {e}"
                    )))
                }
            }
        }
        ConfigurationType::Remote => {
            let remote = spec.remote.as_deref().unwrap_or_default();
            Url::parse(remote).map_err(|e| {
                OperatorError::Validation(format!("spec.remote {remote:?} is not a valid URL: {e}"))
            })?;
        }
        ConfigurationType::Hcl => {}
    }

    variable_env(spec.variable.as_ref())?;
    Ok(configuration_type)
}

fn backend_block(name: &str, backend_namespace: &str) -> String {
    format!(
        r#"
terraform {{
  backend "kubernetes" {{
    secret_suffix     = "{name}"
    in_cluster_config = true
    namespace         = "{backend_namespace}"
  }}
}}
"#
    )
}

/// The `terraform` block of a JSON document, created when absent.
/// The list form resolves to its first element.
fn terraform_block_mut(document: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    let block = document
        .entry("terraform")
        .or_insert_with(|| Value::Object(Map::new()));
    match block {
        Value::Object(terraform) => Some(terraform),
        Value::Array(blocks) => {
            if blocks.is_empty() {
                blocks.push(Value::Object(Map::new()));
            }
            blocks.first_mut().and_then(Value::as_object_mut)
        }
        _ => None,
    }
}

/// Render the complete source with the kubernetes state backend injected
pub fn render(
    spec: &ConfigurationSpec,
    configuration_type: ConfigurationType,
    name: &str,
    backend_namespace: &str,
) -> Result<String> {
    match configuration_type {
        ConfigurationType::Hcl => {
            let hcl = spec.hcl.as_deref().unwrap_or_default();
            Ok(format!("{}\n{}", hcl, backend_block(name, backend_namespace)))
        }
        ConfigurationType::Remote => Ok(backend_block(name, backend_namespace)),
        ConfigurationType::Json => {
            let mut document: Map<String, Value> =
                serde_json::from_str(spec.json.as_deref().unwrap_or_default())?;
            let backend = json!({
                "kubernetes": {
                    "secret_suffix": name,
                    "in_cluster_config": true,
                    "namespace": backend_namespace,
                }
            });
            let terraform = terraform_block_mut(&mut document).ok_or_else(|| {
                OperatorError::Validation(
                    "spec.json terraform block must be an object or a list of objects".to_string(),
                )
            })?;
            terraform.insert("backend".to_string(), backend);
            Ok(serde_json::to_string_pretty(&Value::Object(document))?)
        }
    }
}

/// Point GitHub remotes at the Gitee mirror when GitHub is unreachable
pub fn replace_terraform_source(remote: &str, github_blocked: bool) -> String {
    if !github_blocked {
        return remote.to_string();
    }
    let Ok(url) = Url::parse(remote) else {
        return remote.to_string();
    };
    if url.host_str() != Some("github.com") {
        return remote.to_string();
    }
    match url.path_segments().and_then(|s| s.filter(|p| !p.is_empty()).last()) {
        Some(repo) => format!("{GITHUB_MIRROR}/{repo}"),
        None => remote.to_string(),
    }
}
