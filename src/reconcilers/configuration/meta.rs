// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::config::Config;
use crate::constants::{bundle, names};
use crate::reconcilers::configuration::render::replace_terraform_source;
use crate::store::{Kind, ObjectKey};
use crate::types::{Configuration, ConfigurationType};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;

/// Which Terraform command a job runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionType {
    Apply,
    Destroy,
}

impl ExecutionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionType::Apply => "apply",
            ExecutionType::Destroy => "destroy",
        }
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything derived from a Configuration during one reconcile pass
#[derive(Clone, Debug)]
pub struct ConfigurationMeta {
    pub name: String,
    pub namespace: String,
    pub input_bundle_name: String,
    pub variable_secret_name: String,
    pub backend_secret_name: String,
    pub backend_namespace: String,
    pub apply_job_name: String,
    pub destroy_job_name: String,
    /// Remote source after the GitHub mirror rewrite
    pub remote_git: Option<String>,
    pub remote_git_path: String,
    pub delete_resource: bool,
    pub configuration_type: Option<ConfigurationType>,
    /// Rendered source including the backend block
    pub complete_configuration: String,
    pub configuration_changed: bool,
    pub env_changed: bool,
    pub credentials: BTreeMap<String, String>,
    /// Variables and credentials handed to the executor through the variable Secret
    pub variable_secret_data: BTreeMap<String, String>,
}

impl ConfigurationMeta {
    pub fn new(configuration: &Configuration, config: &Config) -> Self {
        let name = configuration.name_any();
        let spec = &configuration.spec;
        ConfigurationMeta {
            namespace: configuration.namespace().unwrap_or_default(),
            input_bundle_name: names::input_bundle(&name),
            variable_secret_name: names::variable_secret(&name),
            backend_secret_name: names::backend_secret(&name),
            backend_namespace: config.terraform_backend_namespace.clone(),
            apply_job_name: format!("{}-{}", name, ExecutionType::Apply),
            destroy_job_name: format!("{}-{}", name, ExecutionType::Destroy),
            remote_git: spec
                .remote
                .as_deref()
                .filter(|r| !r.is_empty())
                .map(|r| replace_terraform_source(r, config.github_blocked)),
            remote_git_path: spec
                .path
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ".".to_string()),
            delete_resource: spec.delete_resource,
            configuration_type: None,
            complete_configuration: String::new(),
            configuration_changed: false,
            env_changed: false,
            credentials: BTreeMap::new(),
            variable_secret_data: BTreeMap::new(),
            name,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(Kind::Configuration, self.namespace.clone(), self.name.clone())
    }

    pub fn job_name(&self, execution_type: ExecutionType) -> &str {
        match execution_type {
            ExecutionType::Apply => &self.apply_job_name,
            ExecutionType::Destroy => &self.destroy_job_name,
        }
    }

    /// File name the rendered source is stored under in the input bundle
    pub fn bundle_file(&self) -> &'static str {
        match self.configuration_type {
            Some(ConfigurationType::Json) => bundle::JSON_FILE,
            Some(ConfigurationType::Remote) => bundle::REMOTE_BACKEND_FILE,
            Some(ConfigurationType::Hcl) | None => bundle::HCL_FILE,
        }
    }

    pub fn bundle_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            self.bundle_file().to_string(),
            self.complete_configuration.clone(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_configuration;
    use crate::types::ConfigurationSpec;

    #[test]
    fn test_names_follow_conventions() {
        let configuration = make_configuration("demo", "web", ConfigurationSpec::default());
        let meta = ConfigurationMeta::new(&configuration, &Config::default());
        assert_eq!(meta.input_bundle_name, "tf-web");
        assert_eq!(meta.variable_secret_name, "variable-web");
        assert_eq!(meta.backend_secret_name, "tfstate-default-web");
        assert_eq!(meta.backend_namespace, "vela-system");
        assert_eq!(meta.job_name(ExecutionType::Apply), "web-apply");
        assert_eq!(meta.job_name(ExecutionType::Destroy), "web-destroy");
        assert_eq!(meta.key().to_string(), "Configuration/demo/web");
    }

    #[test]
    fn test_remote_path_defaults_to_current_dir() {
        let configuration = make_configuration(
            "demo",
            "web",
            ConfigurationSpec {
                remote: Some("https://github.com/kubevela-contrib/terraform-modules.git".to_string()),
                ..Default::default()
            },
        );
        let meta = ConfigurationMeta::new(&configuration, &Config::default());
        assert_eq!(meta.remote_git_path, ".");
        assert_eq!(
            meta.remote_git.as_deref(),
            Some("https://github.com/kubevela-contrib/terraform-modules.git")
        );
    }
}
