// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::env;
use std::sync::LazyLock;

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)(Ki|Mi|Gi|Ti|Pi|Ei|[numkMGTPE]|[eE][+-]?\d+)?$")
        .expect("quantity pattern is valid")
});

/// Compute resources applied to the Terraform executor container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorResources {
    pub limits_cpu: Option<String>,
    pub limits_memory: Option<String>,
    pub requests_cpu: Option<String>,
    pub requests_memory: Option<String>,
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Image running `terraform init/apply/destroy`
    pub terraform_image: String,
    pub busybox_image: String,
    pub git_image: String,
    /// Namespace the Terraform kubernetes backend writes its state Secret to
    pub terraform_backend_namespace: String,
    /// Rewrite GitHub remotes to the Gitee mirror
    pub github_blocked: bool,
    pub resources: ExecutorResources,
    /// Seed sample objects into the store on startup
    pub bootstrap_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            terraform_image: "oamdev/docker-terraform:1.1.2".to_string(),
            busybox_image: "busybox:latest".to_string(),
            git_image: "alpine/git:latest".to_string(),
            terraform_backend_namespace: "vela-system".to_string(),
            github_blocked: false,
            resources: ExecutorResources::default(),
            bootstrap_demo: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();
        let string_or = |name: &str, default: String| {
            lookup(name).filter(|v| !v.is_empty()).unwrap_or(default)
        };
        let flag = |name: &str| -> Result<bool> {
            match lookup(name).filter(|v| !v.is_empty()) {
                Some(v) => v
                    .parse()
                    .with_context(|| format!("{name} must be true or false, got {v:?}")),
                None => Ok(false),
            }
        };
        let quantity = |name: &str| -> Result<Option<String>> {
            match lookup(name).filter(|v| !v.is_empty()) {
                Some(v) if QUANTITY.is_match(&v) => Ok(Some(v)),
                Some(v) => bail!("failed to parse {name}={v:?} as a resource quantity"),
                None => Ok(None),
            }
        };

        Ok(Config {
            terraform_image: string_or("TERRAFORM_IMAGE", defaults.terraform_image),
            busybox_image: string_or("BUSYBOX_IMAGE", defaults.busybox_image),
            git_image: string_or("GIT_IMAGE", defaults.git_image),
            terraform_backend_namespace: string_or(
                "TERRAFORM_BACKEND_NAMESPACE",
                defaults.terraform_backend_namespace,
            ),
            github_blocked: flag("GITHUB_BLOCKED")?,
            resources: ExecutorResources {
                limits_cpu: quantity("RESOURCES_LIMITS_CPU")?,
                limits_memory: quantity("RESOURCES_LIMITS_MEMORY")?,
                requests_cpu: quantity("RESOURCES_REQUESTS_CPU")?,
                requests_memory: quantity("RESOURCES_REQUESTS_MEMORY")?,
            },
            bootstrap_demo: flag("BOOTSTRAP_DEMO")?,
        })
    }
}
