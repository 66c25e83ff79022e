// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Finalizer gating physical removal of a Configuration until destroy cleanup ran
pub const CONFIGURATION_FINALIZER: &str = "configuration.finalizers.terraform-controller";

/// Fixed delay for expected "not ready yet" conditions
pub const REQUEUE_DELAY: Duration = Duration::from_secs(3);

/// Terraform workspace baked into backend secret names
pub const TERRAFORM_WORKSPACE: &str = "default";

/// Key under which the Terraform kubernetes backend stores state in its Secret
pub const TERRAFORM_STATE_KEY: &str = "tfstate";

/// Persisted object naming conventions
pub mod names {
    use super::TERRAFORM_WORKSPACE;

    /// Input bundle holding the last rendered Terraform source
    pub fn input_bundle(configuration: &str) -> String {
        format!("tf-{configuration}")
    }

    /// Secret holding variables and provider credentials for the execution job
    pub fn variable_secret(configuration: &str) -> String {
        format!("variable-{configuration}")
    }

    /// Secret written by the Terraform kubernetes backend
    pub fn backend_secret(configuration: &str) -> String {
        format!("tfstate-{TERRAFORM_WORKSPACE}-{configuration}")
    }

    pub fn cluster_role(namespace: &str) -> String {
        format!("{namespace}-tf-executor-clusterrole")
    }

    pub fn cluster_role_binding(namespace: &str) -> String {
        format!("{namespace}-tf-executor-clusterrole-binding")
    }

    pub const SERVICE_ACCOUNT: &str = "tf-executor-service-account";
}

/// Input bundle file names
pub mod bundle {
    pub const HCL_FILE: &str = "main.tf";
    pub const JSON_FILE: &str = "main.tf.json";
    pub const REMOTE_BACKEND_FILE: &str = "terraform-backend.tf";
}

/// Labels and annotations stamped on generated objects
pub mod labels {
    pub const CREATED_BY: &str = "terraform.core.oam.dev/created-by";
    pub const OWNED_BY: &str = "terraform.core.oam.dev/owned-by";
    pub const OWNED_NAMESPACE: &str = "terraform.core.oam.dev/owned-namespace";
    pub const INPUT_FINGERPRINT: &str = "terraform.core.oam.dev/input-fingerprint";
    pub const SIDECAR_INJECT: &str = "sidecar.istio.io/inject";
}

/// The operator name recorded as creator of generated objects
pub const OPERATOR_NAME: &str = "terraform-controller";

/// Provider referenced when a Configuration names none
pub mod provider {
    pub const DEFAULT_NAME: &str = "default";
    pub const DEFAULT_NAMESPACE: &str = "default";
}

/// Work queue rate limiting
pub mod rate_limit {
    use std::time::Duration;

    pub const BASE_DELAY: Duration = Duration::from_millis(5);
    pub const MAX_DELAY: Duration = Duration::from_secs(1000);
}

/// Status messages written by the Configuration reconciler
pub mod messages {
    pub const CLOUD_RESOURCE_DEPLOYED: &str = "Cloud resources are deployed and ready to use";
    pub const PROVISIONING_AND_CHECKING: &str =
        "Cloud resources are being provisioned and provisioning status is checking...";
    pub const RELOADING_AS_HCL_CHANGED: &str =
        "Configuration's HCL has changed, and starts reloading";
    pub const RELOADING_AS_VARIABLE_CHANGED: &str =
        "Configuration's variable has changed, and starts reloading";
    pub const DESTROYING: &str = "Cloud resources are being destroyed...";
    pub const DESTROYED: &str = "Cloud resources are destroyed";
    pub const GENERATE_OUTPUTS_FAILED: &str = "failed to generate outputs";
    pub const PROVIDER_NOT_FOUND: &str = "provider not found";
}
