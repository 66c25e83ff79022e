// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolve Provider credentials into executor environment variables.

use crate::error::{OperatorError, Result};
use crate::kubernetes::secrets;
use crate::store::Store;
use crate::types::{CredentialsSource, Provider};
use async_trait::async_trait;
use kube::ResourceExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Turns a Provider into the environment its cloud's Terraform provider expects
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn get_credentials(
        &self,
        provider: &Provider,
        region: &str,
    ) -> Result<BTreeMap<String, String>>;
}

/// Clouds with a known credential layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloudProvider {
    Alibaba,
    Aws,
    Gcp,
    Azure,
    Custom,
    Hashicups,
}

impl FromStr for CloudProvider {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alibaba" => Ok(CloudProvider::Alibaba),
            "aws" => Ok(CloudProvider::Aws),
            "gcp" => Ok(CloudProvider::Gcp),
            "azure" => Ok(CloudProvider::Azure),
            "custom" => Ok(CloudProvider::Custom),
            "hashicups" => Ok(CloudProvider::Hashicups),
            other => Err(OperatorError::Credentials(format!(
                "unsupported provider {other:?}"
            ))),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HashicupsCredentials {
    hashicups_user: String,
    hashicups_password: String,
    hashicups_host: String,
}

#[derive(Deserialize)]
struct AlibabaCredentials {
    #[serde(rename = "accessKeyID")]
    access_key_id: String,
    #[serde(rename = "accessKeySecret")]
    access_key_secret: String,
    #[serde(rename = "securityToken", default)]
    security_token: String,
}

#[derive(Deserialize)]
struct AwsCredentials {
    #[serde(rename = "awsAccessKeyID")]
    access_key_id: String,
    #[serde(rename = "awsSecretAccessKey")]
    secret_access_key: String,
    #[serde(rename = "awsSessionToken", default)]
    session_token: String,
}

#[derive(Deserialize)]
struct GcpCredentials {
    #[serde(rename = "gcpCredentialsJSON")]
    credentials_json: String,
    #[serde(rename = "gcpProject")]
    project: String,
}

#[derive(Deserialize)]
struct AzureCredentials {
    #[serde(rename = "armClientID")]
    client_id: String,
    #[serde(rename = "armClientSecret")]
    client_secret: String,
    #[serde(rename = "armSubscriptionID")]
    subscription_id: String,
    #[serde(rename = "armTenantID")]
    tenant_id: String,
}

/// Map the YAML credential document of `cloud` to environment variables
pub fn credentials_env(
    cloud: CloudProvider,
    document: &str,
    region: &str,
) -> Result<BTreeMap<String, String>> {
    let env = match cloud {
        CloudProvider::Hashicups => {
            let c: HashicupsCredentials = parse(document)?;
            env(&[
                ("HASHICUPS_USERNAME", c.hashicups_user),
                ("HASHICUPS_PASSWORD", c.hashicups_password),
                ("HASHICUPS_HOST", c.hashicups_host),
            ])
        }
        CloudProvider::Alibaba => {
            let c: AlibabaCredentials = parse(document)?;
            env(&[
                ("ALICLOUD_ACCESS_KEY", c.access_key_id),
                ("ALICLOUD_SECRET_KEY", c.access_key_secret),
                ("ALICLOUD_REGION", region.to_string()),
                ("ALICLOUD_SECURITY_TOKEN", c.security_token),
            ])
        }
        CloudProvider::Aws => {
            let c: AwsCredentials = parse(document)?;
            env(&[
                ("AWS_ACCESS_KEY_ID", c.access_key_id),
                ("AWS_SECRET_ACCESS_KEY", c.secret_access_key),
                ("AWS_DEFAULT_REGION", region.to_string()),
                ("AWS_SESSION_TOKEN", c.session_token),
            ])
        }
        CloudProvider::Gcp => {
            let c: GcpCredentials = parse(document)?;
            env(&[
                ("GOOGLE_CREDENTIALS", c.credentials_json),
                ("GOOGLE_PROJECT", c.project),
                ("GOOGLE_REGION", region.to_string()),
            ])
        }
        CloudProvider::Azure => {
            let c: AzureCredentials = parse(document)?;
            env(&[
                ("ARM_CLIENT_ID", c.client_id),
                ("ARM_CLIENT_SECRET", c.client_secret),
                ("ARM_SUBSCRIPTION_ID", c.subscription_id),
                ("ARM_TENANT_ID", c.tenant_id),
            ])
        }
        CloudProvider::Custom => parse::<BTreeMap<String, String>>(document)?,
    };
    Ok(env)
}

fn parse<T: for<'de> Deserialize<'de>>(document: &str) -> Result<T> {
    serde_yaml::from_str(document).map_err(|e| {
        OperatorError::Credentials(format!(
            "failed to convert the credentials of Secret from Provider: {e}"
        ))
    })
}

fn env(pairs: &[(&str, String)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Reads credentials from the Secret key a Provider references
#[derive(Clone)]
pub struct SecretCredentialResolver {
    store: Arc<Store>,
}

impl SecretCredentialResolver {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialResolver for SecretCredentialResolver {
    #[instrument(skip(self, provider), fields(provider = %provider.name_any()))]
    async fn get_credentials(
        &self,
        provider: &Provider,
        region: &str,
    ) -> Result<BTreeMap<String, String>> {
        let credentials = &provider.spec.credentials;
        if credentials.source != CredentialsSource::Secret {
            return Err(OperatorError::Credentials(format!(
                "the credentials type {:?} is not supported",
                credentials.source
            )));
        }
        let secret_ref = credentials.secret_ref.as_ref().ok_or_else(|| {
            OperatorError::Credentials("provider has no secretRef".to_string())
        })?;
        let namespace = secret_ref
            .namespace
            .clone()
            .or_else(|| provider.namespace())
            .unwrap_or_else(|| "default".to_string());

        let secret = self
            .store
            .get_named(&namespace, &secret_ref.name)?
            .ok_or_else(|| {
                OperatorError::Credentials(format!(
                    "failed to get the Secret {}/{} from Provider",
                    namespace, secret_ref.name
                ))
            })?;
        let document = secrets::string_value(&secret, &secret_ref.key).ok_or_else(|| {
            OperatorError::Credentials(format!(
                "in the provider {}, the key {} not found in the referenced secret {}",
                provider.name_any(),
                secret_ref.key,
                secret_ref.name
            ))
        })?;

        let cloud: CloudProvider = provider.spec.provider.parse()?;
        let env = credentials_env(cloud, &document, region)?;
        debug!("Resolved {} credential variables", env.len());
        Ok(env)
    }
}
