// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use tf_operator::config::Config;
use tf_operator::controllers::{shutdown_signal, Controller, Manager};
use tf_operator::kubernetes::secrets::make_secret;
use tf_operator::provider::SecretCredentialResolver;
use tf_operator::reconcilers::{ConfigurationReconciler, ProviderReconciler};
use tf_operator::store::Store;
use tf_operator::terraform::StoreExecutionEngine;
use tf_operator::types::{
    Configuration, ConfigurationSpec, Provider, ProviderCredentials, ProviderSpec,
    SecretKeySelector,
};

const DEMO_HCL: &str = r#"terraform {
  required_providers {
    hashicups = {
      source = "hashicorp-demoapp/hashicups"
    }
  }
}

resource "hashicups_order" "edu" {
  items {
    coffee {
      id = 3
    }
    quantity = 3
  }
}

output "edu_order" {
  value = hashicups_order.edu.id
}
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Terraform operator");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        "Configuration loaded: terraform_image={}, backend_namespace={}",
        config.terraform_image, config.terraform_backend_namespace
    );

    let store = Arc::new(Store::new());
    let resolver = Arc::new(SecretCredentialResolver::new(store.clone()));
    let engine = Arc::new(StoreExecutionEngine::new(store.clone()));

    let provider_reconciler = ProviderReconciler::new(store.clone(), resolver.clone());
    let configuration_reconciler =
        ConfigurationReconciler::new(store.clone(), config.clone(), resolver, engine);

    let mut manager = Manager::new();
    manager
        .add(Controller::new("provider", Arc::new(provider_reconciler), &store))
        .add(Controller::new(
            "configuration",
            Arc::new(configuration_reconciler),
            &store,
        ));

    if config.bootstrap_demo {
        tokio::spawn(bootstrap_demo(store.clone()));
    }

    let token = shutdown_signal();
    info!("Starting {} controllers...", manager.len());
    manager.start(token).await?;

    warn!("All controllers stopped");
    Ok(())
}

/// Populate the store the way a user would, one object at a time
async fn bootstrap_demo(store: Arc<Store>) {
    if let Err(e) = seed(&store).await {
        warn!("Failed to seed demo objects: {}", e);
    }
}

async fn seed(store: &Store) -> Result<()> {
    tokio::time::sleep(Duration::from_secs(1)).await;
    let credentials = "HashicupsUser: education\n\
                       HashicupsPassword: test123\n\
                       HashicupsHost: http://localhost:19090\n";
    store.add(make_secret(
        "vela-system",
        "hashicups-account-creds",
        BTreeMap::from([("credentials".to_string(), credentials.to_string())]),
        None,
    ))?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let mut provider = Provider::new(
        "default",
        ProviderSpec {
            provider: "hashicups".to_string(),
            region: None,
            credentials: ProviderCredentials {
                secret_ref: Some(SecretKeySelector {
                    name: "hashicups-account-creds".to_string(),
                    namespace: Some("vela-system".to_string()),
                    key: "credentials".to_string(),
                }),
                ..Default::default()
            },
        },
    );
    provider.metadata.namespace = Some("default".to_string());
    store.add(provider)?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    let mut configuration = Configuration::new(
        "hashicups-order",
        ConfigurationSpec {
            hcl: Some(DEMO_HCL.to_string()),
            variable: Some(serde_json::json!({"quantity": 3})),
            ..Default::default()
        },
    );
    configuration.metadata.namespace = Some("default".to_string());
    let key = store.add(configuration)?;
    info!("Seeded demo objects, watching {}", key);
    Ok(())
}
