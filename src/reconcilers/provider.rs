// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Provider reconciler - validates credentials and records readiness.

use crate::controllers::{ReconcileResult, Reconciler, Request};
use crate::error::Result;
use crate::provider::CredentialResolver;
use crate::store::{Kind, ObjectKey, Store};
use crate::types::{Provider, ProviderState, ProviderStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct ProviderReconciler {
    store: Arc<Store>,
    resolver: Arc<dyn CredentialResolver>,
}

impl ProviderReconciler {
    pub fn new(store: Arc<Store>, resolver: Arc<dyn CredentialResolver>) -> Self {
        Self { store, resolver }
    }

    /// Best-effort status write; a failure is logged, never returned
    fn set_status(&self, key: &ObjectKey, state: ProviderState, message: String) {
        let status = ProviderStatus {
            state: Some(state),
            message,
        };
        if let Err(e) = self
            .store
            .update_with::<Provider, _>(key, |p| p.status = Some(status))
        {
            error!("Failed to update status of {}: {}", key, e);
        }
    }
}

#[async_trait]
impl Reconciler for ProviderReconciler {
    fn kind(&self) -> Kind {
        Kind::Provider
    }

    #[instrument(skip(self), fields(provider = %request))]
    async fn reconcile(&self, request: &Request) -> Result<ReconcileResult> {
        let key = request.key(Kind::Provider);
        let Some(provider) = self.store.get_by_key::<Provider>(&key)? else {
            debug!("Provider {} no longer exists", request);
            return Ok(ReconcileResult::done());
        };

        let region = provider.spec.region.clone().unwrap_or_default();
        match self.resolver.get_credentials(&provider, &region).await {
            Ok(_) => {
                if !provider.is_ready() {
                    info!("Provider {} is ready", request);
                }
                self.set_status(&key, ProviderState::Ready, String::new());
                Ok(ReconcileResult::done())
            }
            Err(e) => {
                warn!("Provider {} is not ready: {}", request, e);
                self.set_status(&key, ProviderState::NotReady, e.to_string());
                Err(e)
            }
        }
    }
}
