// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::controllers::controller::Controller;
use anyhow::Context;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Owns the controllers and runs them until cancellation
#[derive(Default)]
pub struct Manager {
    controllers: Vec<Controller>,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, controller: Controller) -> &mut Self {
        info!("Registered controller {}", controller.name());
        self.controllers.push(controller);
        self
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Run every controller; returns once all have drained after `token` fires,
    /// or as soon as one of them fails.
    pub async fn start(self, token: CancellationToken) -> anyhow::Result<()> {
        info!("Starting {} controllers", self.controllers.len());
        let runs = self.controllers.into_iter().map(|c| {
            let name = c.name().to_string();
            let handle = tokio::spawn(c.run(token.clone()));
            async move {
                handle
                    .await
                    .with_context(|| format!("controller {} panicked", name))?
            }
        });

        if let Err(e) = try_join_all(runs).await {
            error!("Controller failed, shutting down: {:#}", e);
            token.cancel();
            return Err(e);
        }
        info!("All controllers stopped");
        Ok(())
    }
}

/// Token cancelled on the first SIGINT or SIGTERM.
/// A second signal exits the process immediately.
pub fn shutdown_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            error!("Failed to listen for shutdown signals: {}", e);
            return;
        }
        info!("Received shutdown signal, stopping controllers...");
        cancel.cancel();

        if wait_for_signal().await.is_ok() {
            warn!("Received second shutdown signal, exiting immediately");
            std::process::exit(1);
        }
    });
    token
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
