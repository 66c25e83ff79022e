// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic controller binding one reconciler to one kind's notifications.

use crate::controllers::queue::{Request, WorkQueue};
use crate::error::Result;
use crate::store::{Kind, ObjectKey, Store};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Outcome of a successful reconcile pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Retry through the rate limiter
    pub requeue: bool,
    /// Retry after a fixed delay; wins over `requeue`
    pub requeue_after: Option<Duration>,
}

impl ReconcileResult {
    /// Converged, nothing scheduled
    pub fn done() -> Self {
        Self::default()
    }

    pub fn requeue() -> Self {
        ReconcileResult {
            requeue: true,
            requeue_after: None,
        }
    }

    pub fn requeue_after(delay: Duration) -> Self {
        ReconcileResult {
            requeue: false,
            requeue_after: Some(delay),
        }
    }
}

/// Per-kind convergence logic
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Kind whose store mutations trigger this reconciler
    fn kind(&self) -> Kind;

    async fn reconcile(&self, request: &Request) -> Result<ReconcileResult>;
}

/// Queue verb applied after a reconcile pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum QueueAction {
    RateLimited,
    After(Duration),
    Forget,
}

pub(crate) fn queue_action(result: &Result<ReconcileResult>) -> QueueAction {
    match result {
        Err(_) => QueueAction::RateLimited,
        Ok(ReconcileResult {
            requeue_after: Some(delay),
            ..
        }) if !delay.is_zero() => QueueAction::After(*delay),
        Ok(ReconcileResult { requeue: true, .. }) => QueueAction::RateLimited,
        Ok(_) => QueueAction::Forget,
    }
}

pub struct Controller {
    name: String,
    reconciler: Arc<dyn Reconciler>,
    queue: WorkQueue,
    events: mpsc::UnboundedReceiver<ObjectKey>,
}

impl Controller {
    /// Create a controller and register it for its kind's store notifications
    pub fn new(name: impl Into<String>, reconciler: Arc<dyn Reconciler>, store: &Store) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        store.register(reconciler.kind(), tx);
        Controller {
            name: name.into(),
            reconciler,
            queue: WorkQueue::new(),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> WorkQueue {
        self.queue.clone()
    }

    /// Run the notification listener and the single worker until `token` is cancelled.
    /// The in-flight reconcile is allowed to finish.
    pub async fn run(self, token: CancellationToken) -> anyhow::Result<()> {
        let Controller {
            name,
            reconciler,
            queue,
            mut events,
        } = self;
        info!("Starting controller {}", name);

        let listener = {
            let queue = queue.clone();
            let token = token.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        key = events.recv() => match key {
                            Some(key) => queue.add(Request::from(&key)),
                            None => break,
                        },
                    }
                }
                queue.shut_down();
            })
        };

        while let Some(request) = queue.get().await {
            let span = info_span!("reconcile", controller = %name, request = %request);
            let result = reconciler.reconcile(&request).instrument(span).await;
            match queue_action(&result) {
                QueueAction::RateLimited => queue.add_rate_limited(request.clone()),
                QueueAction::After(delay) => {
                    queue.forget(&request);
                    queue.add_after(request.clone(), delay);
                }
                QueueAction::Forget => queue.forget(&request),
            }
            match result {
                Ok(outcome) => debug!("Reconciled {} ({:?})", request, outcome),
                Err(e) => warn!("Reconciliation of {} failed: {}", request, e),
            }
        }

        listener
            .await
            .with_context(|| format!("notification listener of {} panicked", name))?;
        info!("Controller {} stopped", name);
        Ok(())
    }
}
