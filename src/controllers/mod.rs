// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod controller;
pub mod manager;
pub mod queue;

pub use controller::{Controller, ReconcileResult, Reconciler};
pub use manager::{shutdown_signal, Manager};
pub use queue::{Request, WorkQueue};
