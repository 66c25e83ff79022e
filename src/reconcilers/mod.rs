// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers for the operator's custom resources.

pub mod configuration;
pub mod provider;

pub use configuration::ConfigurationReconciler;
pub use provider::ProviderReconciler;
