// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources managed by the operator.

pub mod configuration;
pub mod provider;
pub mod reference;

pub use configuration::{
    ApplyStatus, Configuration, ConfigurationSpec, ConfigurationState, ConfigurationStatus,
    ConfigurationType, DestroyStatus, Property,
};
pub use provider::{
    CredentialsSource, Provider, ProviderCredentials, ProviderSpec, ProviderState, ProviderStatus,
};
pub use reference::{Reference, SecretKeySelector, SecretReference};
