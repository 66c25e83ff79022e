// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod credentials;

pub use credentials::{CloudProvider, CredentialResolver, SecretCredentialResolver};
