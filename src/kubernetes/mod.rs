// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Helpers for the built-in Kubernetes objects the operator creates.

pub mod rbac;
pub mod secrets;

pub use rbac::RbacBootstrap;
