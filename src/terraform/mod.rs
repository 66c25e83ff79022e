// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Terraform execution boundary, state decoding and value conversion.

pub mod engine;
pub mod state;
pub mod values;

pub use engine::{ExecutionEngine, JobHandle, JobState, JobStatusReport, StoreExecutionEngine};
