// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod cache;
pub mod object;

pub use cache::{DeleteOutcome, NotifySender, Store};
pub use object::{object_key, Kind, Object, ObjectKey, ObjectState, StoredObject};
