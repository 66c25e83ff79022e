// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory object store, the single source of truth for every kind.

use crate::error::{OperatorError, Result};
use crate::store::object::{object_key, Kind, Object, ObjectKey, StoredObject};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Channel a controller registers to hear about mutations of its kind
pub type NotifySender = mpsc::UnboundedSender<ObjectKey>;

/// Result of a delete request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object is gone from the store
    Removed,
    /// Finalizers remain; the object is now terminating
    Deferred,
    NotFound,
}

#[derive(Default)]
pub struct Store {
    items: Mutex<HashMap<ObjectKey, Object>>,
    handlers: Mutex<HashMap<Kind, NotifySender>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route notifications for `kind` to a controller's channel
    pub fn register(&self, kind: Kind, sender: NotifySender) {
        let previous = lock(&self.handlers).insert(kind, sender);
        if previous.is_some() {
            warn!("Replaced existing notification handler for {}", kind);
        }
    }

    /// Insert or overwrite an object
    pub fn add<K: StoredObject>(&self, obj: K) -> Result<ObjectKey> {
        let key = object_key(&obj)?;
        let changed = write(&mut lock(&self.items), &key, obj.into_object())?;
        debug!("Added {}", key);
        if changed {
            self.notify(&key);
        }
        Ok(key)
    }

    /// Write back an object; a write equal to the stored copy is a no-op
    pub fn update<K: StoredObject>(&self, obj: K) -> Result<()> {
        let key = object_key(&obj)?;
        let changed = write(&mut lock(&self.items), &key, obj.into_object())?;
        if changed {
            debug!("Updated {}", key);
            self.notify(&key);
        }
        Ok(())
    }

    /// Atomic read-modify-write of a stored object.
    /// Returns the updated object, or `None` when the key is absent.
    pub fn update_with<K, F>(&self, key: &ObjectKey, f: F) -> Result<Option<K>>
    where
        K: StoredObject,
        F: FnOnce(&mut K),
    {
        check_kind::<K>(key)?;
        let (updated, changed) = {
            let mut items = lock(&self.items);
            let Some(current) = items.get(key).cloned() else {
                return Ok(None);
            };
            let mut typed = K::from_object(current).ok_or_else(|| mismatch::<K>(key))?;
            f(&mut typed);
            let changed = write(&mut items, key, typed.into_object())?;
            let stored = items.get(key).cloned().and_then(K::from_object);
            (stored, changed)
        };
        if changed {
            debug!("Updated {}", key);
            self.notify(key);
        }
        Ok(updated)
    }

    pub fn delete<K: StoredObject>(&self, obj: &K) -> Result<DeleteOutcome> {
        Ok(self.delete_by_key(&object_key(obj)?))
    }

    /// Remove an object, or mark it terminating while finalizers remain
    pub fn delete_by_key(&self, key: &ObjectKey) -> DeleteOutcome {
        let outcome = {
            let mut items = lock(&self.items);
            match items.get_mut(key) {
                None => DeleteOutcome::NotFound,
                Some(stored) if stored.has_finalizers() => {
                    let meta = stored.meta_mut();
                    if meta.deletion_timestamp.is_none() {
                        meta.deletion_timestamp = Some(Time(Utc::now()));
                    }
                    DeleteOutcome::Deferred
                }
                Some(_) => {
                    items.remove(key);
                    DeleteOutcome::Removed
                }
            }
        };
        match outcome {
            DeleteOutcome::NotFound => debug!("Delete of {} found nothing", key),
            DeleteOutcome::Deferred => {
                debug!("Deletion of {} deferred until finalizers are removed", key);
                self.notify(key);
            }
            DeleteOutcome::Removed => {
                debug!("Deleted {}", key);
                self.notify(key);
            }
        }
        outcome
    }

    pub fn get<K: StoredObject>(&self, obj: &K) -> Result<Option<K>> {
        self.get_by_key(&object_key(obj)?)
    }

    pub fn get_by_key<K: StoredObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        check_kind::<K>(key)?;
        match lock(&self.items).get(key).cloned() {
            Some(object) => K::from_object(object)
                .map(Some)
                .ok_or_else(|| mismatch::<K>(key)),
            None => Ok(None),
        }
    }

    pub fn get_named<K: StoredObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        self.get_by_key(&ObjectKey::new(K::KIND, namespace, name))
    }

    /// Untyped lookup
    pub fn get_object(&self, key: &ObjectKey) -> Option<Object> {
        lock(&self.items).get(key).cloned()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        lock(&self.items).contains_key(key)
    }

    /// Snapshot of every stored object, in no particular order
    pub fn list(&self) -> Vec<Object> {
        lock(&self.items).values().cloned().collect()
    }

    pub fn list_of<K: StoredObject>(&self) -> Vec<K> {
        lock(&self.items)
            .values()
            .filter(|o| o.kind() == K::KIND)
            .cloned()
            .filter_map(K::from_object)
            .collect()
    }

    fn notify(&self, key: &ObjectKey) {
        let handlers = lock(&self.handlers);
        if let Some(sender) = handlers.get(&key.kind) {
            if sender.send(key.clone()).is_err() {
                debug!("Controller for {} stopped listening, dropping {}", key.kind, key);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_kind<K: StoredObject>(key: &ObjectKey) -> Result<()> {
    if key.kind == K::KIND {
        Ok(())
    } else {
        Err(mismatch::<K>(key))
    }
}

fn mismatch<K: StoredObject>(key: &ObjectKey) -> OperatorError {
    OperatorError::KindMismatch {
        key: key.clone(),
        expected: K::KIND,
        actual: key.kind,
    }
}

/// Write `object` under `key`, returning whether anything changed.
/// Creation timestamp and deletion timestamp survive overwrites; generation
/// moves forward only when the spec changed.
fn write(items: &mut HashMap<ObjectKey, Object>, key: &ObjectKey, mut object: Object) -> Result<bool> {
    let previous = match items.get(key) {
        Some(previous) => {
            let meta = previous.meta();
            Some((
                meta.generation.unwrap_or(1),
                meta.creation_timestamp.clone(),
                meta.deletion_timestamp.clone(),
                previous.to_value()?,
                previous.spec_value()?,
            ))
        }
        None => None,
    };

    match previous {
        Some((generation, created, deleting, previous_value, previous_spec)) => {
            {
                let meta = object.meta_mut();
                meta.generation = Some(generation);
                if meta.creation_timestamp.is_none() {
                    meta.creation_timestamp = created;
                }
                if deleting.is_some() {
                    meta.deletion_timestamp = deleting;
                }
            }
            if object.to_value()? == previous_value {
                return Ok(false);
            }
            if object.spec_value()? != previous_spec {
                object.meta_mut().generation = Some(generation + 1);
            }
        }
        None => {
            let meta = object.meta_mut();
            if meta.generation.is_none() {
                meta.generation = Some(1);
            }
            if meta.creation_timestamp.is_none() {
                meta.creation_timestamp = Some(Time(Utc::now()));
            }
        }
    }

    items.insert(key.clone(), object);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::object::ObjectState;
    use crate::types::{Configuration, ConfigurationSpec, ConfigurationState, ConfigurationStatus};
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn make_secret(name: &str, value: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("demo".to_string()),
                ..Default::default()
            },
            string_data: Some(BTreeMap::from([("key".to_string(), value.to_string())])),
            ..Default::default()
        }
    }

    fn make_configuration(hcl: &str, finalizers: Vec<String>) -> Configuration {
        let mut configuration = Configuration::new(
            "web",
            ConfigurationSpec {
                hcl: Some(hcl.to_string()),
                ..Default::default()
            },
        );
        configuration.metadata.namespace = Some("demo".to_string());
        configuration.metadata.finalizers = Some(finalizers);
        configuration
    }

    fn listen(store: &Store, kind: Kind) -> mpsc::UnboundedReceiver<ObjectKey> {
        let (tx, rx) = mpsc::unbounded_channel();
        store.register(kind, tx);
        rx
    }

    #[test]
    fn test_add_and_get() {
        let store = Store::new();
        let key = store.add(make_secret("creds", "a")).unwrap();

        let stored: Secret = store.get_by_key(&key).unwrap().unwrap();
        assert_eq!(stored.metadata.generation, Some(1));
        assert!(stored.metadata.creation_timestamp.is_some());
        assert!(store.get(&make_secret("creds", "ignored")).unwrap().is_some());
        assert!(store.get_named::<Secret>("demo", "missing").unwrap().is_none());
    }

    #[test]
    fn test_get_by_key_with_wrong_kind() {
        let store = Store::new();
        let key = store.add(make_secret("creds", "a")).unwrap();
        let err = store.get_by_key::<Configuration>(&key).unwrap_err();
        assert!(matches!(err, OperatorError::KindMismatch { .. }));
    }

    #[test]
    fn test_mutations_notify_registered_kind() {
        let store = Store::new();
        let mut rx = listen(&store, Kind::Secret);

        let key = store.add(make_secret("creds", "a")).unwrap();
        store.update(make_secret("creds", "b")).unwrap();
        store.delete(&make_secret("creds", "b")).unwrap();

        for _ in 0..3 {
            assert_eq!(rx.try_recv().unwrap(), key);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unregistered_kind_is_silent() {
        let store = Store::new();
        let mut rx = listen(&store, Kind::Configuration);
        store.add(make_secret("creds", "a")).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_identical_update_is_noop() {
        let store = Store::new();
        let mut rx = listen(&store, Kind::Secret);
        store.add(make_secret("creds", "a")).unwrap();
        rx.try_recv().unwrap();

        store.update(make_secret("creds", "a")).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_generation_bumps_only_on_spec_change() {
        let store = Store::new();
        let key = store.add(make_configuration("a", vec![])).unwrap();

        store
            .update_with::<Configuration, _>(&key, |c| {
                c.status = Some(ConfigurationStatus::default());
            })
            .unwrap();
        let configuration: Configuration = store.get_by_key(&key).unwrap().unwrap();
        assert_eq!(configuration.metadata.generation, Some(1));

        store.update(make_configuration("b", vec![])).unwrap();
        let configuration: Configuration = store.get_by_key(&key).unwrap().unwrap();
        assert_eq!(configuration.metadata.generation, Some(2));
    }

    #[test]
    fn test_update_with_missing_key() {
        let store = Store::new();
        let key = ObjectKey::new(Kind::Configuration, "demo", "web");
        let result = store.update_with::<Configuration, _>(&key, |_| {}).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_update_with_returns_stored_copy() {
        let store = Store::new();
        let key = store.add(make_configuration("a", vec![])).unwrap();
        let updated = store
            .update_with::<Configuration, _>(&key, |c| {
                let mut status = c.status_or_default();
                status.apply.state = Some(ConfigurationState::Available);
                c.status = Some(status);
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.apply_state(), Some(ConfigurationState::Available));
        assert_eq!(updated.metadata.generation, Some(1));
    }

    #[test]
    fn test_delete_with_finalizer_is_two_phase() {
        let store = Store::new();
        let mut rx = listen(&store, Kind::Configuration);
        let configuration = make_configuration("a", vec!["cleanup".to_string()]);
        let key = store.add(configuration.clone()).unwrap();
        rx.try_recv().unwrap();

        assert_eq!(store.delete(&configuration).unwrap(), DeleteOutcome::Deferred);
        assert_eq!(rx.try_recv().unwrap(), key);
        let stored: Configuration = store.get_by_key(&key).unwrap().unwrap();
        assert_eq!(stored.object_state(), ObjectState::Terminating);

        store
            .update_with::<Configuration, _>(&key, |c| c.metadata.finalizers = None)
            .unwrap();
        assert_eq!(store.delete_by_key(&key), DeleteOutcome::Removed);
        assert!(!store.contains(&key));
        assert_eq!(store.delete_by_key(&key), DeleteOutcome::NotFound);
    }

    #[test]
    fn test_update_cannot_clear_deletion_timestamp() {
        let store = Store::new();
        let configuration = make_configuration("a", vec!["cleanup".to_string()]);
        let key = store.add(configuration.clone()).unwrap();
        store.delete(&configuration).unwrap();

        store.update(configuration).unwrap();
        let stored: Configuration = store.get_by_key(&key).unwrap().unwrap();
        assert!(stored.metadata.deletion_timestamp.is_some());
    }

    #[test]
    fn test_list_and_list_of() {
        let store = Store::new();
        store.add(make_secret("a", "1")).unwrap();
        store.add(make_secret("b", "2")).unwrap();
        store.add(make_configuration("x", vec![])).unwrap();

        assert_eq!(store.list().len(), 3);
        let mut names: Vec<String> = store
            .list_of::<Secret>()
            .into_iter()
            .filter_map(|s| s.metadata.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(Store::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        store.add(make_secret(&format!("s-{i}-{j}"), "v")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.list_of::<Secret>().len(), 400);
    }
}
