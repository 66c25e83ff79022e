// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed view over everything the store can hold.

use crate::error::{OperatorError, Result};
use crate::types::{Configuration, Provider};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Identifier of every object kind the store knows about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Configuration,
    Provider,
    Secret,
    ConfigMap,
    Job,
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
}

impl Kind {
    pub const ALL: [Kind; 8] = [
        Kind::Configuration,
        Kind::Provider,
        Kind::Secret,
        Kind::ConfigMap,
        Kind::Job,
        Kind::ServiceAccount,
        Kind::ClusterRole,
        Kind::ClusterRoleBinding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Configuration => "Configuration",
            Kind::Provider => "Provider",
            Kind::Secret => "Secret",
            Kind::ConfigMap => "ConfigMap",
            Kind::Job => "Job",
            Kind::ServiceAccount => "ServiceAccount",
            Kind::ClusterRole => "ClusterRole",
            Kind::ClusterRoleBinding => "ClusterRoleBinding",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown kind {s:?}"))
    }
}

/// Composite `Kind/Namespace/Name` identity of a stored object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The `namespace/name` part carried by work queue requests
    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(namespace), Some(name)) if !name.is_empty() => {
                Ok(ObjectKey::new(kind.parse()?, namespace, name))
            }
            _ => Err(format!("malformed object key {s:?}")),
        }
    }
}

/// Lifecycle of a stored object as far as deletion is concerned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectState {
    Active,
    /// Deletion was requested but finalizers still hold the object in the store
    Terminating,
}

impl ObjectState {
    pub fn of(meta: &ObjectMeta) -> Self {
        if meta.deletion_timestamp.is_some() {
            ObjectState::Terminating
        } else {
            ObjectState::Active
        }
    }
}

/// Tagged union over every stored kind
#[derive(Clone, Debug)]
pub enum Object {
    Configuration(Configuration),
    Provider(Provider),
    Secret(Secret),
    ConfigMap(ConfigMap),
    Job(Job),
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
}

macro_rules! with_object {
    ($object:expr, $inner:ident => $body:expr) => {
        match $object {
            Object::Configuration($inner) => $body,
            Object::Provider($inner) => $body,
            Object::Secret($inner) => $body,
            Object::ConfigMap($inner) => $body,
            Object::Job($inner) => $body,
            Object::ServiceAccount($inner) => $body,
            Object::ClusterRole($inner) => $body,
            Object::ClusterRoleBinding($inner) => $body,
        }
    };
}

impl Object {
    pub fn kind(&self) -> Kind {
        match self {
            Object::Configuration(_) => Kind::Configuration,
            Object::Provider(_) => Kind::Provider,
            Object::Secret(_) => Kind::Secret,
            Object::ConfigMap(_) => Kind::ConfigMap,
            Object::Job(_) => Kind::Job,
            Object::ServiceAccount(_) => Kind::ServiceAccount,
            Object::ClusterRole(_) => Kind::ClusterRole,
            Object::ClusterRoleBinding(_) => Kind::ClusterRoleBinding,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        with_object!(self, o => o.meta())
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        with_object!(self, o => o.meta_mut())
    }

    pub fn key(&self) -> Result<ObjectKey> {
        key_from_meta(self.kind(), self.meta())
    }

    pub fn state(&self) -> ObjectState {
        ObjectState::of(self.meta())
    }

    pub fn has_finalizers(&self) -> bool {
        self.meta().finalizers.as_ref().is_some_and(|f| !f.is_empty())
    }

    pub(crate) fn to_value(&self) -> Result<serde_json::Value> {
        Ok(with_object!(self, o => serde_json::to_value(o))?)
    }

    /// Spec portion used to decide whether a write bumps the generation
    pub(crate) fn spec_value(&self) -> Result<Option<serde_json::Value>> {
        Ok(match self {
            Object::Configuration(c) => Some(serde_json::to_value(&c.spec)?),
            Object::Provider(p) => Some(serde_json::to_value(&p.spec)?),
            Object::Job(j) => Some(serde_json::to_value(&j.spec)?),
            _ => None,
        })
    }
}

/// Kinds that can be written to and read back from the store
pub trait StoredObject: Resource<DynamicType = ()> + Clone + Serialize + Send + Sync + 'static {
    const KIND: Kind;

    fn into_object(self) -> Object;

    fn from_object(object: Object) -> Option<Self>;

    fn object_state(&self) -> ObjectState {
        ObjectState::of(self.meta())
    }
}

macro_rules! stored_object {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl StoredObject for $ty {
                const KIND: Kind = Kind::$variant;

                fn into_object(self) -> Object {
                    Object::$variant(self)
                }

                fn from_object(object: Object) -> Option<Self> {
                    match object {
                        Object::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )+
    };
}

stored_object! {
    Configuration => Configuration,
    Provider => Provider,
    Secret => Secret,
    ConfigMap => ConfigMap,
    Job => Job,
    ServiceAccount => ServiceAccount,
    ClusterRole => ClusterRole,
    ClusterRoleBinding => ClusterRoleBinding,
}

/// Deterministic key function; cluster-scoped objects get an empty namespace
pub fn object_key<K: StoredObject>(obj: &K) -> Result<ObjectKey> {
    key_from_meta(K::KIND, obj.meta())
}

fn key_from_meta(kind: Kind, meta: &ObjectMeta) -> Result<ObjectKey> {
    let name = meta
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| OperatorError::KeyError {
            kind,
            reason: "object has no name".to_string(),
        })?;
    let namespace = meta.namespace.clone().unwrap_or_default();
    Ok(ObjectKey::new(kind, namespace, name))
}
