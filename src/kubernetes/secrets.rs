// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Helpers for reading and building string-valued Secrets

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

/// Build a Secret whose values are kept as `stringData`
pub fn make_secret(
    namespace: &str,
    name: &str,
    data: BTreeMap<String, String>,
    labels: Option<BTreeMap<String, String>>,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels,
            ..Default::default()
        },
        string_data: Some(data),
        ..Default::default()
    }
}

/// Merged view of `data` (decoded as UTF-8) and `stringData`, the latter winning
pub fn string_map(secret: &Secret) -> BTreeMap<String, String> {
    let mut values: BTreeMap<String, String> = secret
        .data
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), String::from_utf8_lossy(&v.0).into_owned()))
        .collect();
    if let Some(string_data) = &secret.string_data {
        values.extend(string_data.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    values
}

/// Raw bytes of one key, looking at `stringData` first
pub fn raw_value(secret: &Secret, key: &str) -> Option<Vec<u8>> {
    secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| v.as_bytes().to_vec())
        .or_else(|| {
            secret
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .map(|ByteString(bytes)| bytes.clone())
        })
}

pub fn string_value(secret: &Secret, key: &str) -> Option<String> {
    raw_value(secret, key).map(|v| String::from_utf8_lossy(&v).into_owned())
}
