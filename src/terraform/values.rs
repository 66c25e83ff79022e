// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{OperatorError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix Terraform reads input variables from
pub const VARIABLE_ENV_PREFIX: &str = "TF_VAR_";

/// Render a JSON value the way it is handed to Terraform
pub fn stringify(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) | Value::Object(_) => Ok(serde_json::to_string(value)?),
        Value::Null => Err(OperatorError::Validation(
            "null values can't be passed to Terraform".to_string(),
        )),
    }
}

/// `TF_VAR_`-prefixed environment for the Configuration's variable document
pub fn variable_env(variable: Option<&Value>) -> Result<BTreeMap<String, String>> {
    let Some(variable) = variable else {
        return Ok(BTreeMap::new());
    };
    let object = match variable {
        Value::Object(map) => map,
        Value::Null => return Ok(BTreeMap::new()),
        _ => {
            return Err(OperatorError::Validation(
                "variable must be a JSON object".to_string(),
            ))
        }
    };
    object
        .iter()
        .map(|(k, v)| {
            let value = stringify(v).map_err(|e| {
                OperatorError::Validation(format!("variable {k}: {e}"))
            })?;
            Ok((format!("{VARIABLE_ENV_PREFIX}{k}"), value))
        })
        .collect()
}
