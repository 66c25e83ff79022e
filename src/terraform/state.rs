// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Decoding of the state blob the Terraform kubernetes backend writes.

use crate::error::{OperatorError, Result};
use crate::terraform::values::stringify;
use crate::types::Property;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Deserialize)]
struct TerraformState {
    #[serde(default)]
    outputs: BTreeMap<String, StateOutput>,
}

#[derive(Deserialize)]
struct StateOutput {
    #[serde(default)]
    value: serde_json::Value,
}

/// Decompress the stored state; accepts the gzip stream or its base64 text
pub fn decompress_state(raw: &[u8]) -> Result<Vec<u8>> {
    let compressed = if raw.starts_with(&GZIP_MAGIC) {
        raw.to_vec()
    } else {
        let text = String::from_utf8_lossy(raw);
        STANDARD
            .decode(text.trim())
            .map_err(|e| OperatorError::State(format!("state is neither gzip nor base64: {e}")))?
    };
    let mut decoded = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|e| OperatorError::State(format!("failed to decompress state secret data: {e}")))?;
    Ok(decoded)
}

/// Outputs of a Terraform state document as string properties
pub fn parse_outputs(state_json: &[u8]) -> Result<BTreeMap<String, Property>> {
    let state: TerraformState = serde_json::from_slice(state_json)?;
    state
        .outputs
        .into_iter()
        .map(|(name, output)| {
            let value = stringify(&output.value).map_err(|e| {
                OperatorError::State(format!(
                    "failed to convert value of terraform state output {name} to string: {e}"
                ))
            })?;
            Ok((name, Property { value }))
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn compress_state(state_json: &str) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(state_json.as_bytes()).unwrap();
    encoder.finish().unwrap()
}
