//! Decoder configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CodecError;

/// Knobs that change how a decode behaves. Every field has a default, so a
/// config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Strict ABI mode: any error aborts the whole decode with a
    /// `StopDecodingError` and padding must be canonical.
    #[serde(default)]
    pub strict_abi: bool,
    /// Request code at addresses of contract and external-function values to
    /// identify the contract.
    #[serde(default = "bool_true")]
    pub resolve_code: bool,
    /// Arrays longer than this decode to an `OverlongArray` error.
    #[serde(default = "default_max_array_length")]
    pub max_array_length: u64,
    /// Byte-range reads longer than this decode to a read error.
    #[serde(default = "default_max_bytes_length")]
    pub max_bytes_length: u64,
}

fn bool_true() -> bool {
    true
}

fn default_max_array_length() -> u64 {
    1 << 20
}

fn default_max_bytes_length() -> u64 {
    1 << 24
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            strict_abi: false,
            resolve_code: true,
            max_array_length: default_max_array_length(),
            max_bytes_length: default_max_bytes_length(),
        }
    }
}

impl DecoderConfig {
    /// Defaults with strict ABI mode on, as used for calldata.
    pub fn strict() -> Self {
        Self {
            strict_abi: true,
            ..Self::default()
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, CodecError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: &Path) -> Result<Self, CodecError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        assert_eq!(DecoderConfig::from_json_str("{}").unwrap(), DecoderConfig::default());
    }

    #[test]
    fn yaml_overrides() {
        let cfg = DecoderConfig::from_yaml_str("strict_abi: true\nmax_array_length: 16\n").unwrap();
        assert!(cfg.strict_abi);
        assert!(cfg.resolve_code);
        assert_eq!(cfg.max_array_length, 16);
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(
            DecoderConfig::from_json_str("{\"strict_abi\": 3}"),
            Err(CodecError::Json(_))
        ));
    }
}
