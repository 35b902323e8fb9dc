//! An in-memory [`DataSource`], for tests and for embedding a known state.

use alloy_primitives::{Address, Bytes, B256, U256};
use evmcodec_core::conversion::{from_hex, left_pad_word, WORD_SIZE};
use evmcodec_core::{CodecError, DataSource};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Canned storage, memory, calldata and code.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    storage: HashMap<B256, B256>,
    memory: Bytes,
    calldata: Bytes,
    code: HashMap<Address, Bytes>,
}

/// On-disk shape: hex strings throughout. Storage keys are slot numbers,
/// storage values are words and may omit leading zeros.
#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    storage: HashMap<String, String>,
    #[serde(default)]
    memory: Option<String>,
    #[serde(default)]
    calldata: Option<String>,
    #[serde(default)]
    code: HashMap<String, String>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, slot: B256, word: B256) -> Self {
        self.storage.insert(slot, word);
        self
    }

    pub fn with_memory(mut self, memory: impl Into<Bytes>) -> Self {
        self.memory = memory.into();
        self
    }

    pub fn with_calldata(mut self, calldata: impl Into<Bytes>) -> Self {
        self.calldata = calldata.into();
        self
    }

    pub fn with_code(mut self, address: Address, code: impl Into<Bytes>) -> Self {
        self.code.insert(address, code.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        let file: FixtureFile = serde_json::from_str(json)?;
        let mut source = Self::new();
        for (slot, word) in &file.storage {
            source = source.with_storage(parse_slot(slot)?, parse_word(word)?);
        }
        if let Some(memory) = &file.memory {
            source = source.with_memory(from_hex(memory)?);
        }
        if let Some(calldata) = &file.calldata {
            source = source.with_calldata(from_hex(calldata)?);
        }
        for (address, code) in &file.code {
            let address = address.parse::<Address>().map_err(|e| CodecError::InvalidHex {
                input: address.clone(),
                reason: e.to_string(),
            })?;
            source = source.with_code(address, from_hex(code)?);
        }
        Ok(source)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Number of storage slots held.
    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }
}

fn parse_slot(input: &str) -> Result<B256, CodecError> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    let slot = U256::from_str_radix(digits, 16).map_err(|e| CodecError::InvalidHex {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    Ok(B256::from(slot.to_be_bytes::<32>()))
}

fn parse_word(input: &str) -> Result<B256, CodecError> {
    let raw = from_hex(input)?;
    if raw.len() > WORD_SIZE {
        return Err(CodecError::InvalidHex {
            input: input.to_string(),
            reason: format!("{} bytes is longer than a word", raw.len()),
        });
    }
    Ok(left_pad_word(&raw))
}

fn slice(region: &Bytes, start: u64, length: u64) -> Option<Bytes> {
    let start = usize::try_from(start).ok()?;
    let end = start.checked_add(usize::try_from(length).ok()?)?;
    (end <= region.len()).then(|| region.slice(start..end))
}

impl DataSource for FixtureSource {
    fn storage(&self, slot: &B256) -> Option<B256> {
        self.storage.get(slot).copied()
    }

    fn memory(&self, start: u64, length: u64) -> Option<Bytes> {
        slice(&self.memory, start, length)
    }

    fn calldata(&self, start: u64, length: u64) -> Option<Bytes> {
        slice(&self.calldata, start, length)
    }

    fn code(&self, address: &Address) -> Bytes {
        self.code.get(address).cloned().unwrap_or_default()
    }
}
