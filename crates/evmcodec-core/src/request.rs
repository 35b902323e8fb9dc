//! Read requests emitted by a suspended decode, and the data-source traits
//! that answer them.
//!
//! A decoder never fetches anything. When it needs a word it does not have,
//! it suspends with a [`DecoderRequest`]; whoever drives it answers with a
//! [`Response`]. A live chain client, a trace-replaying debugger and a test
//! fixture all plug in the same way, through [`DataSource`] or
//! [`AsyncDataSource`].

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a suspended decode needs next.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DecoderRequest {
    /// One storage word at a fully computed slot address.
    Storage { slot: B256 },
    /// A byte range of memory.
    Memory { start: u64, length: u64 },
    /// A byte range of calldata.
    Calldata { start: u64, length: u64 },
    /// The deployed code at an address.
    Code { address: Address },
}

impl DecoderRequest {
    /// Short label, used as a metrics attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            DecoderRequest::Storage { .. } => "storage",
            DecoderRequest::Memory { .. } => "memory",
            DecoderRequest::Calldata { .. } => "calldata",
            DecoderRequest::Code { .. } => "code",
        }
    }
}

impl fmt::Display for DecoderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderRequest::Storage { slot } => write!(f, "storage[{slot}]"),
            DecoderRequest::Memory { start, length } => write!(f, "memory[{start}..+{length}]"),
            DecoderRequest::Calldata { start, length } => {
                write!(f, "calldata[{start}..+{length}]")
            }
            DecoderRequest::Code { address } => write!(f, "code({address})"),
        }
    }
}

/// The answer to a [`DecoderRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    /// `None` means the slot is unset; it reads as zero.
    Storage { word: Option<B256> },
    /// `None` means the range is unavailable (out of bounds).
    Bytes { bytes: Option<Bytes> },
    /// Empty for accounts without code.
    Code { code: Bytes },
}

impl Response {
    /// Whether this response can answer `request`.
    pub fn answers(&self, request: &DecoderRequest) -> bool {
        match (self, request) {
            (Response::Storage { .. }, DecoderRequest::Storage { .. }) => true,
            (Response::Bytes { bytes: Some(b) }, DecoderRequest::Memory { length, .. })
            | (Response::Bytes { bytes: Some(b) }, DecoderRequest::Calldata { length, .. }) => {
                b.len() as u64 == *length
            }
            (Response::Bytes { bytes: None }, DecoderRequest::Memory { .. })
            | (Response::Bytes { bytes: None }, DecoderRequest::Calldata { .. }) => true,
            (Response::Code { .. }, DecoderRequest::Code { .. }) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Storage { word: Some(w) } => write!(f, "storage word {w}"),
            Response::Storage { word: None } => write!(f, "unset storage word"),
            Response::Bytes { bytes: Some(b) } => write!(f, "{} bytes", b.len()),
            Response::Bytes { bytes: None } => write!(f, "unavailable bytes"),
            Response::Code { code } => write!(f, "{} bytes of code", code.len()),
        }
    }
}

/// A synchronous backend able to answer decoder requests.
pub trait DataSource {
    /// The word at a storage slot, or `None` if unset.
    fn storage(&self, slot: &B256) -> Option<B256>;

    /// `length` bytes of memory at `start`, or `None` if out of range.
    fn memory(&self, start: u64, length: u64) -> Option<Bytes>;

    /// `length` bytes of calldata at `start`, or `None` if out of range.
    fn calldata(&self, start: u64, length: u64) -> Option<Bytes>;

    /// Deployed code at `address`; empty if none.
    fn code(&self, address: &Address) -> Bytes;

    /// Answer any request. The default dispatches to the methods above.
    fn answer(&self, request: &DecoderRequest) -> Response {
        match request {
            DecoderRequest::Storage { slot } => Response::Storage {
                word: self.storage(slot),
            },
            DecoderRequest::Memory { start, length } => Response::Bytes {
                bytes: self.memory(*start, *length),
            },
            DecoderRequest::Calldata { start, length } => Response::Bytes {
                bytes: self.calldata(*start, *length),
            },
            DecoderRequest::Code { address } => Response::Code {
                code: self.code(address),
            },
        }
    }
}

/// An asynchronous backend, e.g. a JSON-RPC client issuing
/// `eth_getStorageAt` / `eth_getCode`.
#[async_trait]
pub trait AsyncDataSource: Send + Sync {
    async fn answer(&self, request: &DecoderRequest) -> Response;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_responses_must_match_length() {
        let req = DecoderRequest::Memory {
            start: 0,
            length: 32,
        };
        let short = Response::Bytes {
            bytes: Some(Bytes::from(vec![0u8; 4])),
        };
        let exact = Response::Bytes {
            bytes: Some(Bytes::from(vec![0u8; 32])),
        };
        assert!(!short.answers(&req));
        assert!(exact.answers(&req));
        assert!(!Response::Code { code: Bytes::new() }.answers(&req));
    }

    #[test]
    fn request_json_shape() {
        let req = DecoderRequest::Storage { slot: B256::ZERO };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "storage");
    }
}
