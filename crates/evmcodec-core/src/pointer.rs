//! Where a value lives: storage positions, byte ranges, stack positions and
//! constant definitions.

use alloy_primitives::{Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conversion::WORD_SIZE;
use crate::value::Value;

/// A data region of the EVM (plus the two pseudo-regions used for literals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Storage,
    Memory,
    Calldata,
    Stack,
    StackLiteral,
    Definition,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::Storage => "storage",
            Location::Memory => "memory",
            Location::Calldata => "calldata",
            Location::Stack => "stack",
            Location::StackLiteral => "stack literal",
            Location::Definition => "definition",
        };
        write!(f, "{s}")
    }
}

/// A storage slot, described by how it is derived rather than by its
/// numeric address.
///
/// * `key` set: `keccak256(encode(key) ++ address(path)) + offset`
/// * `hash_path` set: `keccak256(address(path)) + offset`
/// * otherwise: `address(path) + offset` (or just `offset` without a path)
///
/// See [`crate::slot`] for the address computation and structural equality.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Slot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Box<Slot>>,
    #[serde(default)]
    pub hash_path: bool,
    pub offset: U256,
}

impl Slot {
    /// A top-level slot at a fixed address.
    pub fn new(offset: U256) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// `address(parent) + offset`, used for struct members and static arrays.
    pub fn child(parent: &Slot, offset: U256) -> Self {
        Self {
            key: None,
            path: Some(Box::new(parent.clone())),
            hash_path: false,
            offset,
        }
    }

    /// `keccak256(address(parent)) + offset`, the data area of a dynamic
    /// array or long `bytes`/`string`.
    pub fn hashed(parent: &Slot, offset: U256) -> Self {
        Self {
            key: None,
            path: Some(Box::new(parent.clone())),
            hash_path: true,
            offset,
        }
    }

    /// The slot of `mapping[key]` for a mapping at `parent`.
    pub fn mapping_entry(parent: &Slot, key: Value) -> Self {
        Self {
            key: Some(Box::new(key)),
            path: Some(Box::new(parent.clone())),
            hash_path: false,
            offset: U256::ZERO,
        }
    }

    /// The same derivation moved `delta` slots further.
    pub fn advanced(&self, delta: U256) -> Self {
        Self {
            offset: self.offset.wrapping_add(delta),
            ..self.clone()
        }
    }
}

/// A byte within a slot. `index` counts from the most significant byte
/// (0) to the least significant byte (31).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePosition {
    pub slot: Slot,
    pub index: u8,
}

impl StoragePosition {
    pub fn new(slot: Slot, index: u8) -> Self {
        Self { slot, index }
    }
}

/// An inclusive byte range in storage. Either `to` or `length` must be set;
/// [`StorageRange::end`] derives the missing end from the length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRange {
    pub from: StoragePosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<StoragePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl StorageRange {
    /// A whole number of slots starting at `slot`.
    pub fn words(slot: Slot, count: U256) -> Self {
        let last = slot.advanced(count.saturating_sub(U256::from(1)));
        Self {
            from: StoragePosition::new(slot, 0),
            to: Some(StoragePosition::new(last, (WORD_SIZE - 1) as u8)),
            length: None,
        }
    }

    /// `length` bytes at the low-order end of `slot`.
    pub fn packed(slot: Slot, length: usize) -> Self {
        let length = length.clamp(1, WORD_SIZE);
        Self {
            from: StoragePosition::new(slot.clone(), (WORD_SIZE - length) as u8),
            to: Some(StoragePosition::new(slot, (WORD_SIZE - 1) as u8)),
            length: None,
        }
    }

    /// `length` bytes starting at `from`.
    pub fn with_length(from: StoragePosition, length: u64) -> Self {
        Self {
            from,
            to: None,
            length: Some(length),
        }
    }

    /// The inclusive end position, derived from `length` if `to` is absent.
    /// `None` when neither is set or the length is zero.
    pub fn end(&self) -> Option<StoragePosition> {
        if let Some(to) = &self.to {
            return Some(to.clone());
        }
        let length = self.length.filter(|l| *l > 0)?;
        let last = u128::from(self.from.index) + u128::from(length) - 1;
        let word = WORD_SIZE as u128;
        Some(StoragePosition::new(
            self.from.slot.advanced(U256::from(last / word)),
            (last % word) as u8,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePointer {
    pub range: StorageRange,
}

/// A byte range in memory or calldata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesPointer {
    pub start: u64,
    pub length: u64,
}

impl BytesPointer {
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// One word at `start`.
    pub fn word(start: u64) -> Self {
        Self::new(start, WORD_SIZE as u64)
    }
}

/// Inclusive range of positions in the caller-supplied stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackPointer {
    pub from: usize,
    pub to: usize,
}

/// The literal value of a `constant`, as the bytes the compiler embeds.
/// Composite constants are an image of consecutive storage-layout words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDefinitionPointer {
    pub definition: Bytes,
}

/// Where a value lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum DataPointer {
    Storage(StoragePointer),
    Memory(BytesPointer),
    Calldata(BytesPointer),
    Stack(StackPointer),
    StackLiteral { literal: B256 },
    Definition(ConstantDefinitionPointer),
}

impl DataPointer {
    /// The whole slot at `slot`.
    pub fn storage_slot(slot: Slot) -> Self {
        DataPointer::Storage(StoragePointer {
            range: StorageRange::words(slot, U256::from(1)),
        })
    }

    pub fn storage(range: StorageRange) -> Self {
        DataPointer::Storage(StoragePointer { range })
    }

    pub fn memory(start: u64) -> Self {
        DataPointer::Memory(BytesPointer::word(start))
    }

    pub fn calldata(start: u64) -> Self {
        DataPointer::Calldata(BytesPointer::word(start))
    }

    pub fn stack(position: usize) -> Self {
        DataPointer::Stack(StackPointer {
            from: position,
            to: position,
        })
    }

    pub fn stack_literal(literal: B256) -> Self {
        DataPointer::StackLiteral { literal }
    }

    pub fn definition(definition: impl Into<Bytes>) -> Self {
        DataPointer::Definition(ConstantDefinitionPointer {
            definition: definition.into(),
        })
    }

    pub fn location(&self) -> Location {
        match self {
            DataPointer::Storage(_) => Location::Storage,
            DataPointer::Memory(_) => Location::Memory,
            DataPointer::Calldata(_) => Location::Calldata,
            DataPointer::Stack(_) => Location::Stack,
            DataPointer::StackLiteral { .. } => Location::StackLiteral,
            DataPointer::Definition(_) => Location::Definition,
        }
    }
}
