//! Storage layout: how values pack into 32-byte slots.
//!
//! Values smaller than a word share a slot while they fit, filling it from
//! the low-order end; a value that would straddle a boundary starts a new
//! slot. Structs and static arrays always start and end on a slot boundary.
//! Dynamic values (mappings, dynamic arrays, `bytes`, `string`) take one
//! slot here and keep their contents at a hashed slot.

use alloy_primitives::U256;
use evmcodec_core::conversion::{bytes_for_count, ADDRESS_SIZE, WORD_SIZE};
use evmcodec_core::{
    ArrayLength, DataPointer, DecodingError, FunctionVisibility, MemberDefinition, Slot,
    StoragePosition, StorageRange, Type, TypeId, UserDefinedTypes,
};

use super::AllocatedMember;

/// How much storage a value takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageSize {
    /// Fewer than 32 bytes (or exactly 32 for word-sized value types); may
    /// share a slot.
    Bytes(u8),
    /// Whole slots.
    Words(u64),
}

impl StorageSize {
    pub fn words(self) -> u64 {
        match self {
            StorageSize::Bytes(_) => 1,
            StorageSize::Words(words) => words,
        }
    }
}

/// A struct member placed in storage, relative to the struct's first slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageMember {
    pub name: String,
    pub ty: Type,
    /// Slot offset from the struct's base slot.
    pub slot: u64,
    /// Bytes already used in that slot below this member.
    pub byte_offset: u8,
    pub size: StorageSize,
}

impl StorageMember {
    /// The member's range in a struct whose first slot is `base`.
    pub fn range(&self, base: &Slot) -> StorageRange {
        self.place(Slot::child(base, U256::from(self.slot)))
    }

    /// The range of a contract state variable, at its own top-level slot.
    pub fn variable_range(&self) -> StorageRange {
        self.place(Slot::new(U256::from(self.slot)))
    }

    fn place(&self, slot: Slot) -> StorageRange {
        match self.size {
            StorageSize::Bytes(length) => packed_range(slot, self.byte_offset, length),
            StorageSize::Words(words) => StorageRange::words(slot, U256::from(words.max(1))),
        }
    }
}

/// The storage plan of a struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageLayout {
    pub members: Vec<StorageMember>,
    /// Slots the whole struct takes.
    pub words: u64,
}

impl StorageLayout {
    /// Members with pointers for a struct whose first slot is `base`.
    pub fn members_at(&self, base: &Slot) -> Vec<AllocatedMember> {
        self.members
            .iter()
            .map(|m| AllocatedMember {
                name: m.name.clone(),
                ty: m.ty.clone(),
                pointer: DataPointer::storage(m.range(base)),
            })
            .collect()
    }

    /// Pointers for contract state variables.
    pub fn variables(&self) -> Vec<AllocatedMember> {
        self.members
            .iter()
            .map(|m| AllocatedMember {
                name: m.name.clone(),
                ty: m.ty.clone(),
                pointer: DataPointer::storage(m.variable_range()),
            })
            .collect()
    }
}

pub fn storage_size(ty: &Type, types: &UserDefinedTypes) -> Result<StorageSize, DecodingError> {
    size_of(ty, types, &mut Vec::new())
}

pub fn allocate_storage_struct(
    id: TypeId,
    types: &UserDefinedTypes,
) -> Result<StorageLayout, DecodingError> {
    layout_of(id, types, &mut Vec::new())
}

/// Lay out a contract's state variables from slot 0, packed like struct
/// members.
pub fn allocate_contract_storage(
    variables: &[MemberDefinition],
    types: &UserDefinedTypes,
) -> Result<StorageLayout, DecodingError> {
    pack(variables, types, &mut Vec::new())
}

/// The range a value of `ty` occupies when it starts at the top of `slot`
/// (a top-level variable, a mapping value, or a stack reference).
pub fn storage_range_at(
    ty: &Type,
    slot: &Slot,
    types: &UserDefinedTypes,
) -> Result<StorageRange, DecodingError> {
    Ok(match storage_size(ty, types)? {
        StorageSize::Bytes(length) => packed_range(slot.clone(), 0, length),
        StorageSize::Words(words) => StorageRange::words(slot.clone(), U256::from(words.max(1))),
    })
}

/// The range of element `index` of an array whose data starts at `data`.
pub fn element_range(data: &Slot, element: StorageSize, index: u64) -> StorageRange {
    match element {
        StorageSize::Bytes(length) => {
            let per_slot = (WORD_SIZE / usize::from(length.max(1))) as u64;
            let slot = Slot::child(data, U256::from(index / per_slot));
            let byte_offset = ((index % per_slot) * u64::from(length)) as u8;
            packed_range(slot, byte_offset, length)
        }
        StorageSize::Words(words) => {
            let slot = Slot::child(data, U256::from(index) * U256::from(words));
            StorageRange::words(slot, U256::from(words.max(1)))
        }
    }
}

fn packed_range(slot: Slot, byte_offset: u8, length: u8) -> StorageRange {
    let last = (WORD_SIZE - 1) as u8 - byte_offset;
    StorageRange {
        from: StoragePosition::new(slot.clone(), last + 1 - length),
        to: Some(StoragePosition::new(slot, last)),
        length: None,
    }
}

fn byte_width(bits: u16) -> u8 {
    (bits / 8).clamp(1, WORD_SIZE as u16) as u8
}

fn size_of(
    ty: &Type,
    types: &UserDefinedTypes,
    visiting: &mut Vec<TypeId>,
) -> Result<StorageSize, DecodingError> {
    Ok(match ty {
        Type::Uint { bits }
        | Type::Int { bits }
        | Type::Fixed { bits, .. }
        | Type::Ufixed { bits, .. } => StorageSize::Bytes(byte_width(*bits)),
        Type::Bool => StorageSize::Bytes(1),
        Type::Address { .. } | Type::Contract { .. } => StorageSize::Bytes(ADDRESS_SIZE as u8),
        Type::FixedBytes { length } => StorageSize::Bytes((*length).clamp(1, WORD_SIZE as u8)),
        Type::Enum { id } => {
            let options = types.enum_definition(*id)?.options.len();
            StorageSize::Bytes(bytes_for_count(options) as u8)
        }
        Type::Function {
            visibility: FunctionVisibility::External,
            ..
        } => StorageSize::Bytes(24),
        Type::Function {
            visibility: FunctionVisibility::Internal,
            ..
        } => StorageSize::Bytes(8),
        Type::DynamicBytes { .. }
        | Type::String { .. }
        | Type::Mapping { .. }
        | Type::Array {
            length: ArrayLength::Dynamic,
            ..
        } => StorageSize::Words(1),
        Type::Array {
            element,
            length: ArrayLength::Static(count),
            ..
        } => {
            let element = size_of(element, types, visiting)?;
            StorageSize::Words(array_words(element, *count)?)
        }
        Type::Struct { id, .. } => StorageSize::Words(layout_of(*id, types, visiting)?.words),
    })
}

fn array_words(element: StorageSize, count: u64) -> Result<u64, DecodingError> {
    let words = match element {
        StorageSize::Bytes(length) => {
            let per_slot = (WORD_SIZE / usize::from(length.max(1))) as u64;
            Some(count.div_ceil(per_slot))
        }
        StorageSize::Words(words) => count.checked_mul(words),
    };
    words.ok_or_else(|| DecodingError::OverlongArray {
        length: count.to_string(),
    })
}

fn layout_of(
    id: TypeId,
    types: &UserDefinedTypes,
    visiting: &mut Vec<TypeId>,
) -> Result<StorageLayout, DecodingError> {
    if visiting.contains(&id) {
        return Err(DecodingError::RecursiveStruct { id });
    }
    let definition = types.struct_definition(id)?;
    visiting.push(id);
    let layout = pack(&definition.members, types, visiting);
    visiting.pop();
    layout
}

fn pack(
    definitions: &[MemberDefinition],
    types: &UserDefinedTypes,
    visiting: &mut Vec<TypeId>,
) -> Result<StorageLayout, DecodingError> {
    let mut members = Vec::with_capacity(definitions.len());
    let mut slot: u64 = 0;
    let mut used: u8 = 0;
    for member in definitions {
        let size = size_of(&member.ty, types, visiting)?;
        let byte_offset = match size {
            StorageSize::Bytes(length) => {
                if usize::from(used) + usize::from(length) > WORD_SIZE {
                    slot = advance(slot, 1)?;
                    used = 0;
                }
                let at = used;
                used += length;
                at
            }
            StorageSize::Words(_) => {
                if used > 0 {
                    slot = advance(slot, 1)?;
                    used = 0;
                }
                0
            }
        };
        members.push(StorageMember {
            name: member.name.clone(),
            ty: member.ty.clone(),
            slot,
            byte_offset,
            size,
        });
        if let StorageSize::Words(words) = size {
            slot = advance(slot, words)?;
        }
    }

    let words = if used > 0 { advance(slot, 1)? } else { slot };
    Ok(StorageLayout { members, words })
}

/// Move the slot counter on, failing once the layout no longer fits in
/// 64 bits of slots.
fn advance(slot: u64, by: u64) -> Result<u64, DecodingError> {
    slot.checked_add(by)
        .ok_or_else(|| DecodingError::OverlongArray {
            length: (U256::from(slot) + U256::from(by)).to_string(),
        })
}
