//! ABI (calldata) layout: head/tail encoding.
//!
//! Static values sit inline in the head. Dynamic values (`bytes`, `string`,
//! dynamic arrays, and static arrays or structs containing one) take one
//! head word holding an offset from the start of the enclosing tuple.

use evmcodec_core::conversion::WORD_SIZE;
use evmcodec_core::{
    ArrayLength, BytesPointer, DataPointer, DecodingError, Type, TypeId, UserDefinedTypes,
};

use super::AllocatedMember;

pub fn is_dynamic(ty: &Type, types: &UserDefinedTypes) -> Result<bool, DecodingError> {
    dynamic(ty, types, &mut Vec::new())
}

/// Bytes a value of `ty` takes in the head of its tuple.
pub fn abi_head_size(ty: &Type, types: &UserDefinedTypes) -> Result<u64, DecodingError> {
    head_size(ty, types, &mut Vec::new())
}

/// Members of a struct encoded at `start`, each pointing at its head.
pub fn allocate_abi_struct(
    id: TypeId,
    types: &UserDefinedTypes,
    start: u64,
) -> Result<Vec<AllocatedMember>, DecodingError> {
    let definition = types.struct_definition(id)?;
    let mut position = start;
    let mut members = Vec::with_capacity(definition.members.len());
    for member in &definition.members {
        let length = abi_head_size(&member.ty, types)?;
        members.push(AllocatedMember {
            name: member.name.clone(),
            ty: member.ty.clone(),
            pointer: DataPointer::Calldata(BytesPointer::new(position, length)),
        });
        position = position
            .checked_add(length)
            .ok_or_else(|| DecodingError::OverlargePointer {
                raw: format!("{start:x}"),
            })?;
    }
    Ok(members)
}

fn dynamic(
    ty: &Type,
    types: &UserDefinedTypes,
    visiting: &mut Vec<TypeId>,
) -> Result<bool, DecodingError> {
    match ty {
        Type::DynamicBytes { .. }
        | Type::String { .. }
        | Type::Array {
            length: ArrayLength::Dynamic,
            ..
        } => Ok(true),
        Type::Array { element, .. } => dynamic(element, types, visiting),
        Type::Struct { id, .. } => {
            let definition = enter(*id, types, visiting)?;
            let mut result = Ok(false);
            for member in &definition.members {
                match dynamic(&member.ty, types, visiting) {
                    Ok(false) => continue,
                    other => {
                        result = other;
                        break;
                    }
                }
            }
            visiting.pop();
            result
        }
        _ => Ok(false),
    }
}

fn head_size(
    ty: &Type,
    types: &UserDefinedTypes,
    visiting: &mut Vec<TypeId>,
) -> Result<u64, DecodingError> {
    if dynamic(ty, types, visiting)? {
        return Ok(WORD_SIZE as u64);
    }
    match ty {
        Type::Mapping { .. } => Ok(0),
        Type::Array {
            element,
            length: ArrayLength::Static(count),
            ..
        } => {
            let element = head_size(element, types, visiting)?;
            count
                .checked_mul(element)
                .ok_or_else(|| DecodingError::OverlongArray {
                    length: count.to_string(),
                })
        }
        Type::Struct { id, .. } => {
            let definition = enter(*id, types, visiting)?;
            let mut total: u64 = 0;
            let mut result = Ok(());
            for member in &definition.members {
                match head_size(&member.ty, types, visiting) {
                    Ok(size) => total = total.saturating_add(size),
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                }
            }
            visiting.pop();
            result.map(|()| total)
        }
        _ => Ok(WORD_SIZE as u64),
    }
}

fn enter<'t>(
    id: TypeId,
    types: &'t UserDefinedTypes,
    visiting: &mut Vec<TypeId>,
) -> Result<&'t evmcodec_core::StructDefinition, DecodingError> {
    if visiting.contains(&id) {
        return Err(DecodingError::RecursiveStruct { id });
    }
    let definition = types.struct_definition(id)?;
    visiting.push(id);
    Ok(definition)
}
