//! Memory layout. Every member takes one word, holding either the value or
//! a pointer to it; mappings cannot live in memory and take nothing.

use evmcodec_core::conversion::WORD_SIZE;
use evmcodec_core::{BytesPointer, DataPointer, DecodingError, Type, TypeId, UserDefinedTypes};

use super::AllocatedMember;

pub fn allocate_memory_struct(
    id: TypeId,
    types: &UserDefinedTypes,
    start: u64,
) -> Result<Vec<AllocatedMember>, DecodingError> {
    let definition = types.struct_definition(id)?;
    let mut position = start;
    let mut members = Vec::with_capacity(definition.members.len());
    for member in &definition.members {
        let length = match member.ty {
            Type::Mapping { .. } => 0,
            _ => WORD_SIZE as u64,
        };
        members.push(AllocatedMember {
            name: member.name.clone(),
            ty: member.ty.clone(),
            pointer: DataPointer::Memory(BytesPointer::new(position, length)),
        });
        position = position
            .checked_add(length)
            .ok_or_else(|| DecodingError::OverlargePointer {
                raw: format!("{start:x}"),
            })?;
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmcodec_core::{MemberDefinition, StructDefinition, UserDefinedType};

    #[test]
    fn one_word_per_member_and_none_for_mappings() {
        let types = UserDefinedTypes::new().with(
            1,
            UserDefinedType::Struct(StructDefinition {
                name: "S".into(),
                members: vec![
                    MemberDefinition::new("a", Type::uint(8)),
                    MemberDefinition::new("m", Type::mapping(Type::uint(256), Type::Bool)),
                    MemberDefinition::new("b", Type::string()),
                ],
            }),
        );
        let members = allocate_memory_struct(TypeId(1), &types, 0x80).unwrap();
        let pointers: Vec<_> = members.iter().map(|m| m.pointer.clone()).collect();
        assert_eq!(
            pointers,
            vec![
                DataPointer::Memory(BytesPointer::new(0x80, 32)),
                DataPointer::Memory(BytesPointer::new(0xa0, 0)),
                DataPointer::Memory(BytesPointer::new(0xa0, 32)),
            ]
        );
    }

    #[test]
    fn unknown_struct_is_an_error() {
        let err = allocate_memory_struct(TypeId(9), &UserDefinedTypes::new(), 0).unwrap_err();
        assert_eq!(err, DecodingError::UnknownUserDefinedType { id: TypeId(9) });
    }
}
