//! Calldata, in the ABI's head/tail encoding.
//!
//! `start` always addresses where a value's own encoding begins: its head
//! for static values, the tail it was pointed at for dynamic ones. Dynamic
//! members hold an offset relative to the start of their enclosing tuple.

use evmcodec_core::conversion::WORD_SIZE;
use evmcodec_core::{
    ArrayLength, BytesPointer, DataPointer, DecodingError, Location, MemberDefinition,
    StructField, Type, TypeId, Value,
};

use super::{offset, word_to_u64, Decoder};
use crate::allocate::{abi_head_size, allocate_abi_struct, is_dynamic};
use crate::read::{Missing, Step};

const WORD: u64 = WORD_SIZE as u64;

impl Decoder<'_> {
    pub(crate) fn decode_abi(&mut self, ty: &Type, start: u64) -> Step<Value> {
        match ty {
            Type::DynamicBytes { .. } | Type::String { .. } => {
                let length = word_to_u64(&self.reader.byte_word(Location::Calldata, start)?)?;
                let contents = BytesPointer::new(offset(start, WORD)?, length);
                self.decode_bytes_at(ty, Location::Calldata, contents)
            }
            Type::Array {
                element, length, ..
            } => self.decode_abi_array(element, *length, start),
            Type::Struct { id, .. } => self.decode_abi_struct(*id, start),
            Type::Mapping { .. } => Err(DecodingError::UnsupportedLocation {
                ty: ty.to_string(),
                location: Location::Calldata,
            }
            .into()),
            _ => {
                let word = self.reader.byte_word(Location::Calldata, start)?;
                self.decode_basic(ty, word, Location::Calldata)
            }
        }
    }

    /// Decode a parameter list whose head starts at `base`, such as the
    /// arguments after a function selector.
    pub(crate) fn decode_arguments(
        &mut self,
        params: &[MemberDefinition],
        base: u64,
    ) -> Step<Value> {
        let mut head = base;
        let mut fields = Vec::with_capacity(params.len());
        let mut missing = Missing::default();
        for param in params {
            let step = self.decode_abi_member(&param.ty, head, base);
            if let Some(value) = missing.absorb(self.capture(step))? {
                fields.push(StructField {
                    name: param.name.clone(),
                    value,
                });
            }
            head = offset(head, abi_head_size(&param.ty, self.context.types)?)?;
        }
        missing.finish()?;
        Ok(Value::Struct(fields))
    }

    /// A tuple member whose head sits at `head`, in a tuple starting at `base`.
    fn decode_abi_member(&mut self, ty: &Type, head: u64, base: u64) -> Step<Value> {
        if !is_dynamic(ty, self.context.types)? {
            return self.decode_abi(ty, head);
        }
        let relative = word_to_u64(&self.reader.byte_word(Location::Calldata, head)?)?;
        self.decode_abi(ty, offset(base, relative)?)
    }

    pub(super) fn decode_abi_array(
        &mut self,
        element: &Type,
        length: ArrayLength,
        start: u64,
    ) -> Step<Value> {
        let (count, base) = match length {
            ArrayLength::Static(count) => (count, start),
            ArrayLength::Dynamic => {
                let word = self.reader.byte_word(Location::Calldata, start)?;
                let count = word_to_u64(&word).map_err(|_| DecodingError::OverlongArray {
                    length: alloy_primitives::U256::from_be_bytes(word.0).to_string(),
                })?;
                (count, offset(start, WORD)?)
            }
        };
        self.check_array_length(count)?;
        let stride = abi_head_size(element, self.context.types)?;

        let mut items = Vec::with_capacity(count.min(1024) as usize);
        let mut missing = Missing::default();
        for index in 0..count {
            let step = match index.checked_mul(stride).map(|delta| offset(base, delta)) {
                Some(Ok(head)) => self.decode_abi_member(element, head, base),
                Some(Err(e)) => Err(e.into()),
                None => Err(DecodingError::OverlongArray {
                    length: count.to_string(),
                }
                .into()),
            };
            if let Some(item) = missing.absorb(self.capture(step))? {
                items.push(item);
            }
        }
        missing.finish()?;
        Ok(Value::Array(items))
    }

    fn decode_abi_struct(&mut self, id: TypeId, start: u64) -> Step<Value> {
        self.with_struct_guard(id, Location::Calldata, start, |this| {
            let members = allocate_abi_struct(id, this.context.types, start)?;
            let mut fields = Vec::with_capacity(members.len());
            let mut missing = Missing::default();
            for member in members {
                let step = match member.pointer {
                    DataPointer::Calldata(p) => this.decode_abi_member(&member.ty, p.start, start),
                    other => Err(DecodingError::UnsupportedLocation {
                        ty: member.ty.to_string(),
                        location: other.location(),
                    }
                    .into()),
                };
                if let Some(value) = missing.absorb(this.capture(step))? {
                    fields.push(StructField {
                        name: member.name,
                        value,
                    });
                }
            }
            missing.finish()?;
            Ok(Value::Struct(fields))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{value, word_of};
    use super::super::{run, Target};
    use crate::context::DecodeContext;
    use crate::state::EvmState;
    use alloy_dyn_abi::DynSolValue;
    use alloy_primitives::{Address, U256};
    use evmcodec_core::{
        DataPointer, Decoded, DecoderConfig, DecodingError, Location, MemberDefinition,
        StructDefinition, Type, UserDefinedType, UserDefinedTypes, Value,
    };

    fn table() -> UserDefinedTypes {
        UserDefinedTypes::new().with(
            1,
            UserDefinedType::Struct(StructDefinition {
                name: "Label".into(),
                members: vec![
                    MemberDefinition::new("id", Type::uint(256)),
                    MemberDefinition::new("text", Type::string()),
                ],
            }),
        )
    }

    fn calldata(params: Vec<DynSolValue>) -> Vec<u8> {
        let mut data = vec![0xa9u8, 0x05, 0x9c, 0xbb];
        data.extend(DynSolValue::Tuple(params).abi_encode_params());
        data
    }

    #[test]
    fn arguments_match_the_reference_encoder() {
        let types = table();
        let ctx = DecodeContext::new(&types);
        let owner = Address::repeat_byte(0x33);
        let state = EvmState::new().with_calldata(calldata(vec![
            DynSolValue::Address(owner),
            DynSolValue::String("hello".into()),
            DynSolValue::Array(vec![
                DynSolValue::Uint(U256::from(1), 8),
                DynSolValue::Uint(U256::from(2), 8),
            ]),
            DynSolValue::Tuple(vec![
                DynSolValue::Uint(U256::from(9), 256),
                DynSolValue::String("nine".into()),
            ]),
            DynSolValue::Bool(true),
        ]));
        let params = vec![
            MemberDefinition::new("owner", Type::address()),
            MemberDefinition::new("greeting", Type::string()),
            MemberDefinition::new("small", Type::dynamic_array(Type::uint(8))),
            MemberDefinition::new("label", Type::struct_of(1)),
            MemberDefinition::new("flag", Type::Bool),
        ];

        let args = value(run(&Target::Arguments { params, base: 4 }, &ctx, &state));
        assert_eq!(
            args.field("owner").and_then(Decoded::value),
            Some(&Value::Address(owner))
        );
        assert_eq!(
            args.field("greeting").and_then(Decoded::value),
            Some(&Value::string("hello"))
        );
        assert_eq!(
            args.field("small").and_then(Decoded::value),
            Some(&Value::Array(vec![
                Value::Uint(U256::from(1)).into(),
                Value::Uint(U256::from(2)).into(),
            ]))
        );
        let label = args.field("label").and_then(Decoded::value).unwrap();
        assert_eq!(label.field("text").and_then(Decoded::value), Some(&Value::string("nine")));
        assert_eq!(
            args.field("flag").and_then(Decoded::value),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn static_struct_sits_inline() {
        let types = UserDefinedTypes::new().with(
            2,
            UserDefinedType::Struct(StructDefinition {
                name: "Point".into(),
                members: vec![
                    MemberDefinition::new("x", Type::uint(256)),
                    MemberDefinition::new("y", Type::uint(256)),
                ],
            }),
        );
        let ctx = DecodeContext::new(&types);
        let state = EvmState::new().with_calldata(calldata(vec![
            DynSolValue::Tuple(vec![
                DynSolValue::Uint(U256::from(3), 256),
                DynSolValue::Uint(U256::from(4), 256),
            ]),
            DynSolValue::Uint(U256::from(5), 256),
        ]));
        let params = vec![
            MemberDefinition::new("p", Type::struct_of(2)),
            MemberDefinition::new("z", Type::uint(256)),
        ];
        let args = value(run(&Target::Arguments { params, base: 4 }, &ctx, &state));
        assert_eq!(
            args.field("z").and_then(Decoded::value),
            Some(&Value::Uint(U256::from(5)))
        );
    }

    #[test]
    fn bad_offset_only_fails_its_member() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types);
        // string offset points far past the end of calldata
        let mut data = vec![0u8; 4];
        data.extend_from_slice(word_of(0x1000).as_slice());
        data.extend_from_slice(word_of(42).as_slice());
        let state = EvmState::new().with_calldata(data);
        let params = vec![
            MemberDefinition::new("s", Type::string()),
            MemberDefinition::new("n", Type::uint(256)),
        ];
        let args = value(run(&Target::Arguments { params, base: 4 }, &ctx, &state));
        assert!(matches!(
            args.field("s"),
            Some(Decoded::Error {
                error: DecodingError::ReadErrorBytes {
                    location: Location::Calldata,
                    ..
                }
            })
        ));
        assert_eq!(
            args.field("n").and_then(Decoded::value),
            Some(&Value::Uint(U256::from(42)))
        );
    }

    #[test]
    fn strict_mode_rejects_dirty_address() {
        let types = UserDefinedTypes::new();
        let ctx = DecodeContext::new(&types).with_config(DecoderConfig::strict());
        let mut word = [0xffu8; 32];
        word[..11].fill(0);
        let state = EvmState::new().with_calldata(word.to_vec());
        let step = run(
            &Target::Value {
                ty: Type::address(),
                pointer: DataPointer::calldata(0),
            },
            &ctx,
            &state,
        );
        assert!(matches!(
            step,
            Err(crate::read::Interrupt::Stop(stop))
                if matches!(stop.error, DecodingError::AddressPadding { .. })
        ));
    }
}
