//! The Solidity type model that drives every layout decision.
//!
//! [`Type`] is a closed enum so each decoder matches it exhaustively.
//! Structs, enums and contracts are referenced by [`TypeId`] into a
//! [`UserDefinedTypes`] table rather than embedded, which keeps the model
//! acyclic even for self-referential structs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::DecodingError;
use crate::pointer::Location;

/// Identifier of a user-defined type (struct, enum or contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u64);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Length of an array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayLength {
    Static(u64),
    Dynamic,
}

/// Visibility of a function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionVisibility {
    /// Address + selector, 24 bytes.
    External,
    /// Pair of program counters, 8 bytes.
    Internal,
}

/// State mutability of a function type, display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    Pure,
    View,
    #[default]
    Nonpayable,
    Payable,
}

/// A Solidity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type_class", rename_all = "snake_case")]
pub enum Type {
    Uint {
        bits: u16,
    },
    Int {
        bits: u16,
    },
    Bool,
    Address {
        #[serde(default)]
        payable: bool,
    },
    Contract {
        id: TypeId,
    },
    /// `bytes1` .. `bytes32`
    FixedBytes {
        length: u8,
    },
    /// `bytes`
    DynamicBytes {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Location>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Location>,
    },
    Fixed {
        bits: u16,
        places: u8,
    },
    Ufixed {
        bits: u16,
        places: u8,
    },
    Array {
        element: Box<Type>,
        length: ArrayLength,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Location>,
    },
    Struct {
        id: TypeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Location>,
    },
    Mapping {
        key: Box<Type>,
        value: Box<Type>,
    },
    Enum {
        id: TypeId,
    },
    Function {
        visibility: FunctionVisibility,
        #[serde(default)]
        mutability: Mutability,
    },
}

impl Type {
    pub fn uint(bits: u16) -> Self {
        Type::Uint { bits }
    }

    pub fn int(bits: u16) -> Self {
        Type::Int { bits }
    }

    pub fn address() -> Self {
        Type::Address { payable: false }
    }

    pub fn fixed_bytes(length: u8) -> Self {
        Type::FixedBytes { length }
    }

    pub fn bytes() -> Self {
        Type::DynamicBytes { location: None }
    }

    pub fn string() -> Self {
        Type::String { location: None }
    }

    pub fn static_array(element: Type, length: u64) -> Self {
        Type::Array {
            element: Box::new(element),
            length: ArrayLength::Static(length),
            location: None,
        }
    }

    pub fn dynamic_array(element: Type) -> Self {
        Type::Array {
            element: Box::new(element),
            length: ArrayLength::Dynamic,
            location: None,
        }
    }

    pub fn struct_of(id: u64) -> Self {
        Type::Struct {
            id: TypeId(id),
            location: None,
        }
    }

    pub fn mapping(key: Type, value: Type) -> Self {
        Type::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn external_function() -> Self {
        Type::Function {
            visibility: FunctionVisibility::External,
            mutability: Mutability::default(),
        }
    }

    /// Attach a data location to a reference type. Value types are returned
    /// unchanged.
    pub fn located(self, at: Location) -> Self {
        match self {
            Type::DynamicBytes { .. } => Type::DynamicBytes { location: Some(at) },
            Type::String { .. } => Type::String { location: Some(at) },
            Type::Array { element, length, .. } => Type::Array {
                element,
                length,
                location: Some(at),
            },
            Type::Struct { id, .. } => Type::Struct {
                id,
                location: Some(at),
            },
            other => other,
        }
    }

    /// The data location a reference type was declared with.
    pub fn location(&self) -> Option<Location> {
        match self {
            Type::DynamicBytes { location }
            | Type::String { location }
            | Type::Array { location, .. }
            | Type::Struct { location, .. } => *location,
            Type::Mapping { .. } => Some(Location::Storage),
            _ => None,
        }
    }

    /// Whether the whole value fits in a single word.
    pub fn is_basic(&self) -> bool {
        matches!(
            self,
            Type::Uint { .. }
                | Type::Int { .. }
                | Type::Bool
                | Type::Address { .. }
                | Type::Contract { .. }
                | Type::FixedBytes { .. }
                | Type::Fixed { .. }
                | Type::Ufixed { .. }
                | Type::Enum { .. }
                | Type::Function { .. }
        )
    }

    /// `bytes` or `string`.
    pub fn is_bytes_like(&self) -> bool {
        matches!(self, Type::DynamicBytes { .. } | Type::String { .. })
    }

    /// Whether values of this type are held by reference (pointer word,
    /// storage slot, or calldata offset).
    pub fn is_reference(&self) -> bool {
        !self.is_basic()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Uint { bits } => write!(f, "uint{bits}"),
            Type::Int { bits } => write!(f, "int{bits}"),
            Type::Bool => write!(f, "bool"),
            Type::Address { payable: true } => write!(f, "address payable"),
            Type::Address { payable: false } => write!(f, "address"),
            Type::Contract { id } => write!(f, "contract {id}"),
            Type::FixedBytes { length } => write!(f, "bytes{length}"),
            Type::DynamicBytes { .. } => write!(f, "bytes"),
            Type::String { .. } => write!(f, "string"),
            Type::Fixed { bits, places } => write!(f, "fixed{bits}x{places}"),
            Type::Ufixed { bits, places } => write!(f, "ufixed{bits}x{places}"),
            Type::Array {
                element,
                length: ArrayLength::Static(n),
                ..
            } => write!(f, "{element}[{n}]"),
            Type::Array {
                element,
                length: ArrayLength::Dynamic,
                ..
            } => write!(f, "{element}[]"),
            Type::Struct { id, .. } => write!(f, "struct {id}"),
            Type::Mapping { key, value } => write!(f, "mapping({key} => {value})"),
            Type::Enum { id } => write!(f, "enum {id}"),
            Type::Function {
                visibility: FunctionVisibility::External,
                ..
            } => write!(f, "function external"),
            Type::Function {
                visibility: FunctionVisibility::Internal,
                ..
            } => write!(f, "function internal"),
        }
    }
}

/// A named member of a struct, or a named parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    /// Compiler-provided type string, for display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
}

impl MemberDefinition {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            type_hint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub members: Vec<MemberDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub name: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    #[default]
    Contract,
    Library,
    Interface,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: ContractKind,
}

/// Definition of a struct, enum or contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UserDefinedType {
    Struct(StructDefinition),
    Enum(EnumDefinition),
    Contract(ContractDefinition),
}

impl UserDefinedType {
    pub fn name(&self) -> &str {
        match self {
            UserDefinedType::Struct(d) => &d.name,
            UserDefinedType::Enum(d) => &d.name,
            UserDefinedType::Contract(d) => &d.name,
        }
    }
}

/// Immutable id → definition table, built once per compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserDefinedTypes {
    types: HashMap<TypeId, UserDefinedType>,
}

impl UserDefinedTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; the table is not mutated after construction.
    pub fn with(mut self, id: u64, definition: UserDefinedType) -> Self {
        self.types.insert(TypeId(id), definition);
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, id: TypeId) -> Result<&UserDefinedType, DecodingError> {
        self.types
            .get(&id)
            .ok_or(DecodingError::UnknownUserDefinedType { id })
    }

    pub fn struct_definition(&self, id: TypeId) -> Result<&StructDefinition, DecodingError> {
        match self.get(id)? {
            UserDefinedType::Struct(d) => Ok(d),
            _ => Err(DecodingError::UserDefinedTypeMismatch {
                id,
                expected: "struct".into(),
            }),
        }
    }

    pub fn enum_definition(&self, id: TypeId) -> Result<&EnumDefinition, DecodingError> {
        match self.get(id)? {
            UserDefinedType::Enum(d) => Ok(d),
            _ => Err(DecodingError::UserDefinedTypeMismatch {
                id,
                expected: "enum".into(),
            }),
        }
    }

    pub fn contract_definition(&self, id: TypeId) -> Result<&ContractDefinition, DecodingError> {
        match self.get(id)? {
            UserDefinedType::Contract(d) => Ok(d),
            _ => Err(DecodingError::UserDefinedTypeMismatch {
                id,
                expected: "contract".into(),
            }),
        }
    }
}

impl FromIterator<(TypeId, UserDefinedType)> for UserDefinedTypes {
    fn from_iter<I: IntoIterator<Item = (TypeId, UserDefinedType)>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_display() {
        assert_eq!(Type::uint(256).to_string(), "uint256");
        assert_eq!(Type::fixed_bytes(4).to_string(), "bytes4");
        assert_eq!(Type::static_array(Type::uint(8), 3).to_string(), "uint8[3]");
        assert_eq!(
            Type::mapping(Type::address(), Type::dynamic_array(Type::Bool)).to_string(),
            "mapping(address => bool[])"
        );
    }

    #[test]
    fn missing_id_is_a_decoding_error() {
        let table = UserDefinedTypes::new().with(
            1,
            UserDefinedType::Enum(EnumDefinition {
                name: "Color".into(),
                options: vec!["Red".into()],
            }),
        );
        assert!(table.enum_definition(TypeId(1)).is_ok());
        assert_eq!(
            table.get(TypeId(2)).unwrap_err(),
            DecodingError::UnknownUserDefinedType { id: TypeId(2) }
        );
        assert!(matches!(
            table.struct_definition(TypeId(1)),
            Err(DecodingError::UserDefinedTypeMismatch { .. })
        ));
    }

    #[test]
    fn type_table_from_json() {
        let json = r#"{
            "7": {"kind": "struct", "name": "Pair", "members": [
                {"name": "a", "type": {"type_class": "uint", "bits": 128}},
                {"name": "b", "type": {"type_class": "bool"}, "type_hint": "bool"}
            ]}
        }"#;
        let table: UserDefinedTypes = serde_json::from_str(json).unwrap();
        let pair = table.struct_definition(TypeId(7)).unwrap();
        assert_eq!(pair.members.len(), 2);
        assert_eq!(pair.members[1].ty, Type::Bool);
    }
}
