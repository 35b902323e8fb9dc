//! Decoded values and the result tree.
//!
//! A decode never fails as a whole (short of strict mode): it produces a
//! [`Decoded`] tree whose leaves are either values or [`DecodingError`]s.

use alloy_primitives::{Address, Bytes, FixedBytes, I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CodecError, DecodingError};

/// One node of a result tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Decoded {
    Value { value: Value },
    Error { error: DecodingError },
}

impl Decoded {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Decoded::Value { value } => Some(value),
            Decoded::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&DecodingError> {
        match self {
            Decoded::Value { .. } => None,
            Decoded::Error { error } => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Decoded::Error { .. })
    }

    /// Every error leaf in this tree, depth first.
    pub fn errors(&self) -> Vec<&DecodingError> {
        let mut out = Vec::new();
        self.collect_errors(&mut out);
        out
    }

    fn collect_errors<'a>(&'a self, out: &mut Vec<&'a DecodingError>) {
        match self {
            Decoded::Error { error } => out.push(error),
            Decoded::Value { value } => match value {
                Value::Array(items) => items.iter().for_each(|d| d.collect_errors(out)),
                Value::Struct(fields) => fields.iter().for_each(|f| f.value.collect_errors(out)),
                Value::Mapping(entries) => {
                    entries.iter().for_each(|e| e.value.collect_errors(out))
                }
                _ => {}
            },
        }
    }
}

impl From<Value> for Decoded {
    fn from(value: Value) -> Self {
        Decoded::Value { value }
    }
}

impl From<DecodingError> for Decoded {
    fn from(error: DecodingError) -> Self {
        Decoded::Error { error }
    }
}

/// Contents of a `string`. Invalid UTF-8 is data, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StringValue {
    Valid {
        #[serde(rename = "asString")]
        as_string: String,
    },
    Malformed {
        #[serde(rename = "asHex")]
        as_hex: String,
    },
}

impl StringValue {
    pub fn from_bytes(raw: &[u8]) -> Self {
        match std::str::from_utf8(raw) {
            Ok(s) => StringValue::Valid {
                as_string: s.to_string(),
            },
            Err(_) => StringValue::Malformed {
                as_hex: hex::encode(raw),
            },
        }
    }

    /// The bytes this string was decoded from.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            StringValue::Valid { as_string } => Ok(as_string.as_bytes().to_vec()),
            StringValue::Malformed { as_hex } => crate::conversion::from_hex(as_hex),
        }
    }
}

/// A fixed-point number, held as the integer scaled by `10^places`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedValue {
    pub raw: I256,
    pub places: u8,
}

impl FixedValue {
    /// Parse a decimal like `-1.25`, scaling it up by `10^places`.
    pub fn from_decimal_str(input: &str, places: u8) -> Result<Self, CodecError> {
        let (negative, magnitude) = parse_scaled(input, places)?;
        let magnitude = I256::try_from(magnitude).map_err(|e| CodecError::InvalidDecimal {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        let raw = if negative { -magnitude } else { magnitude };
        Ok(Self { raw, places })
    }
}

impl fmt::Display for FixedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.raw.is_negative() { "-" } else { "" };
        write_scaled(f, sign, self.raw.unsigned_abs(), self.places)
    }
}

/// An unsigned fixed-point number, held as the integer scaled by
/// `10^places`. The full 256 bits are magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UfixedValue {
    pub raw: U256,
    pub places: u8,
}

impl UfixedValue {
    /// Parse a non-negative decimal like `1.25`, scaling it up by `10^places`.
    pub fn from_decimal_str(input: &str, places: u8) -> Result<Self, CodecError> {
        match parse_scaled(input, places)? {
            (true, magnitude) if !magnitude.is_zero() => Err(CodecError::InvalidDecimal {
                input: input.to_string(),
                reason: "negative value for an unsigned type".into(),
            }),
            (_, raw) => Ok(Self { raw, places }),
        }
    }
}

impl fmt::Display for UfixedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, "", self.raw, self.places)
    }
}

/// Split a decimal into its sign and its magnitude scaled by `10^places`.
fn parse_scaled(input: &str, places: u8) -> Result<(bool, U256), CodecError> {
    let invalid = |reason: &str| CodecError::InvalidDecimal {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    let (negative, digits) = match input.trim().strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.trim()),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if fraction.len() > usize::from(places) {
        return Err(invalid("more fractional digits than the type allows"));
    }
    let mut scaled = String::with_capacity(whole.len() + usize::from(places));
    scaled.push_str(whole);
    scaled.push_str(fraction);
    scaled.extend(std::iter::repeat('0').take(usize::from(places) - fraction.len()));
    if !scaled.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }
    let significant = match scaled.trim_start_matches('0') {
        "" => "0",
        rest => rest,
    };
    let magnitude = U256::from_str_radix(significant, 10).map_err(|e| invalid(&e.to_string()))?;
    Ok((negative, magnitude))
}

fn write_scaled(
    f: &mut fmt::Formatter<'_>,
    sign: &str,
    magnitude: U256,
    places: u8,
) -> fmt::Result {
    let digits = magnitude.to_string();
    let places = usize::from(places);
    if places == 0 {
        return write!(f, "{sign}{digits}");
    }
    let padded = format!("{digits:0>width$}", width = places + 1);
    let (whole, fraction) = padded.split_at(padded.len() - places);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        write!(f, "{sign}{whole}")
    } else {
        write!(f, "{sign}{whole}.{fraction}")
    }
}

/// An enum value. `name` is the option name from the type table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub index: u64,
    pub name: String,
}

/// The contract an address points at, if the decoder could recognise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContractValue {
    Known { address: Address, name: String },
    Unknown { address: Address },
}

impl ContractValue {
    pub fn address(&self) -> Address {
        match self {
            ContractValue::Known { address, .. } | ContractValue::Unknown { address } => *address,
        }
    }
}

/// What an external function value resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FunctionInfo {
    /// Contract recognised and the selector found in its ABI.
    Known { function: String },
    /// Contract recognised but the selector is not in its ABI.
    Invalid,
    /// Contract not recognised.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub value: Decoded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub key: Value,
    pub value: Decoded,
}

/// A decoded value, tagged by type class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Uint(U256),
    Int(I256),
    Bool(bool),
    Address(Address),
    Contract(ContractValue),
    FixedBytes(Bytes),
    Bytes(Bytes),
    String(StringValue),
    Fixed(FixedValue),
    Ufixed(UfixedValue),
    Enum(EnumValue),
    Array(Vec<Decoded>),
    Struct(Vec<StructField>),
    Mapping(Vec<MappingEntry>),
    ExternalFunction {
        contract: ContractValue,
        selector: FixedBytes<4>,
        info: FunctionInfo,
    },
    InternalFunction {
        deployed_pc: u32,
        constructor_pc: u32,
    },
}

impl Value {
    /// Convenience for valid strings.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(StringValue::Valid {
            as_string: s.into(),
        })
    }

    /// Hex (no prefix) of byte-valued variants.
    pub fn as_hex(&self) -> Option<String> {
        match self {
            Value::FixedBytes(b) | Value::Bytes(b) => Some(hex::encode(b)),
            Value::String(StringValue::Malformed { as_hex }) => Some(as_hex.clone()),
            _ => None,
        }
    }

    pub fn as_u256(&self) -> Option<U256> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Look up a struct field by name.
    pub fn field(&self, name: &str) -> Option<&Decoded> {
        match self {
            Value::Struct(fields) => fields.iter().find(|f| f.name == name).map(|f| &f.value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Address(a) => write!(f, "{a}"),
            Value::Contract(ContractValue::Known { address, name }) => {
                write!(f, "{name}({address})")
            }
            Value::Contract(ContractValue::Unknown { address }) => write!(f, "{address}"),
            Value::FixedBytes(b) | Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::String(StringValue::Valid { as_string }) => write!(f, "{as_string:?}"),
            Value::String(StringValue::Malformed { as_hex }) => write!(f, "<malformed 0x{as_hex}>"),
            Value::Fixed(v) => write!(f, "{v}"),
            Value::Ufixed(v) => write!(f, "{v}"),
            Value::Enum(e) => write!(f, "{}", e.name),
            Value::Array(items) => {
                let parts: Vec<_> = items.iter().map(display_decoded).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Struct(fields) => {
                let parts: Vec<_> = fields
                    .iter()
                    .map(|field| format!("{}: {}", field.name, display_decoded(&field.value)))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Mapping(entries) => {
                let parts: Vec<_> = entries
                    .iter()
                    .map(|e| format!("{} => {}", e.key, display_decoded(&e.value)))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::ExternalFunction {
                contract, selector, info,
            } => match info {
                FunctionInfo::Known { function } => {
                    write!(f, "{}.{function}", Value::Contract(contract.clone()))
                }
                _ => write!(f, "{}.{selector}", contract.address()),
            },
            Value::InternalFunction {
                deployed_pc,
                constructor_pc,
            } => write!(f, "internal(pc {deployed_pc}, constructor pc {constructor_pc})"),
        }
    }
}

fn display_decoded(d: &Decoded) -> String {
    match d {
        Decoded::Value { value } => value.to_string(),
        Decoded::Error { error } => format!("<error: {error}>"),
    }
}
