//! # Object Mapper
//!
//! The translation layer between `Value` and the `fleetpack` wire format.
//!
//! ## Invariants
//! - **Recursion Safety**: Encoding and decoding are bounded by `MAX_NESTING_DEPTH`.
//! - **Self Describing**: Every value starts with a tag byte, so arguments can be
//!   decoded before the receiving side knows which method they belong to.

use std::collections::BTreeMap;

use fleetpack::DataBuf;
use fleetpack::DataBufReader;

use crate::descriptor::TypeDesc;
use crate::error::Error;
use crate::error::Result;

/// The maximum nesting depth for values before the codec gives up.
pub const MAX_NESTING_DEPTH: usize = 64;

mod tag {
    pub const NULL: u8 = 0x00;
    pub const BOOL: u8 = 0x01;
    pub const BYTE: u8 = 0x02;
    pub const SHORT: u8 = 0x03;
    pub const INT: u8 = 0x04;
    pub const LONG: u8 = 0x05;
    pub const FLOAT: u8 = 0x06;
    pub const DOUBLE: u8 = 0x07;
    pub const CHAR: u8 = 0x08;
    pub const STRING: u8 = 0x10;
    pub const BYTES: u8 = 0x11;
    pub const LIST: u8 = 0x20;
    pub const RECORD: u8 = 0x21;
}

/// A dynamically typed argument or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Named fields, e.g. the snapshot of an object.
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the value's kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ============================================================================
//  ENCODING
// ============================================================================

/// Encodes a value into the buffer.
///
/// # Errors
/// Returns `Error::NestingTooDeep` if the value is too deeply nested.
pub fn encode_value(buf: &mut DataBuf, value: &Value) -> Result<()> {
    encode_value_impl(buf, value, 0)
}

fn encode_value_impl(buf: &mut DataBuf, value: &Value, depth: usize) -> Result<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::NestingTooDeep);
    }

    match value {
        Value::Null => {
            buf.write_u8(tag::NULL);
        }
        Value::Bool(v) => {
            buf.write_u8(tag::BOOL).write_bool(*v);
        }
        Value::Byte(v) => {
            buf.write_u8(tag::BYTE).write_byte(*v);
        }
        Value::Short(v) => {
            buf.write_u8(tag::SHORT).write_short(*v);
        }
        Value::Int(v) => {
            buf.write_u8(tag::INT).write_int(*v);
        }
        Value::Long(v) => {
            buf.write_u8(tag::LONG).write_long(*v);
        }
        Value::Float(v) => {
            buf.write_u8(tag::FLOAT).write_float(*v);
        }
        Value::Double(v) => {
            buf.write_u8(tag::DOUBLE).write_double(*v);
        }
        Value::Char(v) => {
            buf.write_u8(tag::CHAR).write_char(*v);
        }
        Value::String(v) => {
            buf.write_u8(tag::STRING).write_string(v)?;
        }
        Value::Bytes(v) => {
            buf.write_u8(tag::BYTES).write_bytes(v)?;
        }
        Value::List(items) => {
            buf.write_u8(tag::LIST).write_int(count(items.len())?);
            for item in items {
                encode_value_impl(buf, item, depth + 1)?;
            }
        }
        Value::Record(fields) => {
            buf.write_u8(tag::RECORD).write_int(count(fields.len())?);
            for (name, field) in fields {
                buf.write_string(name)?;
                encode_value_impl(buf, field, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn count(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::Buffer(fleetpack::Error::BlobTooLarge(len)))
}

// ============================================================================
//  DECODING
// ============================================================================

/// Decodes the next value from the reader.
pub fn decode_value(reader: &mut DataBufReader) -> Result<Value> {
    decode_value_impl(reader, 0)
}

/// Decodes the next value and checks it against the declared type.
pub fn decode_value_as(reader: &mut DataBufReader, ty: &TypeDesc) -> Result<Value> {
    let value = decode_value(reader)?;
    if ty.accepts(&value) {
        Ok(value)
    } else {
        Err(Error::TypeMismatch { expected: ty.to_string(), found: value.kind() })
    }
}

fn decode_value_impl(reader: &mut DataBufReader, depth: usize) -> Result<Value> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::NestingTooDeep);
    }

    let value = match reader.read_u8()? {
        tag::NULL => Value::Null,
        tag::BOOL => Value::Bool(reader.read_bool()?),
        tag::BYTE => Value::Byte(reader.read_byte()?),
        tag::SHORT => Value::Short(reader.read_short()?),
        tag::INT => Value::Int(reader.read_int()?),
        tag::LONG => Value::Long(reader.read_long()?),
        tag::FLOAT => Value::Float(reader.read_float()?),
        tag::DOUBLE => Value::Double(reader.read_double()?),
        tag::CHAR => Value::Char(reader.read_char()?),
        tag::STRING => Value::String(reader.read_string()?),
        tag::BYTES => Value::Bytes(reader.read_bytes()?.to_vec()),
        tag::LIST => {
            let len = read_count(reader)?;
            // Never trust the prefix for preallocation; every element is at least one byte.
            let mut items = Vec::with_capacity(len.min(reader.readable_bytes()));
            for _ in 0..len {
                items.push(decode_value_impl(reader, depth + 1)?);
            }
            Value::List(items)
        }
        tag::RECORD => {
            let len = read_count(reader)?;
            let mut fields = BTreeMap::new();
            for _ in 0..len {
                let name = reader.read_string()?;
                let field = decode_value_impl(reader, depth + 1)?;
                fields.insert(name, field);
            }
            Value::Record(fields)
        }
        other => return Err(Error::UnknownValueTag(other)),
    };
    Ok(value)
}

fn read_count(reader: &mut DataBufReader) -> Result<usize> {
    let len = reader.read_int()?;
    usize::try_from(len).map_err(|_| Error::Buffer(fleetpack::Error::NegativeLength(len)))
}

// ============================================================================
//  CONVERSIONS
// ============================================================================

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self { Value::$variant(v) }
            }

            impl TryFrom<Value> for $ty {
                type Error = Error;

                fn try_from(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(Error::TypeMismatch { expected: $name.into(), found: other.kind() }),
                    }
                }
            }

            impl TryFrom<Value> for Option<$ty> {
                type Error = Error;

                fn try_from(value: Value) -> Result<Self> {
                    match value {
                        Value::Null => Ok(None),
                        other => <$ty>::try_from(other).map(Some),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool, "bool";
    i8 => Byte, "byte";
    i16 => Short, "short";
    i32 => Int, "int";
    i64 => Long, "long";
    f32 => Float, "float";
    f64 => Double, "double";
    char => Char, "char";
    String => String, "string";
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Record(v)
    }
}

impl<T> TryFrom<Value> for Vec<T>
where
    T: TryFrom<Value, Error = Error>,
{
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::try_from).collect(),
            other => Err(Error::TypeMismatch { expected: "list".into(), found: other.kind() }),
        }
    }
}

impl TryFrom<Value> for () {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(()),
            other => Err(Error::TypeMismatch { expected: "void".into(), found: other.kind() }),
        }
    }
}
