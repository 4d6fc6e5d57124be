//! # Method Descriptors
//!
//! The compact signature language used to disambiguate overloaded methods.
//!
//! ```text
//! MethodType := '(' TypeDesc* ')' ( TypeDesc | 'V' )
//! TypeDesc   := 'Z' | 'B' | 'S' | 'I' | 'J' | 'F' | 'D' | 'C'
//!             | 'T' | 'Y' | 'R' | '[' TypeDesc | '?' TypeDesc | 'L' name ';'
//! ```
//!
//! `Z B S I J F D C` are the primitives (bool, byte, short, int, long, float,
//! double, char). `T` is a string, `Y` a byte blob, `R` a record, `[` a list,
//! `?` makes the inner type nullable and `L…;` names an object type.
//!
//! ## Invariants
//! - `MethodType::parse(m.to_string()) == m` for every parsed `m`.
//! - Parsing consumes the whole input; trailing bytes are an error.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::error::Result;
use crate::value::MAX_NESTING_DEPTH;
use crate::value::Value;

/// A single parameter or return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Bytes,
    Record,
    List(Box<TypeDesc>),
    Nullable(Box<TypeDesc>),
    /// A named object type, possibly the receiver of a chained call.
    Object(String),
}

impl TypeDesc {
    pub fn list(inner: TypeDesc) -> Self {
        TypeDesc::List(Box::new(inner))
    }

    pub fn nullable(inner: TypeDesc) -> Self {
        TypeDesc::Nullable(Box::new(inner))
    }

    pub fn object(name: impl Into<String>) -> Self {
        TypeDesc::Object(name.into())
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeDesc::Bool
                | TypeDesc::Byte
                | TypeDesc::Short
                | TypeDesc::Int
                | TypeDesc::Long
                | TypeDesc::Float
                | TypeDesc::Double
                | TypeDesc::Char
        )
    }

    /// The object type name if a value of this type can receive a further call.
    pub fn receiver_name(&self) -> Option<&str> {
        match self {
            TypeDesc::Object(name) => Some(name),
            TypeDesc::Nullable(inner) => inner.receiver_name(),
            _ => None,
        }
    }

    /// Checks whether `value` may be passed where this type is declared.
    ///
    /// Primitives take only their exact kind. Reference types also take `Null`.
    /// A nullable primitive behaves like its boxed counterpart.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeDesc::Bool, Value::Bool(_))
            | (TypeDesc::Byte, Value::Byte(_))
            | (TypeDesc::Short, Value::Short(_))
            | (TypeDesc::Int, Value::Int(_))
            | (TypeDesc::Long, Value::Long(_))
            | (TypeDesc::Float, Value::Float(_))
            | (TypeDesc::Double, Value::Double(_))
            | (TypeDesc::Char, Value::Char(_)) => true,

            (TypeDesc::Nullable(_), Value::Null) => true,
            (TypeDesc::Nullable(inner), v) => inner.accepts(v),

            (t, Value::Null) => !t.is_primitive(),

            (TypeDesc::String, Value::String(_))
            | (TypeDesc::Bytes, Value::Bytes(_))
            | (TypeDesc::Record, Value::Record(_))
            | (TypeDesc::Object(_), Value::Record(_)) => true,

            (TypeDesc::List(inner), Value::List(items)) => items.iter().all(|v| inner.accepts(v)),

            _ => false,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Bool => f.write_str("Z"),
            TypeDesc::Byte => f.write_str("B"),
            TypeDesc::Short => f.write_str("S"),
            TypeDesc::Int => f.write_str("I"),
            TypeDesc::Long => f.write_str("J"),
            TypeDesc::Float => f.write_str("F"),
            TypeDesc::Double => f.write_str("D"),
            TypeDesc::Char => f.write_str("C"),
            TypeDesc::String => f.write_str("T"),
            TypeDesc::Bytes => f.write_str("Y"),
            TypeDesc::Record => f.write_str("R"),
            TypeDesc::List(inner) => write!(f, "[{inner}"),
            TypeDesc::Nullable(inner) => write!(f, "?{inner}"),
            TypeDesc::Object(name) => write!(f, "L{name};"),
        }
    }
}

/// The parameter and return types of a method. `ret == None` is void.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    pub params: Vec<TypeDesc>,
    pub ret: Option<TypeDesc>,
}

impl MethodType {
    pub fn new(params: impl IntoIterator<Item = TypeDesc>, ret: TypeDesc) -> Self {
        Self { params: params.into_iter().collect(), ret: Some(ret) }
    }

    pub fn void(params: impl IntoIterator<Item = TypeDesc>) -> Self {
        Self { params: params.into_iter().collect(), ret: None }
    }

    pub fn is_void(&self) -> bool {
        self.ret.is_none()
    }

    /// Parses a descriptor such as `(IJ?T)Lcounter;`.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut parser = Parser { src: descriptor, pos: 0 };
        parser.method_type()
    }
}

impl FromStr for MethodType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        f.write_str(")")?;
        match &self.ret {
            Some(ret) => write!(f, "{ret}"),
            None => f.write_str("V"),
        }
    }
}

// ============================================================================
//  PARSER
// ============================================================================

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn fail<T>(&self, reason: &'static str) -> Result<T> {
        Err(Error::InvalidDescriptor { descriptor: self.src.to_string(), reason })
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn method_type(&mut self) -> Result<MethodType> {
        if self.bump() != Some(b'(') {
            return self.fail("expected '('");
        }

        let mut params = Vec::new();
        loop {
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b'V') => return self.fail("void is not a parameter type"),
                Some(_) => params.push(self.type_desc(0)?),
                None => return self.fail("unterminated parameter list"),
            }
        }

        let ret = match self.peek() {
            Some(b'V') => {
                self.pos += 1;
                None
            }
            Some(_) => Some(self.type_desc(0)?),
            None => return self.fail("missing return type"),
        };

        if self.pos != self.src.len() {
            return self.fail("trailing input after return type");
        }
        Ok(MethodType { params, ret })
    }

    fn type_desc(&mut self, depth: usize) -> Result<TypeDesc> {
        if depth > MAX_NESTING_DEPTH {
            return self.fail("type nested too deeply");
        }
        let Some(b) = self.bump() else {
            return self.fail("expected a type");
        };

        let ty = match b {
            b'Z' => TypeDesc::Bool,
            b'B' => TypeDesc::Byte,
            b'S' => TypeDesc::Short,
            b'I' => TypeDesc::Int,
            b'J' => TypeDesc::Long,
            b'F' => TypeDesc::Float,
            b'D' => TypeDesc::Double,
            b'C' => TypeDesc::Char,
            b'T' => TypeDesc::String,
            b'Y' => TypeDesc::Bytes,
            b'R' => TypeDesc::Record,
            b'[' => TypeDesc::list(self.type_desc(depth + 1)?),
            b'?' => {
                if self.peek() == Some(b'?') {
                    return self.fail("nested nullable");
                }
                TypeDesc::nullable(self.type_desc(depth + 1)?)
            }
            b'L' => TypeDesc::Object(self.object_name()?),
            b'V' => return self.fail("void is only valid as a return type"),
            _ => return self.fail("unknown type code"),
        };
        Ok(ty)
    }

    fn object_name(&mut self) -> Result<String> {
        let rest = &self.src[self.pos..];
        let Some(end) = rest.find(';') else {
            return self.fail("unterminated object name");
        };
        let name = &rest[..end];
        if name.is_empty() {
            return self.fail("empty object name");
        }
        if name.contains(['(', ')']) {
            return self.fail("unterminated object name");
        }
        self.pos += end + 1;
        Ok(name.to_string())
    }
}
