use std::{borrow::Cow, fmt};

use crate::{
    error::{Error, MapResult},
    schema::ty::TypeId,
};

/// A database value as surfaced by a cursor.
///
/// `Null` is the database-null sentinel. It is distinct from every host
/// value and is converted to host null (or a member default) during
/// materialization; it never leaks into a typed target as a sentinel.
#[derive(Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(u8),
    Char(char),
    ShortInt(i16),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Timestamp(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the corresponding type id; `None` for `Null`.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(TypeId::Bool),
            Value::Byte(_) => Some(TypeId::Byte),
            Value::Char(_) => Some(TypeId::Char),
            Value::ShortInt(_) => Some(TypeId::ShortInt),
            Value::Int(_) => Some(TypeId::Int),
            Value::BigInt(_) => Some(TypeId::BigInt),
            Value::Double(_) => Some(TypeId::Double),
            Value::Timestamp(_) => Some(TypeId::Timestamp),
            Value::Text(_) => Some(TypeId::Text),
            Value::Blob(_) => Some(TypeId::Blob),
        }
    }

    /// The name used in conversion diagnostics.
    pub fn type_name(&self) -> Cow<'static, str> {
        match self.type_id() {
            Some(ty) => Cow::Borrowed(ty.name()),
            None => Cow::Borrowed("null"),
        }
    }

    /// Returns the default value for the given [`TypeId`].
    pub fn default_for_type(ty: TypeId) -> Value {
        match ty {
            TypeId::Bool => Value::Bool(false),
            TypeId::Byte => Value::Byte(0),
            TypeId::Char => Value::Char('\0'),
            TypeId::ShortInt => Value::ShortInt(0),
            TypeId::Int => Value::Int(0),
            TypeId::BigInt => Value::BigInt(0),
            TypeId::Double => Value::Double(0.0),
            TypeId::Timestamp => Value::Timestamp(0),
            TypeId::Text => Value::Text(String::with_capacity(0)),
            TypeId::Blob => Value::Blob(Vec::with_capacity(0)),
        }
    }

    /// The integer representation, if the value has one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::ShortInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) | Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::ValueMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn try_into_bool(self) -> MapResult<bool> {
        match self {
            Value::Bool(v) => Ok(v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn try_into_byte(self) -> MapResult<u8> {
        match self {
            Value::Byte(v) => Ok(v),
            other => Err(other.mismatch("byte")),
        }
    }

    pub fn try_into_char(self) -> MapResult<char> {
        match self {
            Value::Char(v) => Ok(v),
            other => Err(other.mismatch("char")),
        }
    }

    pub fn try_into_short(self) -> MapResult<i16> {
        match self {
            Value::ShortInt(v) => Ok(v),
            other => Err(other.mismatch("shortint")),
        }
    }

    pub fn try_into_int(self) -> MapResult<i32> {
        match self {
            Value::Int(v) => Ok(v),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn try_into_big_int(self) -> MapResult<i64> {
        match self {
            Value::BigInt(v) | Value::Timestamp(v) => Ok(v),
            other => Err(other.mismatch("bigint")),
        }
    }

    pub fn try_into_double(self) -> MapResult<f64> {
        match self {
            Value::Double(v) => Ok(v),
            other => Err(other.mismatch("double")),
        }
    }

    pub fn try_into_text(self) -> MapResult<String> {
        match self {
            Value::Text(v) => Ok(v),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn try_into_blob(self) -> MapResult<Vec<u8>> {
        match self {
            Value::Blob(v) => Ok(v),
            other => Err(other.mismatch("blob")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(inner) => inner.fmt(f),
            Value::Byte(inner) => inner.fmt(f),
            Value::Char(inner) => inner.fmt(f),
            Value::ShortInt(inner) => inner.fmt(f),
            Value::Int(inner) => inner.fmt(f),
            Value::BigInt(inner) => inner.fmt(f),
            Value::Double(inner) => inner.fmt(f),
            Value::Timestamp(inner) => inner.fmt(f),
            Value::Text(inner) => inner.fmt(f),
            Value::Blob(inner) => write!(f, "<bytes ({})>", inner.len()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(inner) => inner.fmt(f),
            Value::Byte(inner) => inner.fmt(f),
            Value::Char(inner) => inner.fmt(f),
            Value::ShortInt(inner) => inner.fmt(f),
            Value::Int(inner) => inner.fmt(f),
            Value::BigInt(inner) => inner.fmt(f),
            Value::Double(inner) => inner.fmt(f),
            Value::Timestamp(inner) => inner.fmt(f),
            Value::Text(_) => f.write_str("<string>"),
            Value::Blob(_) => f.write_str("<blob>"),
        }
    }
}
