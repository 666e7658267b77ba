use std::fmt;

/// Possible column value types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeId {
    Bool,
    Byte,
    Char,
    ShortInt,
    Int,
    BigInt,
    Double,
    Timestamp,
    Text,
    Blob,
}

impl TypeId {
    /// Returns the canonical type name.
    pub fn name(self) -> &'static str {
        match self {
            TypeId::Bool => "bool",
            TypeId::Byte => "byte",
            TypeId::Char => "char",
            TypeId::ShortInt => "shortint",
            TypeId::Int => "int",
            TypeId::BigInt => "bigint",
            TypeId::Double => "double",
            TypeId::Timestamp => "timestamp",
            TypeId::Text => "text",
            TypeId::Blob => "blob",
        }
    }

    /// Whether the type stores an integer representation.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TypeId::Byte | TypeId::ShortInt | TypeId::Int | TypeId::BigInt | TypeId::Timestamp
        )
    }

    /// Whether the type is numeric (integer or floating point).
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self == TypeId::Double
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
