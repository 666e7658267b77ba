//! Target-type metadata.
//!
//! A mappable concrete type declares, once, how its members are named and
//! typed and how a value is written into each of them. The plan compiler
//! resolves columns against this metadata a single time per (type, schema)
//! pair and bakes the result into a closure; no per-row name lookups or
//! dynamic member discovery happen on the hot path.

use crate::{
    error::MapResult,
    schema::ty::TypeId,
    value::Value,
};

/// A named enum with an integer representation.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumRepr {
    pub name: &'static str,
    /// The integer column type the enum is stored as.
    pub underlying: TypeId,
    /// Variant name / discriminant pairs.
    pub variants: &'static [(&'static str, i64)],
}

impl EnumRepr {
    /// Case-insensitive by-name lookup.
    pub fn by_name(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, d)| *d)
    }

    pub fn name_of(&self, discriminant: i64) -> Option<&'static str> {
        self.variants
            .iter()
            .find(|(_, d)| *d == discriminant)
            .map(|(n, _)| *n)
    }
}

/// The declared type of a settable member or constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Scalar(TypeId),
    /// `Option<T>` of a scalar; database-null maps to `None`.
    Nullable(TypeId),
    Enum(&'static EnumRepr),
    /// Conversion is delegated to the handler registered under this key.
    Custom(&'static str),
}

impl MemberType {
    /// The member type of `Option<T>` given the member type of `T`.
    pub const fn nullable_of(inner: MemberType) -> MemberType {
        match inner {
            MemberType::Scalar(ty) => MemberType::Nullable(ty),
            other => other,
        }
    }
}

/// A settable member of a target type.
pub struct MemberDef<T: 'static> {
    pub name: &'static str,
    pub ty: MemberType,
    /// Writes a canonical (already coerced) value into the member.
    pub set: fn(&mut T, Value) -> MapResult<()>,
}

/// A multi-parameter construction path for a target type.
pub struct ConstructorDef<T: 'static> {
    /// Parameter name/type pairs, in positional order.
    pub params: &'static [(&'static str, MemberType)],
    /// Non-public constructors are considered after public ones.
    pub public: bool,
    /// An explicit constructor, when it is the only one, is used
    /// unconditionally, bypassing the matching search.
    pub explicit: bool,
    /// Builds an instance from canonical values, one per parameter.
    pub build: fn(Vec<Value>) -> MapResult<T>,
}

/// A concrete type the engine can materialize rows into.
pub trait Entity: Sized + Send + Sync + 'static {
    const NAME: &'static str;

    /// The settable members, in declaration order.
    fn members() -> &'static [MemberDef<Self>];

    /// Multi-parameter construction paths, if any.
    fn constructors() -> &'static [ConstructorDef<Self>] {
        &[]
    }

    /// The zero-argument construction path; `None` if the type cannot be
    /// default-constructed.
    fn new_default() -> Option<Self>;
}

/// A primitive field type usable in entity members.
pub trait MemberValue: Sized {
    const TYPE: MemberType;

    /// Converts a canonical value into the field type. `Null` maps to the
    /// type's default (for the explicit apply-null assignment path).
    fn from_value(value: Value) -> MapResult<Self>;
}

macro_rules! member_scalar {
    ($rust:ty, $tid:ident, $cast:ident, $default:expr) => {
        impl MemberValue for $rust {
            const TYPE: MemberType = MemberType::Scalar(TypeId::$tid);

            fn from_value(value: Value) -> MapResult<Self> {
                match value {
                    Value::Null => Ok($default),
                    other => other.$cast(),
                }
            }
        }
    };
}

member_scalar!(bool, Bool, try_into_bool, false);
member_scalar!(u8, Byte, try_into_byte, 0);
member_scalar!(char, Char, try_into_char, '\0');
member_scalar!(i16, ShortInt, try_into_short, 0);
member_scalar!(i32, Int, try_into_int, 0);
member_scalar!(i64, BigInt, try_into_big_int, 0);
member_scalar!(f64, Double, try_into_double, 0.0);
member_scalar!(String, Text, try_into_text, String::new());
member_scalar!(Vec<u8>, Blob, try_into_blob, Vec::new());

impl<T: MemberValue> MemberValue for Option<T> {
    const TYPE: MemberType = MemberType::nullable_of(T::TYPE);

    fn from_value(value: Value) -> MapResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Implements [`Entity`] and [`FromRow`](crate::exec::compile::FromRow) for
/// a default-constructible struct.
///
/// Each listed field becomes a settable member named after the field, or
/// after the optional `=> "ColumnName"` override:
///
/// ```ignore
/// #[derive(Default)]
/// struct User {
///     id: i32,
///     name: String,
///     last_seen: Option<i64>,
/// }
/// entity!(User { id: i32, name: String, last_seen: Option<i64> });
/// ```
///
/// Types needing constructors or non-default member conversions implement
/// [`Entity`] by hand instead.
#[macro_export]
macro_rules! entity {
    ($ty:ident { $($field:ident : $fty:ty $(=> $col:literal)?),+ $(,)? }) => {
        impl $crate::exec::entity::Entity for $ty {
            const NAME: &'static str = stringify!($ty);

            fn members() -> &'static [$crate::exec::entity::MemberDef<Self>] {
                static MEMBERS: ::std::sync::OnceLock<
                    Vec<$crate::exec::entity::MemberDef<$ty>>,
                > = ::std::sync::OnceLock::new();
                MEMBERS.get_or_init(|| {
                    vec![$($crate::exec::entity::MemberDef {
                        name: $crate::entity!(@name $field $(=> $col)?),
                        ty: <$fty as $crate::exec::entity::MemberValue>::TYPE,
                        set: |obj: &mut $ty, value: $crate::value::Value| {
                            obj.$field =
                                <$fty as $crate::exec::entity::MemberValue>::from_value(value)?;
                            Ok(())
                        },
                    }),+]
                })
            }

            fn new_default() -> Option<Self> {
                Some(<$ty as ::core::default::Default>::default())
            }
        }

        impl $crate::exec::compile::FromRow for $ty {
            fn compile(
                ctx: &$crate::exec::compile::PlanCtx<'_>,
            ) -> $crate::error::MapResult<$crate::exec::compile::RowFn<Self>> {
                $crate::exec::compile::compile_entity::<$ty>(ctx)
            }
        }
    };
    (@name $field:ident) => {
        stringify!($field)
    };
    (@name $field:ident => $col:literal) => {
        $col
    };
}
