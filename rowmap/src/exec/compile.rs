//! Plan compilation: turning (target type, ordered column slice) into a
//! reusable row transform.
//!
//! A compiled transform is pure and immutable: it allocates the target
//! instance and nothing else, and is invoked once per row for as long as the
//! schema fingerprint holds. All name resolution, constructor search and
//! handler lookup happen here, once, never on the hot path.

use std::{borrow::Cow, sync::Arc};

use tracing::trace;

use crate::{
    config::MapConfig,
    cursor::RowView,
    error::{Error, MapResult},
    exec::{
        entity::{Entity, MemberDef, MemberType, MemberValue},
        resolve,
    },
    handlers::{TypeHandler, TypeHandlerRegistry},
    schema::{
        column::{ColumnDef, ResultSchema},
        ty::TypeId,
    },
    value::Value,
};

/// A compiled row→object transform.
pub type RowFn<T> = Arc<dyn Fn(&dyn RowView) -> MapResult<T> + Send + Sync>;

/// The column slice a plan is compiled against.
pub struct PlanCtx<'a> {
    pub schema: &'a ResultSchema,
    pub start: usize,
    pub len: usize,
    pub config: &'a MapConfig,
    pub handlers: &'a TypeHandlerRegistry,
}

impl<'a> PlanCtx<'a> {
    /// A context spanning the whole schema.
    pub fn full(
        schema: &'a ResultSchema,
        config: &'a MapConfig,
        handlers: &'a TypeHandlerRegistry,
    ) -> PlanCtx<'a> {
        PlanCtx {
            schema,
            start: 0,
            len: schema.len(),
            config,
            handlers,
        }
    }

    /// A context over a sub-range of the same schema.
    pub fn narrowed(&self, start: usize, len: usize) -> PlanCtx<'a> {
        PlanCtx {
            schema: self.schema,
            start,
            len,
            config: self.config,
            handlers: self.handlers,
        }
    }

    pub fn slice(&self) -> MapResult<&'a [ColumnDef]> {
        self.schema
            .columns
            .get(self.start..self.start + self.len)
            .ok_or_else(|| Error::ShapeMismatch("column slice out of schema bounds".into()))
    }
}

/// A shape rows can be materialized into.
pub trait FromRow: Sized + Send + Sync + 'static {
    /// `false` only for the do-not-map sentinel; such a shape receives no
    /// column range and no transform in a multi-map tuple.
    const MAPPED: bool = true;

    fn compile(ctx: &PlanCtx<'_>) -> MapResult<RowFn<Self>>;
}

/// Wraps a slice transform with the missing-secondary rule: a database-null
/// in the slice's *first* column short-circuits the whole slice to `None`,
/// modeling a left outer join that produced no matching row.
pub fn compile_guarded<T: FromRow>(ctx: &PlanCtx<'_>) -> MapResult<RowFn<Option<T>>> {
    let inner = T::compile(ctx)?;
    let first = ctx.start;
    Ok(Arc::new(move |row| {
        if row.value(first).is_null() {
            return Ok(None);
        }
        inner(row).map(Some)
    }))
}

/// A per-column conversion step, resolved at compile time.
pub(crate) enum ValueCoercer {
    Typed(MemberType),
    Handler(Arc<dyn TypeHandler>),
}

impl ValueCoercer {
    /// Resolves the coercer for a member type. An unregistered custom
    /// handler key fails here, at compile time, before any row is read.
    pub(crate) fn new(ty: MemberType, handlers: &TypeHandlerRegistry) -> MapResult<ValueCoercer> {
        match ty {
            MemberType::Custom(key) => handlers
                .get(key)
                .map(ValueCoercer::Handler)
                .ok_or(Error::UnknownTypeHandler(key)),
            other => Ok(ValueCoercer::Typed(other)),
        }
    }

    /// Produces the canonical value for the member. `Null` passes through
    /// untouched; null policy is the caller's concern.
    pub(crate) fn apply(&self, raw: &Value) -> MapResult<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match self {
            ValueCoercer::Handler(handler) => handler.normalize(raw.clone()),
            ValueCoercer::Typed(MemberType::Scalar(ty))
            | ValueCoercer::Typed(MemberType::Nullable(ty)) => {
                if raw.type_id() == Some(*ty) {
                    Ok(raw.clone())
                } else {
                    convert_scalar(raw, *ty)
                }
            }
            ValueCoercer::Typed(MemberType::Enum(repr)) => match raw {
                Value::Text(name) => repr.by_name(name).map(Value::BigInt).ok_or_else(|| {
                    Error::Coercion {
                        from: Cow::Owned(format!("text `{name}`")),
                        to: Cow::Borrowed(repr.name),
                    }
                }),
                other => match other.as_integer() {
                    Some(discriminant) => Ok(Value::BigInt(discriminant)),
                    None => Err(Error::Coercion {
                        from: other.type_name(),
                        to: Cow::Borrowed(repr.name),
                    }),
                },
            },
            // `new` never produces this combination.
            ValueCoercer::Typed(MemberType::Custom(key)) => Err(Error::UnknownTypeHandler(key)),
        }
    }
}

/// General numeric/representational conversion, the last resort before a
/// coercion error.
fn convert_scalar(raw: &Value, target: TypeId) -> MapResult<Value> {
    let mismatch = || Error::Coercion {
        from: raw.type_name(),
        to: Cow::Borrowed(target.name()),
    };
    match target {
        TypeId::Bool => match integer_of(raw) {
            Some(i) => Ok(Value::Bool(i != 0)),
            None => match raw {
                Value::Text(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::Text(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
        },
        TypeId::Byte | TypeId::ShortInt | TypeId::Int | TypeId::BigInt | TypeId::Timestamp => {
            let wide = integer_of(raw).ok_or_else(mismatch)?;
            narrow_integer(wide, target).ok_or_else(mismatch)
        }
        TypeId::Double => match raw {
            Value::Double(d) => Ok(Value::Double(*d)),
            Value::Text(s) => s.trim().parse().map(Value::Double).map_err(|_| mismatch()),
            other => match other.as_integer() {
                Some(i) => Ok(Value::Double(i as f64)),
                None => Err(mismatch()),
            },
        },
        TypeId::Char => match raw {
            Value::Text(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(mismatch()),
                }
            }
            _ => Err(mismatch()),
        },
        TypeId::Text => match raw {
            Value::Char(c) => Ok(Value::Text(c.to_string())),
            Value::Bool(_)
            | Value::Byte(_)
            | Value::ShortInt(_)
            | Value::Int(_)
            | Value::BigInt(_)
            | Value::Double(_)
            | Value::Timestamp(_) => Ok(Value::Text(raw.to_string())),
            _ => Err(mismatch()),
        },
        TypeId::Blob => Err(mismatch()),
    }
}

/// Widens a value to `i64` when it has a faithful integer reading.
fn integer_of(raw: &Value) -> Option<i64> {
    raw.as_integer().or_else(|| match raw {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Double(d) if d.fract() == 0.0 && d.is_finite() => Some(*d as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn narrow_integer(wide: i64, target: TypeId) -> Option<Value> {
    match target {
        TypeId::Byte => u8::try_from(wide).ok().map(Value::Byte),
        TypeId::ShortInt => i16::try_from(wide).ok().map(Value::ShortInt),
        TypeId::Int => i32::try_from(wide).ok().map(Value::Int),
        TypeId::BigInt => Some(Value::BigInt(wide)),
        TypeId::Timestamp => Some(Value::Timestamp(wide)),
        _ => None,
    }
}

/// One resolved column→member assignment.
struct Binding<T: 'static> {
    ordinal: usize,
    name: String,
    member: &'static MemberDef<T>,
    coercer: ValueCoercer,
}

/// Compiles the transform for an [`Entity`] target over the context's
/// column slice.
///
/// A full positional constructor match takes precedence over the
/// zero-argument-plus-setters path. With neither a matching multi-parameter
/// constructor nor a zero-argument path, compilation fails before any row is
/// read.
pub fn compile_entity<T: Entity>(ctx: &PlanCtx<'_>) -> MapResult<RowFn<T>> {
    let cols = ctx.slice()?;

    let ctor = resolve::find_constructor::<T>(cols, ctx.handlers)?;
    if let Some(ctor) = ctor.filter(|c| !c.params.is_empty()) {
        // Only an explicit constructor can reach here without an exact
        // positional match; its parameter list must still fit the slice.
        if ctor.params.len() > cols.len() {
            return Err(Error::ShapeMismatch(
                format!(
                    "constructor for `{}` takes {} parameters but the result has {} columns",
                    T::NAME,
                    ctor.params.len(),
                    cols.len()
                )
                .into(),
            ));
        }
        trace!(target_type = T::NAME, "compiling positional constructor plan");
        let params: Vec<(usize, String, ValueCoercer)> = ctor
            .params
            .iter()
            .enumerate()
            .map(|(i, (_, ty))| {
                Ok((
                    ctx.start + i,
                    cols[i].name.clone(),
                    ValueCoercer::new(*ty, ctx.handlers)?,
                ))
            })
            .collect::<MapResult<_>>()?;
        let build = ctor.build;
        return Ok(Arc::new(move |row| {
            let mut values = Vec::with_capacity(params.len());
            for (ordinal, name, coercer) in &params {
                let canonical = coercer
                    .apply(row.value(*ordinal))
                    .map_err(|e| e.at_column(*ordinal, name))?;
                values.push(canonical);
            }
            build(values)
        }));
    }

    // Zero-argument path: an explicit empty constructor if one was chosen,
    // otherwise the type's default construction.
    let factory = ctor.map(|c| c.build);
    if factory.is_none() && T::new_default().is_none() {
        return Err(Error::NoConstructor(T::NAME));
    }

    let mut bindings = Vec::new();
    for (i, col) in cols.iter().enumerate() {
        let Some(member) = resolve::resolve_member::<T>(&col.name, ctx.config) else {
            // Unmapped columns are skipped, not an error.
            continue;
        };
        bindings.push(Binding {
            ordinal: ctx.start + i,
            name: col.name.clone(),
            member,
            coercer: ValueCoercer::new(member.ty, ctx.handlers)?,
        });
    }
    trace!(
        target_type = T::NAME,
        bound = bindings.len(),
        columns = cols.len(),
        "compiling setter plan"
    );

    let apply_nulls = ctx.config.apply_null_values;
    Ok(Arc::new(move |row| {
        let mut obj = match factory {
            Some(build) => build(Vec::new())?,
            None => T::new_default().ok_or(Error::NoConstructor(T::NAME))?,
        };
        for b in &bindings {
            let raw = row.value(b.ordinal);
            if raw.is_null() {
                if apply_nulls {
                    (b.member.set)(&mut obj, Value::Null)
                        .map_err(|e| e.at_column(b.ordinal, &b.name))?;
                }
                continue;
            }
            let canonical = b
                .coercer
                .apply(raw)
                .map_err(|e| e.at_column(b.ordinal, &b.name))?;
            (b.member.set)(&mut obj, canonical).map_err(|e| e.at_column(b.ordinal, &b.name))?;
        }
        Ok(obj)
    }))
}

pub(crate) fn compile_scalar<T>(ctx: &PlanCtx<'_>) -> MapResult<RowFn<T>>
where
    T: MemberValue + Send + Sync + 'static,
{
    let cols = ctx.slice()?;
    let Some(col) = cols.first() else {
        return Err(Error::ShapeMismatch(
            "scalar target requires at least one column".into(),
        ));
    };
    let coercer = ValueCoercer::new(T::TYPE, ctx.handlers)?;
    let ordinal = ctx.start;
    let name = col.name.clone();
    Ok(Arc::new(move |row| {
        let canonical = coercer
            .apply(row.value(ordinal))
            .map_err(|e| e.at_column(ordinal, &name))?;
        T::from_value(canonical).map_err(|e| e.at_column(ordinal, &name))
    }))
}

macro_rules! scalar_from_row {
    ($($t:ty),+ $(,)?) => {$(
        impl FromRow for $t {
            fn compile(ctx: &PlanCtx<'_>) -> MapResult<RowFn<Self>> {
                compile_scalar::<$t>(ctx)
            }
        }

        impl FromRow for Option<$t> {
            fn compile(ctx: &PlanCtx<'_>) -> MapResult<RowFn<Self>> {
                compile_scalar::<Option<$t>>(ctx)
            }
        }
    )+};
}

scalar_from_row!(bool, u8, char, i16, i32, i64, f64, String, Vec<u8>);
