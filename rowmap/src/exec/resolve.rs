//! Column-name to member resolution.
//!
//! Resolution runs once per (type, schema) pair at plan-compile time; its
//! output is baked into the compiled transform and never consulted again on
//! the hot path.

use tracing::trace;

use crate::{
    config::MapConfig,
    error::MapResult,
    exec::entity::{ConstructorDef, Entity, MemberDef, MemberType},
    handlers::TypeHandlerRegistry,
    schema::{column::ColumnDef, ty::TypeId},
};

/// Finds the best settable member for a column name.
///
/// Precedence: exact case-sensitive match; ASCII case-insensitive match;
/// then, when `match_names_with_underscores` is enabled, both again with
/// underscores removed from the column name. `None` means the column is
/// silently skipped during materialization — unmapped columns are not an
/// error.
pub fn resolve_member<T: Entity>(
    column: &str,
    config: &MapConfig,
) -> Option<&'static MemberDef<T>> {
    let members = T::members();

    if let Some(member) = lookup(members, column) {
        return Some(member);
    }

    if config.match_names_with_underscores && column.contains('_') {
        let stripped: String = column.chars().filter(|c| *c != '_').collect();
        if let Some(member) = lookup(members, &stripped) {
            trace!(column, member = member.name, "matched after underscore strip");
            return Some(member);
        }
    }

    None
}

fn lookup<'m, T>(members: &'m [MemberDef<T>], column: &str) -> Option<&'m MemberDef<T>> {
    members
        .iter()
        .find(|m| m.name == column)
        .or_else(|| members.iter().find(|m| m.name.eq_ignore_ascii_case(column)))
}

/// Finds the constructor to use for the given column slice, if any
/// multi-parameter constructor matches.
///
/// A single `explicit` constructor is chosen unconditionally. Otherwise
/// candidates are considered public-before-private, fewest parameters first;
/// a candidate matches when its parameter count equals the column count and
/// every position agrees by case-insensitive name and compatible type.
/// `Ok(None)` means the zero-argument path should be used instead.
pub fn find_constructor<T: Entity>(
    columns: &[ColumnDef],
    handlers: &TypeHandlerRegistry,
) -> MapResult<Option<&'static ConstructorDef<T>>> {
    let ctors = T::constructors();

    let mut explicit = ctors.iter().filter(|c| c.explicit);
    if let (Some(only), None) = (explicit.next(), explicit.next()) {
        return Ok(Some(only));
    }

    let mut candidates: Vec<&ConstructorDef<T>> = ctors.iter().collect();
    candidates.sort_by_key(|c| (!c.public, c.params.len()));

    for ctor in candidates {
        if ctor.params.is_empty() || ctor.params.len() != columns.len() {
            continue;
        }
        let matches = ctor.params.iter().zip(columns).all(|((name, ty), col)| {
            name.eq_ignore_ascii_case(&col.name) && compatible(*ty, col.ty, handlers)
        });
        if matches {
            trace!(
                target_type = T::NAME,
                params = ctor.params.len(),
                "constructor matched column slice"
            );
            return Ok(Some(ctor));
        }
    }

    Ok(None)
}

/// Whether a column of type `col` can feed a parameter or member of type
/// `member` for the purpose of constructor matching.
pub fn compatible(member: MemberType, col: TypeId, handlers: &TypeHandlerRegistry) -> bool {
    match member {
        // Identical, or a single-character column feeding a text target.
        MemberType::Scalar(ty) => ty == col || (ty == TypeId::Text && col == TypeId::Char),
        MemberType::Nullable(ty) => ty == col,
        // Stored as its underlying integer, or parsed by name from text.
        MemberType::Enum(repr) => col == repr.underlying || col == TypeId::Text,
        MemberType::Custom(key) => handlers.contains(key),
    }
}
