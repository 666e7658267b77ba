use std::{
    any,
    hash::{Hash, Hasher},
    sync::Arc,
};

use xxhash_rust::xxh3::Xxh3;

use crate::command::{Command, CommandKind};

/// The immutable composite key identifying "this exact query + shape +
/// target combination" in the plan cache.
///
/// Equality is field-wise: type identity (not structure) for the type
/// components, ordinal equality for the text components. The hash is
/// precomputed at construction; `Hash` only ever writes it.
#[derive(Debug, Clone)]
pub struct QueryIdentity {
    hash: u64,
    sql: Arc<str>,
    kind: CommandKind,
    target: Arc<str>,
    primary: any::TypeId,
    params: Option<any::TypeId>,
    secondaries: Arc<[any::TypeId]>,
    slice: usize,
}

impl QueryIdentity {
    pub fn new(
        cmd: &Command,
        target: &str,
        primary: any::TypeId,
        params: Option<any::TypeId>,
        secondaries: Vec<any::TypeId>,
        slice: usize,
    ) -> QueryIdentity {
        let mut hasher = Xxh3::new();
        hasher.write(cmd.sql.as_bytes());
        hasher.write_u8(0xFF);
        hasher.write_u8(match cmd.kind {
            CommandKind::Text => 0,
            CommandKind::StoredProcedure => 1,
        });
        hasher.write(target.as_bytes());
        hasher.write_u8(0xFF);
        primary.hash(&mut hasher);
        params.hash(&mut hasher);
        hasher.write_usize(secondaries.len());
        for ty in &secondaries {
            ty.hash(&mut hasher);
        }
        hasher.write_usize(slice);

        QueryIdentity {
            hash: hasher.finish(),
            sql: Arc::from(cmd.sql.as_str()),
            kind: cmd.kind,
            target: Arc::from(target),
            primary,
            params,
            secondaries: secondaries.into(),
            slice,
        }
    }

    /// The identity of a single-target mapping.
    pub fn single<T: 'static>(
        cmd: &Command,
        target: &str,
        params: Option<any::TypeId>,
        slice: usize,
    ) -> QueryIdentity {
        QueryIdentity::new(cmd, target, any::TypeId::of::<T>(), params, Vec::new(), slice)
    }

    /// The identity of a multi-map mapping; `secondaries` are the declared
    /// secondary target types, in tuple order.
    pub fn multi<T: 'static>(
        cmd: &Command,
        target: &str,
        params: Option<any::TypeId>,
        secondaries: Vec<any::TypeId>,
        slice: usize,
    ) -> QueryIdentity {
        QueryIdentity::new(cmd, target, any::TypeId::of::<T>(), params, secondaries, slice)
    }

    pub fn slice_index(&self) -> usize {
        self.slice
    }
}

impl PartialEq for QueryIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.kind == other.kind
            && self.slice == other.slice
            && self.primary == other.primary
            && self.params == other.params
            && self.secondaries == other.secondaries
            && self.sql == other.sql
            && self.target == other.target
    }
}

impl Eq for QueryIdentity {}

impl Hash for QueryIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity<T: 'static>(sql: &str, target: &str, slice: usize) -> QueryIdentity {
        QueryIdentity::single::<T>(&Command::text(sql), target, None, slice)
    }

    #[test]
    fn equal_components_are_equal() {
        let a = identity::<i32>("select 1", "db://main", 0);
        let b = identity::<i32>("select 1", "db://main", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn any_differing_component_breaks_equality() {
        let base = identity::<i32>("select 1", "db://main", 0);
        assert_ne!(base, identity::<i32>("select 2", "db://main", 0));
        assert_ne!(base, identity::<i32>("select 1", "db://other", 0));
        assert_ne!(base, identity::<i32>("select 1", "db://main", 1));
        assert_ne!(base, identity::<i64>("select 1", "db://main", 0));
    }

    #[test]
    fn command_kind_distinguishes_identities() {
        let text = QueryIdentity::single::<i32>(&Command::text("sp"), "t", None, 0);
        let proc = QueryIdentity::single::<i32>(&Command::procedure("sp"), "t", None, 0);
        assert_ne!(text, proc);
    }

    #[test]
    fn secondary_order_matters() {
        let cmd = Command::text("select *");
        let ab = QueryIdentity::multi::<i32>(
            &cmd,
            "t",
            None,
            vec![any::TypeId::of::<String>(), any::TypeId::of::<bool>()],
            0,
        );
        let ba = QueryIdentity::multi::<i32>(
            &cmd,
            "t",
            None,
            vec![any::TypeId::of::<bool>(), any::TypeId::of::<String>()],
            0,
        );
        assert_ne!(ab, ba);
    }
}
