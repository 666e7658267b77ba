use std::sync::Arc;

use dashmap::DashMap;

use crate::{error::MapResult, value::Value};

/// A user-registered conversion for members declared as
/// [`MemberType::Custom`](crate::exec::entity::MemberType).
///
/// `normalize` receives the raw column value and must return the canonical
/// value the member's setter (or constructor parameter) accepts.
pub trait TypeHandler: Send + Sync {
    fn normalize(&self, value: Value) -> MapResult<Value>;
}

impl<F> TypeHandler for F
where
    F: Fn(Value) -> MapResult<Value> + Send + Sync,
{
    fn normalize(&self, value: Value) -> MapResult<Value> {
        self(value)
    }
}

/// Registry of custom type handlers, keyed by the member's declared handler
/// key. Owned by a [`Mapper`](crate::db::Mapper); handlers registered on one
/// mapper are invisible to others.
#[derive(Default)]
pub struct TypeHandlerRegistry {
    inner: DashMap<&'static str, Arc<dyn TypeHandler>>,
}

impl TypeHandlerRegistry {
    pub fn new() -> TypeHandlerRegistry {
        TypeHandlerRegistry::default()
    }

    pub fn register(&self, key: &'static str, handler: impl TypeHandler + 'static) {
        self.inner.insert(key, Arc::new(handler));
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn TypeHandler>> {
        self.inner.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_handlers_are_found() {
        let registry = TypeHandlerRegistry::new();
        assert!(!registry.contains("money"));

        registry.register("money", |value: Value| Ok(value));
        assert!(registry.contains("money"));

        let handler = registry.get("money").unwrap();
        assert_eq!(handler.normalize(Value::Int(7)).unwrap(), Value::Int(7));
    }
}
