use std::any;

use crate::value::Value;

/// Portable parameter kind tags.
///
/// Drivers receive these alongside each bound value so they can pick the
/// driver-specific wire type without inspecting the value themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Byte,
    Char,
    Int16,
    Int32,
    Int64,
    Float64,
    Timestamp,
    Text,
    Binary,
}

/// The fixed, process-wide lookup from primitive host values to parameter
/// kinds. Read-only; `None` for database-null (drivers bind those as typed
/// nulls of their choosing).
pub fn param_kind(value: &Value) -> Option<ParamKind> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(ParamKind::Bool),
        Value::Byte(_) => Some(ParamKind::Byte),
        Value::Char(_) => Some(ParamKind::Char),
        Value::ShortInt(_) => Some(ParamKind::Int16),
        Value::Int(_) => Some(ParamKind::Int32),
        Value::BigInt(_) => Some(ParamKind::Int64),
        Value::Double(_) => Some(ParamKind::Float64),
        Value::Timestamp(_) => Some(ParamKind::Timestamp),
        Value::Text(_) => Some(ParamKind::Text),
        Value::Blob(_) => Some(ParamKind::Binary),
    }
}

/// One bound parameter as handed to the driver.
#[derive(Debug, Clone)]
pub struct BoundParam {
    pub name: String,
    pub value: Value,
    pub kind: Option<ParamKind>,
}

/// The outbound execution request the engine fills before handing a command
/// to the connection.
#[derive(Debug, Clone, Default)]
pub struct BindRequest {
    entries: Vec<BoundParam>,
}

impl BindRequest {
    pub fn new() -> BindRequest {
        BindRequest::default()
    }

    /// Adds a named parameter, deriving its kind from the value.
    pub fn add(&mut self, name: impl Into<String>, value: Value) {
        let kind = param_kind(&value);
        self.entries.push(BoundParam {
            name: name.into(),
            value,
            kind,
        });
    }

    pub fn entries(&self) -> &[BoundParam] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A bag of outbound parameters.
///
/// The bag's [`any::TypeId`] participates in the plan-cache identity so that
/// the cached binder is only reused for structurally identical bags.
pub trait Params: Send + Sync {
    fn type_key(&self) -> any::TypeId;

    fn bind(&self, req: &mut BindRequest);
}

impl Params for () {
    fn type_key(&self) -> any::TypeId {
        any::TypeId::of::<()>()
    }

    fn bind(&self, _req: &mut BindRequest) {}
}

impl Params for Vec<(String, Value)> {
    fn type_key(&self) -> any::TypeId {
        any::TypeId::of::<Vec<(String, Value)>>()
    }

    fn bind(&self, req: &mut BindRequest) {
        for (name, value) in self {
            req.add(name.clone(), value.clone());
        }
    }
}
