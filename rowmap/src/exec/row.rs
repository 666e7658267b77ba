//! Loosely-typed row materialization target.
//!
//! A [`Row`] behaves like an ordered string-keyed bag. All rows of one
//! result share a single [`RowTable`] describing the column names; each row
//! keeps its own value slots, so removing a column from one row never
//! affects its siblings (removal is a per-row tombstone, the shared table
//! never shrinks). The table can grow when later rows reveal new columns.

use std::sync::{Arc, RwLock};

use crate::{
    error::MapResult,
    exec::compile::{FromRow, PlanCtx, RowFn},
    value::Value,
};

/// The shared column-name table backing a family of [`Row`]s.
#[derive(Debug, Default)]
pub struct RowTable {
    columns: RwLock<Vec<String>>,
}

impl RowTable {
    pub fn new(names: Vec<String>) -> RowTable {
        RowTable {
            columns: RwLock::new(names),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.read().expect("row table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of the column names, in table order.
    pub fn names(&self) -> Vec<String> {
        self.columns.read().expect("row table lock poisoned").clone()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .read()
            .expect("row table lock poisoned")
            .iter()
            .position(|n| n == name)
    }

    /// Returns the index of `name`, growing the table when the column is new.
    fn ensure(&self, name: &str) -> usize {
        let mut columns = self.columns.write().expect("row table lock poisoned");
        match columns.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                columns.push(name.to_owned());
                columns.len() - 1
            }
        }
    }
}

/// One materialized loosely-typed row.
///
/// Database-null columns hold [`Value::Null`] — the dynamic host null —
/// never a private sentinel. A `None` slot means the column was removed
/// from this row specifically.
#[derive(Debug, Clone)]
pub struct Row {
    table: Arc<RowTable>,
    slots: Vec<Option<Value>>,
}

impl Row {
    pub fn new(table: Arc<RowTable>, values: Vec<Value>) -> Row {
        Row {
            table,
            slots: values.into_iter().map(Some).collect(),
        }
    }

    pub fn table(&self) -> &Arc<RowTable> {
        &self.table
    }

    /// The value under `name`; `None` when the column is unknown or removed
    /// from this row.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let i = self.table.index_of(name)?;
        self.get_at(i)
    }

    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    /// Sets a value, growing the shared table when the column is new.
    pub fn set(&mut self, name: &str, value: Value) {
        let i = self.table.ensure(name);
        if i >= self.slots.len() {
            self.slots.resize(i + 1, None);
        }
        self.slots[i] = Some(value);
    }

    /// Removes the column from this row only; sibling rows are unaffected.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.table.index_of(name)?;
        self.slots.get_mut(i).and_then(|slot| slot.take())
    }

    /// The column names of the shared table, in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.table.names()
    }

    /// Present (name, value) pairs, in table order.
    pub fn pairs(&self) -> Vec<(String, Value)> {
        self.table
            .names()
            .into_iter()
            .enumerate()
            .filter_map(|(i, name)| self.get_at(i).map(|v| (name, v.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromRow for Row {
    fn compile(ctx: &PlanCtx<'_>) -> MapResult<RowFn<Self>> {
        let cols = ctx.slice()?;
        let table = Arc::new(RowTable::new(cols.iter().map(|c| c.name.clone()).collect()));
        let start = ctx.start;
        let len = ctx.len;
        Ok(Arc::new(move |row| {
            let values = (start..start + len).map(|i| row.value(i).clone()).collect();
            Ok(Row::new(Arc::clone(&table), values))
        }))
    }
}
