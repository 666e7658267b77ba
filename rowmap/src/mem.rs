//! In-memory cursor and connection.
//!
//! A deterministic, scripted implementation of the external collaborator
//! contracts. The crate's own tests drive the engine through it, and it
//! doubles as a reference for adapter authors.

use async_trait::async_trait;

use crate::{
    command::{Command, CommandKind},
    cursor::{Connection, Cursor, CursorOptions, RowView},
    error::{Error, MapResult},
    params::BindRequest,
    schema::{column::ColumnDef, ty::TypeId},
    value::Value,
};

/// One scripted result slice.
#[derive(Debug, Clone)]
pub struct MemSlice {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
}

impl MemSlice {
    pub fn new(columns: Vec<ColumnDef>, rows: Vec<Vec<Value>>) -> MemSlice {
        MemSlice { columns, rows }
    }
}

/// An in-memory cursor over one or more scripted result slices.
#[derive(Debug)]
pub struct MemCursor {
    slices: Vec<MemSlice>,
    slice: usize,
    /// Index of the current row within the slice; `None` before the first
    /// `read` and after exhaustion.
    row: Option<usize>,
    started: bool,
}

impl MemCursor {
    pub fn new(slices: Vec<MemSlice>) -> MemCursor {
        MemCursor {
            slices,
            slice: 0,
            row: None,
            started: false,
        }
    }

    /// Convenience constructor for a single result slice.
    pub fn single(columns: Vec<ColumnDef>, rows: Vec<Vec<Value>>) -> MemCursor {
        MemCursor::new(vec![MemSlice::new(columns, rows)])
    }

    fn current(&self) -> &MemSlice {
        &self.slices[self.slice]
    }
}

impl RowView for MemCursor {
    fn field_count(&self) -> usize {
        self.current().columns.len()
    }

    fn column_name(&self, ordinal: usize) -> &str {
        &self.current().columns[ordinal].name
    }

    fn column_type(&self, ordinal: usize) -> TypeId {
        self.current().columns[ordinal].ty
    }

    fn value(&self, ordinal: usize) -> &Value {
        let row = self.row.expect("cursor is not positioned on a row");
        &self.current().rows[row][ordinal]
    }
}

#[async_trait]
impl Cursor for MemCursor {
    async fn read(&mut self) -> MapResult<bool> {
        let next = match self.row {
            Some(row) => row + 1,
            None if !self.started => 0,
            // Exhausted; further reads keep returning `false`.
            None => return Ok(false),
        };
        self.started = true;
        if next < self.current().rows.len() {
            self.row = Some(next);
            Ok(true)
        } else {
            self.row = None;
            Ok(false)
        }
    }

    async fn next_result(&mut self) -> MapResult<bool> {
        if self.slice + 1 < self.slices.len() {
            self.slice += 1;
            self.row = None;
            self.started = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// An in-memory connection serving scripted responses.
///
/// `reject_optimizations` scripts the driver-rejection path: the first
/// `execute` carrying non-default [`CursorOptions`] fails with
/// [`Error::UnsupportedCursorOptions`], exactly as a driver that does not
/// understand the flags would. Stored-procedure commands fail with
/// [`Error::UnsupportedCursor`]: the scripted driver has no procedure
/// catalog to dispatch them against.
pub struct MemConnection {
    target: String,
    response: Vec<MemSlice>,
    reject_optimizations: bool,
    /// Bind requests observed by `execute`, newest last.
    pub bind_log: Vec<BindRequest>,
    /// Number of `execute` calls observed.
    pub executions: usize,
}

impl MemConnection {
    pub fn new(target: impl Into<String>, response: Vec<MemSlice>) -> MemConnection {
        MemConnection {
            target: target.into(),
            response,
            reject_optimizations: false,
            bind_log: Vec::new(),
            executions: 0,
        }
    }

    /// Makes every optimized `execute` fail with
    /// `UnsupportedCursorOptions`.
    pub fn rejecting_optimizations(mut self) -> MemConnection {
        self.reject_optimizations = true;
        self
    }
}

#[async_trait]
impl Connection for MemConnection {
    fn target(&self) -> &str {
        &self.target
    }

    async fn execute<'c>(
        &'c mut self,
        cmd: &Command,
        bind: &BindRequest,
        options: CursorOptions,
    ) -> MapResult<Box<dyn Cursor + 'c>> {
        self.executions += 1;
        self.bind_log.push(bind.clone());
        if cmd.kind == CommandKind::StoredProcedure {
            return Err(Error::UnsupportedCursor(
                "the scripted in-memory driver cannot execute stored procedures".into(),
            ));
        }
        if self.reject_optimizations && options != CursorOptions::default() {
            return Err(Error::UnsupportedCursorOptions(
                "scripted driver accepts default options only".into(),
            ));
        }
        Ok(Box::new(MemCursor::new(self.response.clone())))
    }
}
