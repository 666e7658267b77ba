use crate::{
    cursor::RowView,
    schema::{
        fingerprint::{self, Fingerprint},
        ty::TypeId,
    },
};

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// The column value type.
    pub ty: TypeId,
    /// The column identifier.
    pub name: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: TypeId) -> ColumnDef {
        ColumnDef {
            ty,
            name: name.into(),
        }
    }
}

/// A snapshot of a cursor's current column set, taken before the first row
/// is materialized and treated as immutable for the lifetime of the plans
/// compiled against it.
#[derive(Debug, Clone)]
pub struct ResultSchema {
    /// The projected columns, in cursor order.
    pub columns: Vec<ColumnDef>,
}

impl ResultSchema {
    pub fn new(columns: Vec<ColumnDef>) -> ResultSchema {
        ResultSchema { columns }
    }

    /// Snapshots the column metadata of the given cursor position.
    pub fn from_view(view: &dyn RowView) -> ResultSchema {
        let columns = (0..view.field_count())
            .map(|i| ColumnDef {
                ty: view.column_type(i),
                name: view.column_name(i).to_owned(),
            })
            .collect();
        ResultSchema { columns }
    }

    /// Checks if the schema contains the given column, returning a reference
    /// to it.
    ///
    /// This is a linear operation which, in the worst case, scans over all of
    /// the schema's columns.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The order-sensitive fingerprint of the column-name sequence.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint::of_columns(&self.columns)
    }
}
