use async_trait::async_trait;

use crate::{
    command::Command,
    error::MapResult,
    params::BindRequest,
    schema::ty::TypeId,
    value::Value,
};

/// Read access to the current row of a tabular result.
///
/// Column metadata (`field_count`, `column_name`, `column_type`) must be
/// available as soon as the cursor exists, before the first
/// [`Cursor::read`]; plans are compiled against it. `value` is only
/// meaningful while the cursor is positioned on a row.
pub trait RowView {
    fn field_count(&self) -> usize;

    fn column_name(&self, ordinal: usize) -> &str;

    fn column_type(&self, ordinal: usize) -> TypeId;

    /// The value at the given ordinal of the current row.
    fn value(&self, ordinal: usize) -> &Value;
}

/// A sequentially-advanceable source of rows.
///
/// The only suspension points in the whole engine are `read` and
/// `next_result`; compiled transforms are pure in-memory computation over an
/// already-fetched row. Dropping a pending `read`/`next_result` future is
/// the cancellation path.
#[async_trait]
pub trait Cursor: RowView + Send {
    /// Advances to the next row of the current result slice. `false` when
    /// the slice is exhausted.
    async fn read(&mut self) -> MapResult<bool>;

    /// Advances to the next result slice of a multi-result response.
    /// `false` when there are no further slices.
    async fn next_result(&mut self) -> MapResult<bool>;
}

/// Cursor optimization hints passed down to the driver. A driver that does
/// not understand them fails with
/// [`Error::UnsupportedCursorOptions`](crate::error::Error), which the
/// mapper treats as a permanent downgrade signal rather than a fatal error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorOptions {
    /// The caller will consume at most one result slice.
    pub single_result: bool,
    /// Columns will be accessed strictly left-to-right.
    pub sequential: bool,
}

/// The transport seam: executes a bound command and streams back rows.
///
/// Everything behind this trait (wire protocol, pooling, transactions) is an
/// external collaborator; the engine only builds a [`BindRequest`] and pulls
/// from the returned cursor.
#[async_trait]
pub trait Connection: Send {
    /// A string uniquely identifying the destination (e.g. a connection
    /// string). Folded into every plan-cache identity built over this
    /// connection.
    fn target(&self) -> &str;

    async fn execute<'c>(
        &'c mut self,
        cmd: &Command,
        bind: &BindRequest,
        options: CursorOptions,
    ) -> MapResult<Box<dyn Cursor + 'c>>;
}
