use std::borrow::Cow;

pub type MapResult<T, E = Error> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target type exposes neither a constructor matching the projected
    /// columns nor a zero-argument construction path.
    #[error("type `{0}` has no viable constructor for the projected columns")]
    NoConstructor(&'static str),

    /// The requested mapping shape is invalid (e.g. a do-not-map sentinel in
    /// the primary position of a multi-map tuple).
    #[error("invalid mapping shape: {0}")]
    ShapeMismatch(Cow<'static, str>),

    /// A per-row materialization failure, annotated with the offending
    /// column's ordinal and name.
    #[error("error materializing column {ordinal} (`{name}`)")]
    Column {
        ordinal: usize,
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// A value could not be converted to the resolved member's type.
    #[error("cannot convert `{from}` to `{to}`")]
    Coercion {
        from: Cow<'static, str>,
        to: Cow<'static, str>,
    },

    /// A setter or constructor received a value of an unexpected variant.
    #[error("unexpected value: expected `{expected}`, found `{found}`")]
    ValueMismatch {
        expected: &'static str,
        found: Cow<'static, str>,
    },

    /// `fetch_one` over an empty result.
    #[error("query produced no rows")]
    NoRows,

    /// The grid reader was asked for a slice after all result slices were
    /// consumed.
    #[error("grid reader has no remaining result slices")]
    GridConsumed,

    /// A member declared `MemberType::Custom` for a key with no registered
    /// handler.
    #[error("no type handler registered under key `{0}`")]
    UnknownTypeHandler(&'static str),

    /// The external driver rejected the requested cursor optimization flags.
    /// Callers treat this as a downgrade signal, not a fatal failure.
    #[error("cursor rejected optimization flags: {0}")]
    UnsupportedCursorOptions(Cow<'static, str>),

    /// The supplied cursor or connection cannot support the requested
    /// operation at all (a common integration mistake, hence the specific
    /// message).
    #[error("cursor does not support this operation: {0}")]
    UnsupportedCursor(Cow<'static, str>),
}

impl Error {
    /// Wraps a conversion error with the column position it occurred at.
    pub fn at_column(self, ordinal: usize, name: &str) -> Error {
        Error::Column {
            ordinal,
            name: name.to_owned(),
            source: Box::new(self),
        }
    }
}
