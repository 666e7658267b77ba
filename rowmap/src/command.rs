/// How the command text should be interpreted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Plain command text.
    Text,
    /// The text names a stored procedure.
    StoredProcedure,
}

/// A single command to execute against a connection target.
///
/// The command carries everything the engine folds into a plan-cache
/// identity except the connection target itself (which belongs to the
/// connection) and the target types (which come from the call site's type
/// parameters).
#[derive(Debug, Clone)]
pub struct Command {
    pub sql: String,
    pub kind: CommandKind,
    /// When `false`, plan compilation still happens but nothing is stored in
    /// or read from the plan cache. Useful for one-off queries or queries
    /// whose shape varies on every call (e.g. `select *` against an unknown
    /// schema).
    pub cached: bool,
}

impl Command {
    /// A plain-text command.
    pub fn text(sql: impl Into<String>) -> Command {
        Command {
            sql: sql.into(),
            kind: CommandKind::Text,
            cached: true,
        }
    }

    /// A stored-procedure command.
    pub fn procedure(name: impl Into<String>) -> Command {
        Command {
            sql: name.into(),
            kind: CommandKind::StoredProcedure,
            cached: true,
        }
    }

    /// Opts this one call out of plan caching.
    pub fn uncached(mut self) -> Command {
        self.cached = false;
        self
    }
}
