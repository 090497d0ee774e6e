//! Error type shared by all Gridlink crates.

use thiserror::Error;

/// Errors produced by the Gridlink data-access layer.
#[derive(Debug, Error)]
pub enum GridlinkError {
    /// A backend call returned a non-2xx HTTP response.
    ///
    /// `message` is the best-effort server-provided body; malformed
    /// responses are not classified further.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code of the failed response.
        status: u16,
        /// Server-provided error message, possibly empty.
        message: String,
    },

    /// The transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// An action tuple named a kind outside `{AddRecord, UpdateRecord}`.
    ///
    /// Raised before any I/O is attempted for the offending tuple.
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// No row matching the requested table id exists in the schema table.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A column id was not present in the table it was looked up in.
    #[error("column {col_id} not found in table {table_id}")]
    ColumnNotFound {
        /// Table the lookup ran against.
        table_id: String,
        /// Missing column id.
        col_id: String,
    },

    /// A columnar snapshot had a column whose length differs from the
    /// row-id sequence.
    #[error("column {col_id} has {len} values but the snapshot has {expected} rows")]
    ShapeMismatch {
        /// Offending column id.
        col_id: String,
        /// Length of the offending column.
        len: usize,
        /// Expected length (the row-id sequence length).
        expected: usize,
    },

    /// A column was used as a reference column but is not one.
    #[error("column {0} is not a reference column")]
    NotAReference(String),

    /// A batch of actions failed partway through.
    ///
    /// Actions are applied independently with no rollback: the first
    /// `applied` tuples committed before the failure.
    #[error("{applied} action(s) applied before failure: {source}")]
    PartialApply {
        /// Number of tuples that were applied before the failure.
        applied: usize,
        /// The failing tuple's error.
        #[source]
        source: Box<GridlinkError>,
    },

    /// Required configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A payload could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No backend is reachable in this environment.
    ///
    /// This is the terminal "unavailable" session state, not a transient
    /// failure; rebuilding the session is the only recovery path.
    #[error("document access is not available in this environment")]
    Unavailable,
}

/// Convenience alias used across the Gridlink crates.
pub type Result<T> = std::result::Result<T, GridlinkError>;
