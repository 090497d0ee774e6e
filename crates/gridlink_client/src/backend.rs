//! The document-access capability surface.
//!
//! [`DocBackend`] is the one interface the rest of the application is
//! written against; the host-embedded, REST, and mock variants all
//! implement it. See the crate docs for the selection flow.

use async_trait::async_trait;
use gridlink_core::{ActionResult, ColumnDescriptor, Result, TableSnapshot, UserAction};
use indexmap::IndexMap;
use serde_json::Value;

/// A server-side row filter: column id to accepted values.
///
/// Serialized as the platform's JSON filter object and passed as the
/// `filter` query parameter; the proxy forwards it verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFilter(IndexMap<String, Vec<Value>>);

impl RowFilter {
    /// Empty filter (matches everything; usually omitted instead).
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict a column to a set of accepted values.
    pub fn with_values(mut self, col_id: impl Into<String>, values: Vec<Value>) -> Self {
        self.0.insert(col_id.into(), values);
        self
    }

    /// Shorthand for filtering one column to one value.
    pub fn eq(col_id: impl Into<String>, value: Value) -> Self {
        Self::new().with_values(col_id, vec![value])
    }

    /// The JSON string sent as the `filter` query parameter.
    pub fn to_query_value(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// True if no column restrictions are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the column restrictions.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// One file to attach to a record.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    /// File name as shown in the document.
    pub file_name: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Uniform document access, implemented once per backend mode.
///
/// Contract notes that hold for every implementation:
///
/// - `fetch_table` results are read snapshots; there are no partial or
///   streaming updates.
/// - `apply_user_actions` is NOT atomic across tuples. Tuples are applied
///   independently in order; when tuple k fails, tuples 1..k-1 stay
///   applied and the error is
///   [`gridlink_core::GridlinkError::PartialApply`] carrying that count.
/// - No call retries automatically and no timeout is set at this layer;
///   a failure surfaces once and the caller re-invokes the action.
#[async_trait]
pub trait DocBackend: Send + Sync {
    /// Fetch a read snapshot of a table, optionally server-filtered.
    async fn fetch_table(
        &self,
        table_id: &str,
        filter: Option<&RowFilter>,
    ) -> Result<TableSnapshot>;

    /// Apply a batch of mutations, returning one result per action.
    async fn apply_user_actions(&self, actions: &[UserAction]) -> Result<Vec<ActionResult>>;

    /// Fetch the column descriptors of a table, sorted by column id.
    async fn fetch_columns(&self, table_id: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Upload attachment payloads, returning the new attachment ids.
    async fn upload_attachments(&self, files: &[AttachmentUpload]) -> Result<Vec<i64>>;

    /// Download one attachment's payload.
    async fn download_attachment(&self, attachment_id: i64) -> Result<Vec<u8>>;
}
