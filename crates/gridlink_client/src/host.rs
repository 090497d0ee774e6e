//! Host-embedded backend (iframe mode).
//!
//! When the widget runs inside the host platform's iframe, the platform
//! injects a plugin API into the page. [`HostApi`] models that surface as
//! a trait so the embedder (a wasm shim in production, a double in tests)
//! can hand it in, and [`HostBackend`] adapts it to [`DocBackend`].
//!
//! Column metadata is not exposed directly by the plugin API; it is
//! recovered by scanning the platform's internal schema tables (see
//! [`crate::columns`]).

use crate::backend::{AttachmentUpload, DocBackend, RowFilter};
use crate::columns;
use async_trait::async_trait;
use gridlink_core::{
    ActionResult, ColumnDescriptor, GridlinkError, Record, Result, TableSnapshot, UserAction,
};
use serde_json::Value;
use std::sync::Arc;

/// Callback invoked with the record under the host's cursor.
pub type RecordCallback = Arc<dyn Fn(Record) + Send + Sync>;

/// Short-lived token for direct document access (attachment transfer).
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token itself, passed as the `auth` query parameter.
    pub token: String,
    /// Document API base URL the token is valid against.
    pub base_url: String,
}

/// The plugin surface the host platform injects into its iframe.
///
/// Implementations bridge to the actual injected object; all methods map
/// one-to-one onto the host's own API.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Announce the widget and request the given access level.
    async fn ready(&self, required_access: &str) -> Result<()>;

    /// Register a callback fired whenever the host's cursor lands on a
    /// record.
    fn on_record(&self, callback: RecordCallback);

    /// Move the host's cursor to the given row.
    async fn set_cursor_pos(&self, row_id: i64) -> Result<()>;

    /// Apply wire-form action tuples; returns per-action return values.
    async fn apply_user_actions(&self, actions: &[Value]) -> Result<Vec<Value>>;

    /// Fetch a table in the columnar wire shape.
    async fn fetch_table(&self, table_id: &str) -> Result<Value>;

    /// Mint a short-lived document access token.
    async fn get_access_token(&self, read_only: bool) -> Result<AccessToken>;
}

/// Document access through the injected plugin API.
pub struct HostBackend {
    api: Arc<dyn HostApi>,
    http: reqwest::Client,
}

impl HostBackend {
    /// Wrap an injected host API.
    pub fn new(api: Arc<dyn HostApi>) -> Self {
        Self {
            api,
            http: reqwest::Client::new(),
        }
    }

    /// The underlying host API (cursor moves, record callbacks).
    pub fn api(&self) -> &Arc<dyn HostApi> {
        &self.api
    }
}

#[async_trait]
impl DocBackend for HostBackend {
    async fn fetch_table(
        &self,
        table_id: &str,
        filter: Option<&RowFilter>,
    ) -> Result<TableSnapshot> {
        let wire = self.api.fetch_table(table_id).await?;
        let snapshot: TableSnapshot = serde_json::from_value(wire)?;
        // The plugin API has no server-side filter; apply it here.
        match filter.filter(|f| !f.is_empty()) {
            None => Ok(snapshot),
            Some(filter) => Ok(filter_snapshot(&snapshot, filter)),
        }
    }

    async fn apply_user_actions(&self, actions: &[UserAction]) -> Result<Vec<ActionResult>> {
        let wire: Vec<Value> = actions.iter().map(UserAction::to_wire).collect();
        let returned = self.api.apply_user_actions(&wire).await?;
        Ok(returned
            .into_iter()
            .map(|value| serde_json::from_value(value).unwrap_or(ActionResult::Other(Value::Null)))
            .collect())
    }

    async fn fetch_columns(&self, table_id: &str) -> Result<Vec<ColumnDescriptor>> {
        let schema: TableSnapshot =
            serde_json::from_value(self.api.fetch_table(columns::SCHEMA_TABLES).await?)?;
        let parent = columns::table_row_id(&schema, table_id)?;
        let columns_table: TableSnapshot =
            serde_json::from_value(self.api.fetch_table(columns::SCHEMA_COLUMNS).await?)?;
        Ok(columns::columns_from_schema(&columns_table, parent))
    }

    async fn upload_attachments(&self, files: &[AttachmentUpload]) -> Result<Vec<i64>> {
        let access = self.api.get_access_token(false).await?;
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| GridlinkError::Transport(e.to_string()))?;
            form = form.part("upload", part);
        }
        let response = self
            .http
            .post(format!("{}/attachments", access.base_url))
            .query(&[("auth", access.token)])
            .multipart(form)
            .send()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GridlinkError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        crate::rest::normalize_attachment_ids(&body)
    }

    async fn download_attachment(&self, attachment_id: i64) -> Result<Vec<u8>> {
        let access = self.api.get_access_token(true).await?;
        let response = self
            .http
            .get(format!(
                "{}/attachments/{}/download",
                access.base_url, attachment_id
            ))
            .query(&[("auth", access.token)])
            .send()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GridlinkError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Keep only the rows whose cells match every column restriction.
fn filter_snapshot(snapshot: &TableSnapshot, filter: &RowFilter) -> TableSnapshot {
    let records = snapshot
        .records()
        .filter(|record| {
            filter.entries().all(|(col_id, accepted)| {
                record
                    .fields
                    .get(col_id)
                    .map(|value| accepted.contains(value))
                    .unwrap_or(false)
            })
        })
        .collect();
    TableSnapshot::from_records(records)
}
