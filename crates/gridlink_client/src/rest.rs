//! REST proxy backend (standalone mode).
//!
//! Talks to a caller-supplied proxy base URL speaking the widget REST
//! surface:
//!
//! - `GET  <proxy>?table=<id>[&filter=<json>]` → `{records: [{id, fields}]}`
//! - `POST <proxy>?table=<id>` body `{records: [{fields}]}` → created records
//! - `PATCH <proxy>?table=<id>` body `{records: [{id, fields}]}`
//! - `GET  <proxy>/columns?table=<id>` → column descriptors
//! - `POST <proxy>` (no table param, multipart) → new attachment ids
//! - `GET  <proxy>/attachment?id=<n>` → attachment bytes
//!
//! Row-oriented responses are transposed into the columnar
//! [`TableSnapshot`] shape the rest of the system expects.

use crate::backend::{AttachmentUpload, DocBackend, RowFilter};
use async_trait::async_trait;
use gridlink_core::{
    sort_by_col_id, ActionResult, ColumnDescriptor, GridlinkError, Record, Result, TableSnapshot,
    UserAction,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Document access over the REST proxy.
#[derive(Debug, Clone)]
pub struct RestBackend {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct CreatedRecords {
    records: Vec<CreatedRecord>,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: i64,
}

impl RestBackend {
    /// Create a backend for the given proxy base URL.
    ///
    /// `token` is the magic-link record token, sent as a bearer header on
    /// every call when present.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fail non-2xx responses with their status and best-effort body.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        warn!("proxy call failed: {} {}", status, message);
        Err(GridlinkError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        Self::check(response).await
    }

    async fn apply_one(&self, action: &UserAction) -> Result<ActionResult> {
        match action {
            UserAction::AddRecord { table_id, fields } => {
                let body = serde_json::json!({"records": [{"fields": fields}]});
                let response = Self::send(
                    self.request(reqwest::Method::POST, "")
                        .query(&[("table", table_id)])
                        .json(&body),
                )
                .await?;
                let created: CreatedRecords = response
                    .json()
                    .await
                    .map_err(|e| GridlinkError::Transport(e.to_string()))?;
                let id = created
                    .records
                    .first()
                    .map(|r| r.id)
                    .ok_or_else(|| GridlinkError::Transport("create echoed no record".into()))?;
                Ok(ActionResult::RowId(id))
            }
            UserAction::UpdateRecord {
                table_id,
                row_id,
                fields,
            } => {
                let body = serde_json::json!({"records": [{"id": row_id, "fields": fields}]});
                Self::send(
                    self.request(reqwest::Method::PATCH, "")
                        .query(&[("table", table_id)])
                        .json(&body),
                )
                .await?;
                Ok(ActionResult::RowId(*row_id))
            }
        }
    }
}

#[async_trait]
impl DocBackend for RestBackend {
    async fn fetch_table(
        &self,
        table_id: &str,
        filter: Option<&RowFilter>,
    ) -> Result<TableSnapshot> {
        let mut builder = self
            .request(reqwest::Method::GET, "")
            .query(&[("table", table_id)]);
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            builder = builder.query(&[("filter", filter.to_query_value())]);
        }
        let response = Self::send(builder).await?;
        let records: RecordsResponse = response
            .json()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        Ok(TableSnapshot::from_records(records.records))
    }

    async fn apply_user_actions(&self, actions: &[UserAction]) -> Result<Vec<ActionResult>> {
        // Applied one tuple at a time, no rollback: a failure at tuple k
        // leaves tuples 1..k-1 committed and reports that count.
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            match self.apply_one(action).await {
                Ok(result) => results.push(result),
                Err(source) if results.is_empty() => return Err(source),
                Err(source) => {
                    return Err(GridlinkError::PartialApply {
                        applied: results.len(),
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(results)
    }

    async fn fetch_columns(&self, table_id: &str) -> Result<Vec<ColumnDescriptor>> {
        let response = Self::send(
            self.request(reqwest::Method::GET, "columns")
                .query(&[("table", table_id)]),
        )
        .await?;
        let mut columns: Vec<ColumnDescriptor> = response
            .json()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        for column in &mut columns {
            column.reparse_options();
        }
        sort_by_col_id(&mut columns);
        Ok(columns)
    }

    async fn upload_attachments(&self, files: &[AttachmentUpload]) -> Result<Vec<i64>> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| GridlinkError::Transport(e.to_string()))?;
            form = form.part("upload", part);
        }
        let response =
            Self::send(self.request(reqwest::Method::POST, "").multipart(form)).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        normalize_attachment_ids(&body)
    }

    async fn download_attachment(&self, attachment_id: i64) -> Result<Vec<u8>> {
        let response = Self::send(
            self.request(reqwest::Method::GET, "attachment")
                .query(&[("id", attachment_id.to_string())]),
        )
        .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Normalize the upload endpoint's heterogeneous response shapes into a
/// list of new attachment ids: a bare array of numbers, a bare number, or
/// an object whose values are numbers.
pub fn normalize_attachment_ids(body: &Value) -> Result<Vec<i64>> {
    match body {
        Value::Number(n) => n
            .as_i64()
            .map(|id| vec![id])
            .ok_or_else(|| GridlinkError::Transport("non-integer attachment id".into())),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_i64()
                    .ok_or_else(|| GridlinkError::Transport("non-integer attachment id".into()))
            })
            .collect(),
        Value::Object(map) => map
            .values()
            .map(|item| {
                item.as_i64()
                    .ok_or_else(|| GridlinkError::Transport("non-integer attachment id".into()))
            })
            .collect(),
        other => Err(GridlinkError::Transport(format!(
            "unexpected attachment upload response: {other}"
        ))),
    }
}
