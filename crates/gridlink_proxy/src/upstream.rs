//! Upstream platform access.
//!
//! [`DocUpstream`] is the proxy's view of the grid platform's REST API,
//! scoped to one document. [`PlatformUpstream`] is the real client;
//! [`InMemoryUpstream`] backs the test suite.

use async_trait::async_trait;
use gridlink_core::{GridlinkError, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// One uploaded attachment payload, already read out of the multipart
/// stream.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original file name.
    pub file_name: String,
    /// MIME type.
    pub mime_type: String,
    /// Payload bytes.
    pub bytes: Vec<u8>,
}

/// Document-scoped access to the upstream platform API.
#[async_trait]
pub trait DocUpstream: Send + Sync {
    /// Fetch a table's records: `{records: [{id, fields}]}`.
    async fn fetch_records(&self, table_id: &str, filter: Option<&str>) -> Result<Value>;

    /// Create records; echoes the created records including new ids.
    async fn create_records(&self, table_id: &str, body: &Value) -> Result<Value>;

    /// Update records by id.
    async fn update_records(&self, table_id: &str, body: &Value) -> Result<Value>;

    /// Fetch a table's raw column metadata: `{columns: [{id, fields}]}`.
    async fn fetch_columns(&self, table_id: &str) -> Result<Value>;

    /// Upload attachment payloads; returns the platform's response shape
    /// verbatim (the widget client normalizes it).
    async fn upload_attachments(&self, files: Vec<UploadedFile>) -> Result<Value>;

    /// Download one attachment: payload bytes and content type.
    async fn download_attachment(&self, attachment_id: i64) -> Result<(Vec<u8>, String)>;
}

// ==================== Platform client ====================

/// Real upstream client over the platform's REST API.
pub struct PlatformUpstream {
    base_url: String,
    api_key: String,
    doc_id: String,
    client: reqwest::Client,
}

impl PlatformUpstream {
    /// Client scoped to one document.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            doc_id: doc_id.into(),
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table_id: &str, tail: &str) -> String {
        format!(
            "{}/docs/{}/tables/{}/{}",
            self.base_url, self.doc_id, table_id, tail
        )
    }

    fn doc_url(&self, tail: &str) -> String {
        format!("{}/docs/{}/{}", self.base_url, self.doc_id, tail)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GridlinkError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn json(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))
    }
}

#[async_trait]
impl DocUpstream for PlatformUpstream {
    async fn fetch_records(&self, table_id: &str, filter: Option<&str>) -> Result<Value> {
        let mut builder = self.client.get(self.table_url(table_id, "records"));
        if let Some(filter) = filter {
            builder = builder.query(&[("filter", filter)]);
        }
        self.json(builder).await
    }

    async fn create_records(&self, table_id: &str, body: &Value) -> Result<Value> {
        self.json(self.client.post(self.table_url(table_id, "records")).json(body))
            .await
    }

    async fn update_records(&self, table_id: &str, body: &Value) -> Result<Value> {
        self.json(self.client.patch(self.table_url(table_id, "records")).json(body))
            .await
    }

    async fn fetch_columns(&self, table_id: &str) -> Result<Value> {
        self.json(self.client.get(self.table_url(table_id, "columns")))
            .await
    }

    async fn upload_attachments(&self, files: Vec<UploadedFile>) -> Result<Value> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime_type)
                .map_err(|e| GridlinkError::Transport(e.to_string()))?;
            form = form.part("upload", part);
        }
        self.json(self.client.post(self.doc_url("attachments")).multipart(form))
            .await
    }

    async fn download_attachment(&self, attachment_id: i64) -> Result<(Vec<u8>, String)> {
        let response = self
            .send(
                self.client
                    .get(self.doc_url(&format!("attachments/{}/download", attachment_id))),
            )
            .await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GridlinkError::Transport(e.to_string()))?;
        Ok((bytes.to_vec(), content_type))
    }
}

// ==================== In-memory upstream ====================

/// In-memory upstream double for tests: fixed tables, sequential ids.
#[derive(Default)]
pub struct InMemoryUpstream {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    columns: Mutex<HashMap<String, Value>>,
    next_id: Mutex<i64>,
}

impl InMemoryUpstream {
    /// Empty upstream.
    pub fn new() -> Self {
        InMemoryUpstream {
            next_id: Mutex::new(100),
            ..InMemoryUpstream::default()
        }
    }

    /// Seed a table with `{id, fields}` records.
    pub fn with_table(self, table_id: &str, records: Vec<Value>) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(table_id.to_string(), records);
        self
    }

    /// Seed a table's raw column metadata (`{columns: [...]}`).
    pub fn with_columns(self, table_id: &str, columns: Value) -> Self {
        self.columns
            .lock()
            .unwrap()
            .insert(table_id.to_string(), columns);
        self
    }
}

#[async_trait]
impl DocUpstream for InMemoryUpstream {
    async fn fetch_records(&self, table_id: &str, _filter: Option<&str>) -> Result<Value> {
        let tables = self.tables.lock().unwrap();
        let records = tables.get(table_id).ok_or_else(|| GridlinkError::Http {
            status: 404,
            message: format!("table {table_id} not found"),
        })?;
        Ok(json!({"records": records}))
    }

    async fn create_records(&self, table_id: &str, body: &Value) -> Result<Value> {
        let mut tables = self.tables.lock().unwrap();
        let records = tables.entry(table_id.to_string()).or_default();
        let mut created = Vec::new();
        for incoming in body["records"].as_array().cloned().unwrap_or_default() {
            let mut next_id = self.next_id.lock().unwrap();
            let record = json!({"id": *next_id, "fields": incoming["fields"]});
            *next_id += 1;
            records.push(record.clone());
            created.push(record);
        }
        Ok(json!({"records": created}))
    }

    async fn update_records(&self, table_id: &str, body: &Value) -> Result<Value> {
        let mut tables = self.tables.lock().unwrap();
        let records = tables.get_mut(table_id).ok_or_else(|| GridlinkError::Http {
            status: 404,
            message: format!("table {table_id} not found"),
        })?;
        for incoming in body["records"].as_array().cloned().unwrap_or_default() {
            let id = incoming["id"].as_i64();
            let found = records.iter_mut().find(|r| r["id"].as_i64() == id);
            match found {
                Some(record) => {
                    let fields = record["fields"].as_object_mut();
                    if let (Some(fields), Some(updates)) = (fields, incoming["fields"].as_object())
                    {
                        for (key, value) in updates {
                            fields.insert(key.clone(), value.clone());
                        }
                    }
                }
                None => {
                    return Err(GridlinkError::Http {
                        status: 404,
                        message: format!("record {id:?} not found"),
                    })
                }
            }
        }
        Ok(json!({"records": body["records"]}))
    }

    async fn fetch_columns(&self, table_id: &str) -> Result<Value> {
        let columns = self.columns.lock().unwrap();
        columns.get(table_id).cloned().ok_or_else(|| GridlinkError::Http {
            status: 404,
            message: format!("no columns for {table_id}"),
        })
    }

    async fn upload_attachments(&self, files: Vec<UploadedFile>) -> Result<Value> {
        let mut next_id = self.next_id.lock().unwrap();
        let ids: Vec<i64> = files
            .iter()
            .map(|_| {
                let id = *next_id;
                *next_id += 1;
                id
            })
            .collect();
        Ok(json!(ids))
    }

    async fn download_attachment(&self, attachment_id: i64) -> Result<(Vec<u8>, String)> {
        Ok((
            format!("attachment-{attachment_id}").into_bytes(),
            "application/octet-stream".to_string(),
        ))
    }
}
