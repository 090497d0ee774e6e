//! Developer mock backend.
//!
//! Lets a widget render outside the host without a proxy: a fixed record
//! is synthesized after a short delay, and writes are logged no-ops that
//! echo plausible results. Enablement and fixtures live in a
//! local-storage-shaped key/value store ([`MockStore`]) so a developer
//! can flip the flag and edit the fixture without rebuilding.

use crate::backend::{AttachmentUpload, DocBackend, RowFilter};
use async_trait::async_trait;
use gridlink_core::{
    sort_by_col_id, ActionResult, ColumnDescriptor, Record, Result, TableSnapshot, UserAction,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// Store key holding the enablement flag (`"true"` enables mock mode).
pub const MOCK_ENABLED_KEY: &str = "gridlink.mock.enabled";
/// Store key holding the JSON-serialized fixture record.
pub const MOCK_RECORD_KEY: &str = "gridlink.mock.record";
/// Store key holding the JSON-serialized column descriptors.
pub const MOCK_COLUMNS_KEY: &str = "gridlink.mock.columns";

/// Local persisted state, last-write-wins, no locking beyond the call.
///
/// Mirrors the shape of browser local storage so a wasm embedder can
/// implement it directly over `window.localStorage`.
pub trait MockStore: Send + Sync {
    /// Read a key.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a key.
    fn set(&self, key: &str, value: &str);
}

/// In-memory [`MockStore`] for tests and native use.
#[derive(Default)]
pub struct MemoryMockStore(Mutex<HashMap<String, String>>);

impl MemoryMockStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MockStore for MemoryMockStore {
    fn get(&self, key: &str) -> Option<String> {
        self.0.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.0.lock().unwrap().insert(key.to_string(), value.to_string());
    }
}

/// Document access against a synthesized fixture.
pub struct MockBackend {
    store: Arc<dyn MockStore>,
    delay: Duration,
    next_row_id: AtomicI64,
}

impl MockBackend {
    /// Wrap a store, with the default synthesis delay.
    pub fn new(store: Arc<dyn MockStore>) -> Self {
        Self::with_delay(store, Duration::from_millis(300))
    }

    /// Wrap a store with an explicit synthesis delay (tests use zero).
    pub fn with_delay(store: Arc<dyn MockStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            next_row_id: AtomicI64::new(1000),
        }
    }

    /// True when the store's enablement flag is set.
    pub fn is_enabled(store: &dyn MockStore) -> bool {
        store
            .get(MOCK_ENABLED_KEY)
            .map(|flag| flag == "true")
            .unwrap_or(false)
    }

    /// The fixture record: the stored one, or a small built-in default.
    fn fixture(&self) -> Record {
        self.store
            .get(MOCK_RECORD_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_else(|| Record {
                id: 1,
                fields: [
                    ("Prenom".to_string(), Value::String("Ana".to_string())),
                    ("Nom".to_string(), Value::String("Martin".to_string())),
                ]
                .into_iter()
                .collect(),
            })
    }
}

#[async_trait]
impl DocBackend for MockBackend {
    async fn fetch_table(
        &self,
        table_id: &str,
        _filter: Option<&RowFilter>,
    ) -> Result<TableSnapshot> {
        tokio::time::sleep(self.delay).await;
        let record = self.fixture();
        info!("mock: serving 1 fixture row for table {}", table_id);
        Ok(TableSnapshot::from_records(vec![record]))
    }

    async fn apply_user_actions(&self, actions: &[UserAction]) -> Result<Vec<ActionResult>> {
        // No-op writes: log what would have happened and echo fresh ids.
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            let row_id = match action {
                UserAction::AddRecord { table_id, fields } => {
                    let id = self.next_row_id.fetch_add(1, Ordering::Relaxed);
                    info!("mock: AddRecord {} {:?} -> {}", table_id, fields, id);
                    id
                }
                UserAction::UpdateRecord {
                    table_id,
                    row_id,
                    fields,
                } => {
                    info!("mock: UpdateRecord {} row {} {:?}", table_id, row_id, fields);
                    *row_id
                }
            };
            results.push(ActionResult::RowId(row_id));
        }
        Ok(results)
    }

    async fn fetch_columns(&self, table_id: &str) -> Result<Vec<ColumnDescriptor>> {
        let mut columns: Vec<ColumnDescriptor> = self
            .store
            .get(MOCK_COLUMNS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_else(|| {
                // Derive text columns from the fixture's fields.
                self.fixture()
                    .fields
                    .keys()
                    .map(|col_id| ColumnDescriptor::new(col_id.clone(), col_id.clone(), "Text"))
                    .collect()
            });
        for column in &mut columns {
            column.reparse_options();
        }
        sort_by_col_id(&mut columns);
        info!("mock: serving {} columns for table {}", columns.len(), table_id);
        Ok(columns)
    }

    async fn upload_attachments(&self, files: &[AttachmentUpload]) -> Result<Vec<i64>> {
        let ids = files
            .iter()
            .map(|file| {
                let id = self.next_row_id.fetch_add(1, Ordering::Relaxed);
                info!("mock: upload {} ({} bytes) -> {}", file.file_name, file.bytes.len(), id);
                id
            })
            .collect();
        Ok(ids)
    }

    async fn download_attachment(&self, attachment_id: i64) -> Result<Vec<u8>> {
        info!("mock: download attachment {} (empty payload)", attachment_id);
        Ok(Vec::new())
    }
}
