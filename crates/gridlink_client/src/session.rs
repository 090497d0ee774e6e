//! Mode selection and the document-access session.
//!
//! A page builds exactly one [`DocSession`] at load. [`DocSession::connect`]
//! runs a one-shot best-effort probe — host API, then developer mock, then
//! REST proxy — and the resulting mode is terminal: there is no retry and
//! no re-selection short of building a new session (the page-reload
//! equivalent).
//!
//! The session owns the per-session caches (column metadata, resolved
//! references) so nothing here is process-global.

use crate::backend::{AttachmentUpload, DocBackend, RowFilter};
use crate::columns;
use crate::config::ClientConfig;
use crate::host::{HostApi, HostBackend, RecordCallback};
use crate::mock::{MockBackend, MockStore};
use crate::refs::{RefCache, ResolvedRefs};
use crate::rest::RestBackend;
use gridlink_core::{
    ActionResult, ColumnDescriptor, GridlinkError, Result, TableSnapshot, UserAction,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Which backend the session ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Embedded in the host's iframe, using the injected plugin API.
    Host,
    /// Standalone, against the REST proxy.
    Rest,
    /// Developer mock fixtures.
    Mock,
    /// No backend reachable; every data call fails, no I/O happens.
    Unavailable,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SessionMode::Host => "host",
            SessionMode::Rest => "rest",
            SessionMode::Mock => "mock",
            SessionMode::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// The per-page document-access session: chosen mode, backend, caches.
pub struct DocSession {
    mode: SessionMode,
    backend: Option<Arc<dyn DocBackend>>,
    refs: RefCache,
    columns: RwLock<HashMap<String, Arc<Vec<ColumnDescriptor>>>>,
    col_id_by_row: RwLock<Option<Arc<HashMap<i64, String>>>>,
}

impl DocSession {
    /// Probe the environment and construct the session.
    ///
    /// Order: live host API → developer mock flag → configured REST proxy
    /// → unavailable. `on_record` is registered with the host when host
    /// mode wins.
    pub async fn connect(
        config: &ClientConfig,
        host: Option<Arc<dyn HostApi>>,
        store: Arc<dyn MockStore>,
        on_record: Option<RecordCallback>,
    ) -> Self {
        if let Some(api) = host {
            match api.ready(&config.required_access).await {
                Ok(()) => {
                    if let Some(callback) = on_record {
                        api.on_record(callback);
                    }
                    info!("document access: host plugin API");
                    return Self::with_backend(
                        SessionMode::Host,
                        Arc::new(HostBackend::new(api)),
                    );
                }
                Err(e) => {
                    warn!("host API present but ready() failed: {}", e);
                }
            }
        }

        if MockBackend::is_enabled(store.as_ref()) {
            info!("document access: developer mock");
            return Self::with_backend(SessionMode::Mock, Arc::new(MockBackend::new(store)));
        }

        if let Some(base_url) = &config.proxy_base_url {
            info!("document access: REST proxy at {}", base_url);
            return Self::with_backend(
                SessionMode::Rest,
                Arc::new(RestBackend::new(base_url.clone(), config.link_token.clone())),
            );
        }

        warn!("document access unavailable: no host API, mock disabled, no proxy configured");
        DocSession {
            mode: SessionMode::Unavailable,
            backend: None,
            refs: RefCache::new(),
            columns: RwLock::new(HashMap::new()),
            col_id_by_row: RwLock::new(None),
        }
    }

    /// Session around an explicit backend (tests, embedding code).
    pub fn with_backend(mode: SessionMode, backend: Arc<dyn DocBackend>) -> Self {
        DocSession {
            mode,
            backend: Some(backend),
            refs: RefCache::new(),
            columns: RwLock::new(HashMap::new()),
            col_id_by_row: RwLock::new(None),
        }
    }

    /// The chosen mode.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// The active backend, or [`GridlinkError::Unavailable`].
    pub fn backend(&self) -> Result<&Arc<dyn DocBackend>> {
        self.backend.as_ref().ok_or(GridlinkError::Unavailable)
    }

    /// Fetch a read snapshot of a table.
    pub async fn fetch_table(
        &self,
        table_id: &str,
        filter: Option<&RowFilter>,
    ) -> Result<TableSnapshot> {
        self.backend()?.fetch_table(table_id, filter).await
    }

    /// Apply a batch of mutations.
    ///
    /// On success (full or partial), cached references resolved against
    /// any written table are evicted so the next dropdown render sees the
    /// new rows.
    pub async fn apply_user_actions(&self, actions: &[UserAction]) -> Result<Vec<ActionResult>> {
        let outcome = self.backend()?.apply_user_actions(actions).await;
        let applied = match &outcome {
            Ok(results) => results.len(),
            Err(GridlinkError::PartialApply { applied, .. }) => *applied,
            Err(_) => 0,
        };
        if applied > 0 {
            let touched: HashSet<&str> = actions
                .iter()
                .take(applied)
                .map(UserAction::table_id)
                .collect();
            for table_id in touched {
                self.refs.invalidate_table(table_id);
            }
        }
        outcome
    }

    /// Decode wire tuples, then apply them.
    ///
    /// An unsupported kind anywhere in the batch fails the whole call
    /// before any backend I/O.
    pub async fn apply_wire_actions(&self, tuples: &[Value]) -> Result<Vec<ActionResult>> {
        let actions = UserAction::from_wire_batch(tuples)?;
        self.apply_user_actions(&actions).await
    }

    /// Column descriptors for a table, memoized per session, sorted by
    /// column id.
    pub async fn columns(&self, table_id: &str) -> Result<Arc<Vec<ColumnDescriptor>>> {
        if let Some(cached) = self.columns.read().unwrap().get(table_id) {
            return Ok(cached.clone());
        }
        let loaded = Arc::new(self.backend()?.fetch_columns(table_id).await?);
        self.columns
            .write()
            .unwrap()
            .insert(table_id.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Resolve a reference column's display rows through the session
    /// cache.
    pub async fn resolve_refs(&self, column: &ColumnDescriptor) -> Result<Arc<ResolvedRefs>> {
        let lookup = self.col_id_lookup().await?;
        self.refs
            .resolve(self.backend()?.as_ref(), column, lookup.as_ref())
            .await
    }

    /// Upload attachment payloads.
    pub async fn upload_attachments(&self, files: &[AttachmentUpload]) -> Result<Vec<i64>> {
        self.backend()?.upload_attachments(files).await
    }

    /// Download one attachment's payload.
    pub async fn download_attachment(&self, attachment_id: i64) -> Result<Vec<u8>> {
        self.backend()?.download_attachment(attachment_id).await
    }

    /// Evict one table's cached references (writes made out of band).
    pub fn invalidate_table(&self, table_id: &str) {
        self.refs.invalidate_table(table_id);
    }

    // The row-id→col-id lookup only exists in host mode, where the
    // columns schema table is reachable. Elsewhere an empty lookup makes
    // display-pointer resolution fall through to the widget-options hint.
    async fn col_id_lookup(&self) -> Result<Arc<HashMap<i64, String>>> {
        if let Some(cached) = self.col_id_by_row.read().unwrap().clone() {
            return Ok(cached);
        }
        let lookup = if self.mode == SessionMode::Host {
            let schema = self
                .backend()?
                .fetch_table(columns::SCHEMA_COLUMNS, None)
                .await?;
            Arc::new(columns::col_id_by_row(&schema))
        } else {
            Arc::new(HashMap::new())
        };
        *self.col_id_by_row.write().unwrap() = Some(lookup.clone());
        Ok(lookup)
    }
}
