//! Axum handlers for the widget REST surface.

use crate::config::Config;
use crate::link::{LinkSigner, RecordToken};
use crate::upstream::{DocUpstream, UploadedFile};
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use gridlink_core::{sort_by_col_id, ColumnDescriptor, GridlinkError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Request bodies are small form payloads; attachments dominate.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared state for proxy handlers.
#[derive(Clone)]
pub struct ProxyState {
    /// Upstream platform access.
    pub upstream: Arc<dyn DocUpstream>,
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Token signer, present when a signing key is configured.
    pub signer: Option<LinkSigner>,
}

impl ProxyState {
    /// Wire state from config and an upstream implementation.
    pub fn new(config: Arc<Config>, upstream: Arc<dyn DocUpstream>) -> Self {
        let signer = config
            .links_configured()
            .then(|| LinkSigner::new(&config.link_signing_key, config.link_expiry_minutes));
        Self {
            upstream,
            config,
            signer,
        }
    }
}

/// The widget surface: records at `/`, plus columns, attachments, links.
pub fn proxy_routes(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(fetch_records).post(post_root).patch(update_records))
        .route("/columns", get(fetch_columns))
        .route("/attachment", get(fetch_attachment))
        .route("/link", get(mint_link))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TableParams {
    table: Option<String>,
    filter: Option<String>,
    id: Option<i64>,
    row: Option<i64>,
}

/// Error wrapper mapping [`GridlinkError`] onto HTTP responses.
struct ProxyError(GridlinkError);

impl From<GridlinkError> for ProxyError {
    fn from(err: GridlinkError) -> Self {
        ProxyError(err)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            // Upstream failures are forwarded with their status.
            GridlinkError::Http { status, message } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message,
            ),
            GridlinkError::Transport(message) => (StatusCode::BAD_GATEWAY, message),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

fn forbidden(message: &str) -> ProxyError {
    ProxyError(GridlinkError::Http {
        status: 403,
        message: message.to_string(),
    })
}

fn bad_request(message: &str) -> ProxyError {
    ProxyError(GridlinkError::Http {
        status: 400,
        message: message.to_string(),
    })
}

fn required_table(params: &TableParams) -> Result<&str, ProxyError> {
    params
        .table
        .as_deref()
        .ok_or_else(|| bad_request("missing table parameter"))
}

/// Allow-list gate: runs before any upstream call.
fn check_table(config: &Config, table_id: &str) -> Result<(), ProxyError> {
    if config.allowed_tables.contains(table_id) {
        Ok(())
    } else {
        warn!("rejected request for non-allow-listed table {}", table_id);
        Err(forbidden("table not allowed"))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// For link-gated tables, demand a valid record token scoped to the
/// table. Open tables pass with `None`.
fn record_scope(
    state: &ProxyState,
    headers: &HeaderMap,
    table_id: &str,
) -> Result<Option<RecordToken>, ProxyError> {
    if !state.config.link_tables.contains(table_id) {
        return Ok(None);
    }
    let Some(signer) = &state.signer else {
        return Err(forbidden("record tokens are not configured"));
    };
    let token = bearer_token(headers).ok_or_else(|| forbidden("record token required"))?;
    let scope = signer.verify(token)?;
    if scope.table_id != table_id {
        return Err(forbidden("token is for another table"));
    }
    Ok(Some(scope))
}

async fn fetch_records(
    State(state): State<ProxyState>,
    Query(params): Query<TableParams>,
    headers: HeaderMap,
) -> Result<Json<Value>, ProxyError> {
    let table_id = required_table(&params)?;
    check_table(&state.config, table_id)?;
    // A token-scoped read sees exactly its record, whatever the caller
    // asked to filter on.
    let filter = match record_scope(&state, &headers, table_id)? {
        Some(scope) => Some(json!({"id": [scope.row_id]}).to_string()),
        None => params.filter.clone(),
    };
    let records = state
        .upstream
        .fetch_records(table_id, filter.as_deref())
        .await?;
    Ok(Json(records))
}

async fn post_root(
    State(state): State<ProxyState>,
    Query(params): Query<TableParams>,
    request: Request,
) -> Result<Json<Value>, ProxyError> {
    match params.table.as_deref() {
        Some(table_id) => {
            check_table(&state.config, table_id)?;
            let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
                .await
                .map_err(|e| bad_request(&e.to_string()))?;
            let body: Value =
                serde_json::from_slice(&bytes).map_err(|e| bad_request(&e.to_string()))?;
            let created = state.upstream.create_records(table_id, &body).await?;
            info!(
                "created {} record(s) in {}",
                created["records"].as_array().map(Vec::len).unwrap_or(0),
                table_id
            );
            Ok(Json(created))
        }
        None => {
            // No table parameter: multipart attachment upload.
            let multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| bad_request(&e.to_string()))?;
            upload_attachments(state, multipart).await
        }
    }
}

async fn update_records(
    State(state): State<ProxyState>,
    Query(params): Query<TableParams>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<Value>, ProxyError> {
    let table_id = required_table(&params)?;
    check_table(&state.config, table_id)?;
    let scope = record_scope(&state, &headers, table_id)?;

    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| bad_request(&e.to_string()))?;
    let body: Value = serde_json::from_slice(&bytes).map_err(|e| bad_request(&e.to_string()))?;

    if let Some(scope) = &scope {
        // A token-scoped update may only touch its own record.
        let ids = body["records"]
            .as_array()
            .map(|records| records.iter().filter_map(|r| r["id"].as_i64()).collect())
            .unwrap_or_else(Vec::new);
        if ids.is_empty() || ids.iter().any(|id| *id != scope.row_id) {
            return Err(forbidden("token does not cover the requested record"));
        }
    }

    let updated = state.upstream.update_records(table_id, &body).await?;
    Ok(Json(updated))
}

async fn fetch_columns(
    State(state): State<ProxyState>,
    Query(params): Query<TableParams>,
) -> Result<Json<Value>, ProxyError> {
    let table_id = required_table(&params)?;
    check_table(&state.config, table_id)?;
    let raw = state.upstream.fetch_columns(table_id).await?;
    let columns = normalize_columns(&raw);
    Ok(Json(serde_json::to_value(columns).map_err(GridlinkError::from)?))
}

async fn upload_attachments(
    state: ProxyState,
    mut multipart: Multipart,
) -> Result<Json<Value>, ProxyError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&e.to_string()))?
    {
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(&e.to_string()))?
            .to_vec();
        files.push(UploadedFile {
            file_name,
            mime_type,
            bytes,
        });
    }
    if files.is_empty() {
        return Err(bad_request("no files in upload"));
    }
    let ids = state.upstream.upload_attachments(files).await?;
    Ok(Json(ids))
}

async fn fetch_attachment(
    State(state): State<ProxyState>,
    Query(params): Query<TableParams>,
) -> Result<Response, ProxyError> {
    let id = params.id.ok_or_else(|| bad_request("missing id parameter"))?;
    let (bytes, content_type) = state.upstream.download_attachment(id).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Mint a magic link for one record. Guarded by the admin secret; used
/// by back-office flows after a record is created.
async fn mint_link(
    State(state): State<ProxyState>,
    Query(params): Query<TableParams>,
    headers: HeaderMap,
) -> Result<Json<Value>, ProxyError> {
    let admin = state
        .config
        .admin_secret
        .as_deref()
        .ok_or_else(|| forbidden("link minting is not configured"))?;
    let provided = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided != admin {
        return Err(forbidden("bad admin key"));
    }

    let table_id = required_table(&params)?;
    check_table(&state.config, table_id)?;
    let row_id = params.row.ok_or_else(|| bad_request("missing row parameter"))?;
    let signer = state
        .signer
        .as_ref()
        .ok_or_else(|| forbidden("record tokens are not configured"))?;

    Ok(Json(json!({
        "token": signer.issue(table_id, row_id),
        "url": signer.link_url(&state.config.link_base_url, table_id, row_id),
    })))
}

/// Flatten the platform's `{columns: [{id, fields}]}` metadata into the
/// descriptor list the widgets consume, sorted by column id.
pub fn normalize_columns(raw: &Value) -> Vec<ColumnDescriptor> {
    let mut columns: Vec<ColumnDescriptor> = raw["columns"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let col_id = item["id"].as_str()?;
                    let fields = &item["fields"];
                    let label = fields["label"].as_str().filter(|l| !l.is_empty()).unwrap_or(col_id);
                    let col_type = fields["type"].as_str().unwrap_or("Text");
                    let mut column = ColumnDescriptor::new(col_id, label, col_type);
                    if let Some(options) = fields["widgetOptions"].as_str() {
                        column = column.with_widget_options(options);
                    }
                    column.is_formula = fields["isFormula"].as_bool().unwrap_or(false);
                    column.description = fields["description"]
                        .as_str()
                        .filter(|d| !d.is_empty())
                        .map(str::to_string);
                    column.visible_col_row_id = fields["visibleCol"].as_i64().filter(|id| *id != 0);
                    column.display_col_row_id = fields["displayCol"].as_i64().filter(|id| *id != 0);
                    Some(column)
                })
                .collect()
        })
        .unwrap_or_default();
    sort_by_col_id(&mut columns);
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_columns_flattens_and_sorts() {
        let raw = json!({"columns": [
            {"id": "Nom", "fields": {"label": "Nom", "type": "Text", "isFormula": false}},
            {"id": "Age", "fields": {"label": "", "type": "Int", "isFormula": true}}
        ]});
        let columns = normalize_columns(&raw);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].col_id, "Age");
        assert_eq!(columns[0].label, "Age");
        assert!(columns[0].is_formula);
        assert_eq!(columns[1].col_id, "Nom");
    }

    #[test]
    fn test_normalize_columns_tolerates_junk() {
        assert!(normalize_columns(&json!({})).is_empty());
        assert!(normalize_columns(&json!({"columns": [{"fields": {}}]})).is_empty());
    }
}
