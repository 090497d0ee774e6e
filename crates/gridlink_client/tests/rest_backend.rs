//! REST backend integration tests against a live stub proxy on
//! 127.0.0.1:0.

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use gridlink_client::{AttachmentUpload, DocBackend, RestBackend, RowFilter};
use gridlink_core::{GridlinkError, UserAction};
use serde_json::{json, Value};
use std::collections::HashMap;

async fn fetch_records(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("table").map(String::as_str) {
        Some("CANDIDATS") => {
            // Echo the filter back through a fake row so tests can see it.
            let records = match params.get("filter") {
                None => json!([
                    {"id": 7, "fields": {"Nom": "Dupont"}},
                    {"id": 9, "fields": {"Nom": "Martin"}}
                ]),
                Some(filter) => json!([{"id": 1, "fields": {"Filter": filter}}]),
            };
            Json(json!({"records": records})).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "no such table").into_response(),
    }
}

async fn mutate_records(
    method: axum::http::Method,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> axum::response::Response {
    let Some(table) = params.get("table") else {
        // No table param: multipart attachment upload.
        return Json(json!({"0": 4, "1": 5})).into_response();
    };
    if table == "BOOM" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    match method {
        axum::http::Method::POST => {
            let fields = payload["records"][0]["fields"].clone();
            Json(json!({"records": [{"id": 42, "fields": fields}]})).into_response()
        }
        _ => Json(json!({"records": [{"id": payload["records"][0]["id"]}]})).into_response(),
    }
}

async fn fetch_columns(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("table").map(String::as_str) {
        Some("CANDIDATS") => Json(json!([
            {
                "colId": "Prenom",
                "label": "Prénom",
                "type": "Text",
                "widgetOptions": "",
                "isFormula": false
            },
            {
                "colId": "Etablissement",
                "label": "Établissement",
                "type": "Ref:ETABLISSEMENTS",
                "widgetOptions": "{\"visibleCol\":\"Nom\"}",
                "isFormula": false
            }
        ]))
        .into_response(),
        _ => (StatusCode::NOT_FOUND, "no such table").into_response(),
    }
}

async fn fetch_attachment(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("id").map(String::as_str) {
        Some("4") => Bytes::from_static(b"payload").into_response(),
        _ => (StatusCode::NOT_FOUND, "no such attachment").into_response(),
    }
}

/// Serve the stub proxy, returning its base URL.
async fn start_stub() -> String {
    let app = Router::new()
        .route("/", get(fetch_records).post(mutate_records).patch(mutate_records))
        .route("/columns", get(fetch_columns))
        .route("/attachment", get(fetch_attachment));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_fetch_table_transposes_records() {
    let backend = RestBackend::new(start_stub().await, None);
    let snapshot = backend.fetch_table("CANDIDATS", None).await.unwrap();
    assert_eq!(snapshot.ids(), &[7, 9]);
    assert_eq!(
        snapshot.column("Nom").unwrap(),
        &[json!("Dupont"), json!("Martin")]
    );
}

#[tokio::test]
async fn test_fetch_table_sends_filter_json() {
    let backend = RestBackend::new(start_stub().await, None);
    let filter = RowFilter::eq("Statut", json!("Ouvert"));
    let snapshot = backend.fetch_table("CANDIDATS", Some(&filter)).await.unwrap();
    assert_eq!(
        snapshot.cell(1, "Filter"),
        Some(&json!(r#"{"Statut":["Ouvert"]}"#))
    );
}

#[tokio::test]
async fn test_fetch_table_missing_table_is_http_error() {
    let backend = RestBackend::new(start_stub().await, None);
    let err = backend.fetch_table("ABSENT", None).await.unwrap_err();
    match err {
        GridlinkError::Http { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "no such table");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_add_record_returns_created_id() {
    let backend = RestBackend::new(start_stub().await, None);
    let results = backend
        .apply_user_actions(&[UserAction::add(
            "CANDIDATS",
            [("Prenom".to_string(), json!("Ana"))].into_iter().collect(),
        )])
        .await
        .unwrap();
    assert_eq!(results[0].row_id(), Some(42));
}

#[tokio::test]
async fn test_update_record_echoes_row_id() {
    let backend = RestBackend::new(start_stub().await, None);
    let results = backend
        .apply_user_actions(&[UserAction::update(
            "CANDIDATS",
            9,
            [("Nom".to_string(), json!("Martin-Durand"))].into_iter().collect(),
        )])
        .await
        .unwrap();
    assert_eq!(results[0].row_id(), Some(9));
}

#[tokio::test]
async fn test_partial_apply_reports_committed_count() {
    let backend = RestBackend::new(start_stub().await, None);
    let fields = || [("A".to_string(), json!(1))].into_iter().collect();
    let err = backend
        .apply_user_actions(&[
            UserAction::add("CANDIDATS", fields()),
            UserAction::add("BOOM", fields()),
        ])
        .await
        .unwrap_err();
    match err {
        GridlinkError::PartialApply { applied, source } => {
            assert_eq!(applied, 1);
            assert!(matches!(*source, GridlinkError::Http { status: 500, .. }));
        }
        other => panic!("expected PartialApply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_tuple_failure_is_not_partial() {
    let backend = RestBackend::new(start_stub().await, None);
    let fields = || [("A".to_string(), json!(1))].into_iter().collect();
    let err = backend
        .apply_user_actions(&[UserAction::add("BOOM", fields())])
        .await
        .unwrap_err();
    assert!(matches!(err, GridlinkError::Http { status: 500, .. }));
}

#[tokio::test]
async fn test_fetch_columns_sorted_and_parsed() {
    let backend = RestBackend::new(start_stub().await, None);
    let columns = backend.fetch_columns("CANDIDATS").await.unwrap();
    let ids: Vec<&str> = columns.iter().map(|c| c.col_id.as_str()).collect();
    assert_eq!(ids, vec!["Etablissement", "Prenom"]);
    // The options blob was re-parsed after deserialization.
    assert_eq!(columns[0].options.display_col_hint(), Some("Nom"));
}

#[tokio::test]
async fn test_upload_normalizes_object_of_ids() {
    let backend = RestBackend::new(start_stub().await, None);
    let ids = backend
        .upload_attachments(&[AttachmentUpload {
            file_name: "cv.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: b"%PDF-".to_vec(),
        }])
        .await
        .unwrap();
    assert_eq!(ids, vec![4, 5]);
}

#[tokio::test]
async fn test_download_attachment_bytes() {
    let backend = RestBackend::new(start_stub().await, None);
    let bytes = backend.download_attachment(4).await.unwrap();
    assert_eq!(bytes, b"payload");
}
