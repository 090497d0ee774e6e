//! Host-mode tests against an in-process plugin-API double.

use async_trait::async_trait;
use gridlink_client::{
    AccessToken, ClientConfig, DocSession, HostApi, MemoryMockStore, RecordCallback, SessionMode,
};
use gridlink_core::{ColType, GridlinkError, Result, UserAction};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Plugin-API double over fixed columnar fixtures.
#[derive(Default)]
struct FakeHost {
    ready_calls: AtomicUsize,
    actions_seen: Mutex<Vec<Value>>,
    tables: HashMap<String, Value>,
}

impl FakeHost {
    fn with_schema() -> Self {
        let mut tables = HashMap::new();
        tables.insert(
            "_grist_Tables".to_string(),
            json!({"id": [1, 2], "tableId": ["CANDIDATS", "ETABLISSEMENTS"]}),
        );
        tables.insert(
            "_grist_Tables_column".to_string(),
            json!({
                "id": [11, 12, 21],
                "parentId": [1, 1, 2],
                "colId": ["Prenom", "Etablissement", "Nom"],
                "label": ["Prénom", "Établissement", "Nom"],
                "type": ["Text", "Ref:ETABLISSEMENTS", "Text"],
                "widgetOptions": ["", "", ""],
                "isFormula": [false, false, false],
                "visibleCol": [0, 21, 0],
                "displayCol": [0, 0, 0]
            }),
        );
        tables.insert(
            "ETABLISSEMENTS".to_string(),
            json!({"id": [1, 2], "Nom": ["Lycée Pasteur", "Collège Sud"]}),
        );
        tables.insert(
            "CANDIDATS".to_string(),
            json!({"id": [5], "Prenom": ["Ana"], "Etablissement": [1]}),
        );
        FakeHost {
            tables,
            ..FakeHost::default()
        }
    }
}

#[async_trait]
impl HostApi for FakeHost {
    async fn ready(&self, _required_access: &str) -> Result<()> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_record(&self, _callback: RecordCallback) {}

    async fn set_cursor_pos(&self, _row_id: i64) -> Result<()> {
        Ok(())
    }

    async fn apply_user_actions(&self, actions: &[Value]) -> Result<Vec<Value>> {
        self.actions_seen.lock().unwrap().extend(actions.iter().cloned());
        Ok(actions.iter().map(|_| json!(42)).collect())
    }

    async fn fetch_table(&self, table_id: &str) -> Result<Value> {
        self.tables
            .get(table_id)
            .cloned()
            .ok_or_else(|| GridlinkError::TableNotFound(table_id.to_string()))
    }

    async fn get_access_token(&self, _read_only: bool) -> Result<AccessToken> {
        Ok(AccessToken {
            token: "tok".to_string(),
            base_url: "http://127.0.0.1:9/api".to_string(),
        })
    }
}

async fn host_session(host: Arc<FakeHost>) -> DocSession {
    DocSession::connect(
        &ClientConfig::default(),
        Some(host),
        Arc::new(MemoryMockStore::new()),
        None,
    )
    .await
}

#[tokio::test]
async fn test_probe_selects_host_and_calls_ready_once() {
    let host = Arc::new(FakeHost::with_schema());
    let session = host_session(host.clone()).await;
    assert_eq!(session.mode(), SessionMode::Host);
    assert_eq!(host.ready_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_columns_via_schema_scan() {
    let session = host_session(Arc::new(FakeHost::with_schema())).await;
    let columns = session.columns("CANDIDATS").await.unwrap();
    let ids: Vec<&str> = columns.iter().map(|c| c.col_id.as_str()).collect();
    assert_eq!(ids, vec!["Etablissement", "Prenom"]);
    assert_eq!(
        columns[0].col_type,
        ColType::Ref("ETABLISSEMENTS".to_string())
    );
}

#[tokio::test]
async fn test_columns_unknown_table_fails() {
    let session = host_session(Arc::new(FakeHost::with_schema())).await;
    let err = session.columns("ABSENT").await.unwrap_err();
    assert!(matches!(err, GridlinkError::TableNotFound(t) if t == "ABSENT"));
}

#[tokio::test]
async fn test_reference_resolution_uses_pointer_lookup() {
    let session = host_session(Arc::new(FakeHost::with_schema())).await;
    let columns = session.columns("CANDIDATS").await.unwrap();
    let reference = columns.iter().find(|c| c.col_id == "Etablissement").unwrap();
    let resolved = session.resolve_refs(reference).await.unwrap();
    assert_eq!(resolved.display_col, "Nom");
    assert_eq!(resolved.label_for(1), Some("Lycée Pasteur"));
    assert_eq!(resolved.label_for(2), Some("Collège Sud"));
}

#[tokio::test]
async fn test_write_goes_through_host_tuples() {
    let host = Arc::new(FakeHost::with_schema());
    let session = host_session(host.clone()).await;
    let results = session
        .apply_user_actions(&[UserAction::add(
            "CANDIDATS",
            [("Prenom".to_string(), json!("Luc"))].into_iter().collect(),
        )])
        .await
        .unwrap();
    assert_eq!(results[0].row_id(), Some(42));
    let seen = host.actions_seen.lock().unwrap();
    assert_eq!(
        seen[0],
        json!(["AddRecord", "CANDIDATS", null, {"Prenom": "Luc"}])
    );
}

#[tokio::test]
async fn test_write_invalidates_reference_cache_for_written_table() {
    let host = Arc::new(FakeHost::with_schema());
    let session = host_session(host.clone()).await;
    let columns = session.columns("CANDIDATS").await.unwrap();
    let reference = columns.iter().find(|c| c.col_id == "Etablissement").unwrap();

    let before = session.resolve_refs(reference).await.unwrap();
    // Writing another table must not evict the cache...
    session
        .apply_user_actions(&[UserAction::update(
            "CANDIDATS",
            5,
            [("Prenom".to_string(), json!("Eva"))].into_iter().collect(),
        )])
        .await
        .unwrap();
    let unchanged = session.resolve_refs(reference).await.unwrap();
    assert!(Arc::ptr_eq(&before, &unchanged));

    // ...but writing the referenced table does.
    session
        .apply_user_actions(&[UserAction::add(
            "ETABLISSEMENTS",
            [("Nom".to_string(), json!("Lycée Nord"))].into_iter().collect(),
        )])
        .await
        .unwrap();
    let refreshed = session.resolve_refs(reference).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &refreshed));
}
