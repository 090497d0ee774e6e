//! Best-effort side actions after a successful write.
//!
//! Some flows ping an external endpoint once the primary record exists
//! (generating a validation link, nudging a notification service). Those
//! enrichments must never fail the primary operation: they run
//! fire-and-forget, failures are logged, and the outcome is reported as
//! an [`Enrichment`] instead of an error.

use gridlink_core::GridlinkError;
use tracing::{info, warn};

/// Outcome of a secondary enrichment step.
///
/// Distinguishes "primary succeeded, enrichment failed" from silence:
/// callers that care can surface a soft warning; nobody gets an
/// exception.
#[derive(Debug)]
pub enum Enrichment {
    /// The enrichment ran and succeeded.
    Done,
    /// No endpoint is configured; nothing was attempted.
    Skipped,
    /// The enrichment ran and failed; the primary operation stands.
    Failed {
        /// What went wrong, for logging/soft display.
        error: GridlinkError,
    },
}

impl Enrichment {
    /// True when the enrichment ran and failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Enrichment::Failed { .. })
    }
}

/// Fire-and-forget caller for the configured notification endpoint.
#[derive(Debug, Clone)]
pub struct Notifier {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    /// Notifier for an optional endpoint; `None` skips every call.
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    /// Announce a created record. Never propagates failure.
    pub async fn record_created(&self, table_id: &str, row_id: i64) -> Enrichment {
        let Some(endpoint) = &self.endpoint else {
            return Enrichment::Skipped;
        };
        let body = serde_json::json!({"table": table_id, "rowId": row_id});
        let result = self.client.post(endpoint).json(&body).send().await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!("notified {} of {}/{}", endpoint, table_id, row_id);
                Enrichment::Done
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                warn!("notification failed: HTTP {} {}", status, message);
                Enrichment::Failed {
                    error: GridlinkError::Http { status, message },
                }
            }
            Err(e) => {
                warn!("notification failed: {}", e);
                Enrichment::Failed {
                    error: GridlinkError::Transport(e.to_string()),
                }
            }
        }
    }

    /// Detach [`Notifier::record_created`] onto the runtime; the write
    /// path does not wait for it.
    pub fn spawn_record_created(&self, table_id: &str, row_id: i64) {
        let notifier = self.clone();
        let table_id = table_id.to_string();
        tokio::spawn(async move {
            notifier.record_created(&table_id, row_id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_endpoint_is_skipped() {
        let notifier = Notifier::new(None);
        let outcome = notifier.record_created("T", 1).await;
        assert!(matches!(outcome, Enrichment::Skipped));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_softly() {
        // Port 9 (discard) on localhost is not listening.
        let notifier = Notifier::new(Some("http://127.0.0.1:9/notify".to_string()));
        let outcome = notifier.record_created("T", 1).await;
        assert!(outcome.is_failure());
    }
}
