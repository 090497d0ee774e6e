//! Signed record tokens for magic links.
//!
//! A magic link grants access to exactly one record outside the host
//! session: the token binds a table id, a row id, and an expiry, signed
//! with HMAC-SHA256. Format:
//!
//! ```text
//! <table>.<row>.<unix-expiry>.<hex signature>
//! ```
//!
//! Table ids are platform identifiers (no dots), so splitting on `.` is
//! unambiguous.

use chrono::Utc;
use gridlink_core::{GridlinkError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A verified token's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordToken {
    /// Table the token grants access to.
    pub table_id: String,
    /// Row the token grants access to.
    pub row_id: i64,
    /// Unix timestamp after which the token is dead.
    pub expires_at: i64,
}

/// Issues and verifies record tokens.
#[derive(Clone)]
pub struct LinkSigner {
    key: Vec<u8>,
    expiry_minutes: i64,
}

impl LinkSigner {
    /// Signer over a shared secret key.
    pub fn new(key: impl AsRef<[u8]>, expiry_minutes: i64) -> Self {
        Self {
            key: key.as_ref().to_vec(),
            expiry_minutes,
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.key).expect("HMAC key of any length")
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Issue a token for one record, expiring after the configured delay.
    pub fn issue(&self, table_id: &str, row_id: i64) -> String {
        let expires_at = Utc::now().timestamp() + self.expiry_minutes * 60;
        let payload = format!("{}.{}.{}", table_id, row_id, expires_at);
        format!("{}.{}", payload, self.sign(&payload))
    }

    /// Verify a token's signature and expiry.
    ///
    /// # Errors
    ///
    /// `Http {status: 401}` on malformed, tampered, or expired tokens —
    /// callers forward the status as-is.
    pub fn verify(&self, token: &str) -> Result<RecordToken> {
        let reject = |reason: &str| GridlinkError::Http {
            status: 401,
            message: reason.to_string(),
        };

        let (payload, signature) = token.rsplit_once('.').ok_or_else(|| reject("bad token"))?;
        let mut parts = payload.split('.');
        let (table_id, row_id, expires_at) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(table), Some(row), Some(exp), None) => (table, row, exp),
            _ => return Err(reject("bad token")),
        };
        let row_id: i64 = row_id.parse().map_err(|_| reject("bad token"))?;
        let expires_at: i64 = expires_at.parse().map_err(|_| reject("bad token"))?;

        let signature = hex::decode(signature).map_err(|_| reject("bad signature"))?;
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&signature)
            .map_err(|_| reject("bad signature"))?;

        if expires_at < Utc::now().timestamp() {
            return Err(reject("token expired"));
        }

        Ok(RecordToken {
            table_id: table_id.to_string(),
            row_id,
            expires_at,
        })
    }

    /// Build the user-facing magic link for one record.
    pub fn link_url(&self, base_url: &str, table_id: &str, row_id: i64) -> String {
        format!(
            "{}?token={}",
            base_url.trim_end_matches('/'),
            self.issue(table_id, row_id)
        )
    }
}
