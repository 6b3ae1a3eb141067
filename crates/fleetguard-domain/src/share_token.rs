use crate::error::{DomainError, DomainResult};
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// MAC truncation length; 64 bits of forgery resistance for a
/// non-enumerable capability string
const SIGNATURE_BYTES: usize = 8;

/// Stateless signed token granting read access to one report in one tenant.
///
/// `token = base64url(report_id | '|' | tenant_id | '|' | sig)` where `sig`
/// is the base64 of the first 8 bytes of HMAC-SHA256 over
/// `report_id ":" tenant_id`. Verified purely by recomputation: a bearer
/// capability, with no server-side session and no revocation short of
/// rotating the signing key.
#[derive(Clone)]
pub struct ShareTokenCodec {
    key: Vec<u8>,
}

impl ShareTokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    pub fn encode(&self, report_id: &str, tenant_id: &str) -> String {
        let sig = self.signature(report_id, tenant_id);
        let plain = format!("{}|{}|{}", report_id, tenant_id, sig);
        URL_SAFE_NO_PAD.encode(plain)
    }

    /// Decode and verify a token; returns `(report_id, tenant_id)`.
    ///
    /// Structural parse failure and signature mismatch both yield
    /// `InvalidToken` so callers cannot tell which part was wrong.
    pub fn decode(&self, token: &str) -> DomainResult<(String, String)> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| DomainError::InvalidToken)?;
        let plain = String::from_utf8(raw).map_err(|_| DomainError::InvalidToken)?;

        let parts: Vec<&str> = plain.split('|').collect();
        if parts.len() != 3 {
            return Err(DomainError::InvalidToken);
        }
        let (report_id, tenant_id, sig) = (parts[0], parts[1], parts[2]);
        if report_id.is_empty() || tenant_id.is_empty() {
            return Err(DomainError::InvalidToken);
        }

        let expected = self.signature(report_id, tenant_id);
        // Constant-time comparison; unequal lengths compare as not-equal
        if expected.as_bytes().ct_eq(sig.as_bytes()).into() {
            Ok((report_id.to_string(), tenant_id.to_string()))
        } else {
            Err(DomainError::InvalidToken)
        }
    }

    fn signature(&self, report_id: &str, tenant_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any length");
        mac.update(report_id.as_bytes());
        mac.update(b":");
        mac.update(tenant_id.as_bytes());
        let digest = mac.finalize().into_bytes();
        STANDARD_NO_PAD.encode(&digest[..SIGNATURE_BYTES])
    }
}
