use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use limelight_common::{LimelightError, Result};

type HmacSha256 = Hmac<Sha256>;

/// States older than this are rejected even with a valid signature.
const STATE_MAX_AGE_SECS: i64 = 15 * 60;

/// Small clock-skew allowance for states stamped slightly in the future.
const STATE_SKEW_SECS: i64 = 60;

/// The record round-tripped through the remote authorization redirect.
/// Every field is untrusted until the signature verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkState {
    pub user_id: i64,
    pub persona_num: Option<i32>,
    pub nonce: String,
    pub issued_at: i64,
}

impl LinkState {
    pub fn new(user_id: i64, persona_num: Option<i32>) -> Self {
        Self {
            user_id,
            persona_num,
            nonce: Uuid::new_v4().to_string(),
            issued_at: Utc::now().timestamp(),
        }
    }
}

/// Signs link state into an opaque `base64url(payload).base64url(mac)`
/// token, removing the need for server-side session affinity during the
/// OAuth callback.
#[derive(Clone)]
pub struct StateCodec {
    secret: Vec<u8>,
}

impl StateCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn encode(&self, state: &LinkState) -> String {
        let payload =
            serde_json::to_vec(state).expect("LinkState serialization cannot fail");
        let mac = self.sign(&payload);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(mac)
        )
    }

    /// Recompute the MAC and require constant-time equality before any
    /// field is parsed. Any parse or MAC failure, or an over-age state,
    /// invalidates the whole authorization attempt — no partial trust.
    pub fn verify(&self, token: &str) -> Result<LinkState> {
        let (payload_b64, mac_b64) = token
            .split_once('.')
            .ok_or_else(|| invalid("malformed token"))?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| invalid("payload encoding"))?;
        let mac = URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| invalid("mac encoding"))?;

        let expected = self.sign(&payload);
        if !constant_time_eq(&mac, &expected) {
            return Err(invalid("signature mismatch"));
        }

        let state: LinkState =
            serde_json::from_slice(&payload).map_err(|_| invalid("payload shape"))?;

        let age = Utc::now().timestamp() - state.issued_at;
        if age > STATE_MAX_AGE_SECS || age < -STATE_SKEW_SECS {
            return Err(invalid("state expired"));
        }
        Ok(state)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

fn invalid(reason: &str) -> LimelightError {
    LimelightError::StateInvalid(reason.to_string())
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
