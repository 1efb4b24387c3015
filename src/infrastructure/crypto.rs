use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid signing key")]
    InvalidKey,
    #[error("Malformed token")]
    Malformed,
    #[error("Bad token signature")]
    BadSignature,
    #[error("Token expired")]
    Expired,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub email: String,
    /// Unix seconds.
    pub exp: i64,
}

/// Issues and verifies `<claims>.<signature>` bearer tokens, both parts
/// base64url encoded, signed with HMAC-SHA256.
pub struct TokenSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_secs: i64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidKey);
        }
        if secret.len() < 32 {
            warn!(
                length = secret.len(),
                "Token signing secret is shorter than 32 bytes; use a longer random value"
            );
        }
        Ok(Self {
            key: secret.as_bytes().to_vec(),
            ttl: Duration::seconds(ttl_secs),
        })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::InvalidKey)
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        let claims = TokenClaims {
            sub: user_id,
            email: email.to_string(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let payload = B64.encode(payload);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = B64.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = B64.decode(signature).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = B64.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Check a hex HMAC-SHA256 webhook signature over the raw request body.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(signature_bytes) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature_bytes).is_ok()
}

pub fn sign_webhook_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Six upper-case hex characters.
pub fn generate_verification_code() -> String {
    let mut bytes = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}

pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}
