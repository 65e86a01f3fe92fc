//! Signed bearer tokens: `base64url(claims).base64url(hmac-sha256)`.

use crate::errors::{AppError, AppResult};
use crate::models::role::Role;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const MAX_TOKEN_LEN: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub role: Role,
    pub login: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_secs: ttl_secs as i64,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| AppError::Other(e.to_string()))
    }

    /// Issue a token for `sub` valid for the configured TTL from `now`.
    pub fn issue(&self, sub: i64, role: Role, login: &str, now: i64) -> AppResult<String> {
        let claims = Claims {
            sub,
            role,
            login: login.to_string(),
            exp: now + self.ttl_secs,
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> AppResult<String> {
        let payload_part = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload_part}.{sig_part}"))
    }

    /// Check signature and expiry; every failure is `Unauthorized`.
    pub fn verify(&self, token: &str, now: i64) -> AppResult<Claims> {
        let invalid = || AppError::Unauthorized("invalid token".to_string());

        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(invalid());
        }
        let (payload_part, sig_part) = token.split_once('.').ok_or_else(invalid)?;

        let sig = URL_SAFE_NO_PAD.decode(sig_part).map_err(|_| invalid())?;
        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        mac.verify_slice(&sig).map_err(|_| invalid())?;

        let payload = URL_SAFE_NO_PAD.decode(payload_part).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;

        if claims.exp <= now {
            return Err(AppError::Unauthorized("token expired".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn issued_token_verifies() {
        let signer = TokenSigner::new("secret", 60);
        let token = signer.issue(7, Role::Manager, "mara", NOW).unwrap();
        let claims = signer.verify(&token, NOW + 30).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.login, "mara");
        assert_eq!(claims.exp, NOW + 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::new("secret", 60);
        let token = signer.issue(7, Role::Worker, "w", NOW).unwrap();
        let err = signer.verify(&token, NOW + 60).unwrap_err();
        assert_eq!(err.public_message(), "token expired");
    }

    #[test]
    fn tampered_payload_or_foreign_key_is_rejected() {
        let signer = TokenSigner::new("secret", 60);
        let token = signer.issue(7, Role::Worker, "w", NOW).unwrap();

        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = Claims {
            sub: 1,
            role: Role::Admin,
            login: "root".into(),
            exp: NOW + 600,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{sig}");
        assert!(matches!(
            signer.verify(&forged, NOW),
            Err(AppError::Unauthorized(_))
        ));

        let other = TokenSigner::new("other", 60);
        assert!(other.verify(&token, NOW).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let signer = TokenSigner::new("secret", 60);
        for t in ["", "abc", "a.b", "..", "not base64!.x"] {
            assert!(signer.verify(t, NOW).is_err(), "accepted {t:?}");
        }
    }
}
