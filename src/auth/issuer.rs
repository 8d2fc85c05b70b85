use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use log::{debug, error};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::settings::{AuthConfig, TokenKeys};
use crate::error::{GateError, GateResult};
use crate::models::{AccessClaims, Fingerprint};

/// Per-token choices made by the caller at issuance.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub uid: i64,
    pub uuid: Option<String>,
    pub tenant_id: Option<i64>,
    pub audience: Option<Vec<String>>,
    pub ext: Map<String, Value>,
    pub ttl: Duration,
    /// Where the request came from, see
    /// [`fingerprint_request`](crate::security::fingerprint_request).
    pub fingerprint: Fingerprint,
}

impl IssueRequest {
    pub fn new(uid: i64, ttl: Duration) -> Self {
        IssueRequest {
            uid,
            uuid: None,
            tenant_id: None,
            audience: None,
            ext: Map::new(),
            ttl,
            fingerprint: Fingerprint::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// The `jti` claim. Callers keep this around to revoke the token later.
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs access tokens. Built once from configuration and cheap to clone;
/// every clone signs with the same key material.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    algorithm: Algorithm,
    subject: String,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> GateResult<Self> {
        if config.subject.is_empty() {
            return Err(GateError::Configuration(
                "token subject must not be empty".to_string(),
            ));
        }

        let (encoding_key, algorithm) = match &config.keys {
            TokenKeys::Hs256 { secret } => {
                if secret.is_empty() {
                    return Err(GateError::Configuration(
                        "HS256 secret must not be empty".to_string(),
                    ));
                }
                (EncodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
            }
            TokenKeys::Es256 {
                private_key_pem: Some(pem),
                ..
            } => {
                let key = EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| {
                    GateError::Configuration(format!("invalid ES256 private key: {}", e))
                })?;
                (key, Algorithm::ES256)
            }
            TokenKeys::Es256 {
                private_key_pem: None,
                ..
            } => {
                return Err(GateError::Configuration(
                    "ES256 issuance requires a private key".to_string(),
                ));
            }
        };

        Ok(TokenIssuer {
            encoding_key,
            algorithm,
            subject: config.subject.clone(),
        })
    }

    /// Mints a signed token. Every call produces a fresh `jti`, so two
    /// tokens for the same account can be revoked independently.
    pub fn issue(&self, request: IssueRequest) -> GateResult<IssuedToken> {
        if request.ttl <= Duration::zero() {
            return Err(GateError::Issuance(
                "token lifetime must be positive".to_string(),
            ));
        }

        let issued_at = Utc::now();
        let expires_at = issued_at.checked_add_signed(request.ttl).ok_or_else(|| {
            GateError::Issuance("token lifetime overflows the expiry timestamp".to_string())
        })?;
        let token_id = Uuid::new_v4().to_string();

        let claims = AccessClaims {
            sub: self.subject.clone(),
            uid: request.uid,
            uuid: request.uuid,
            tenant_id: request.tenant_id,
            ext: request.ext,
            jti: token_id.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            aud: request.audience,
            reg_ip: request.fingerprint.ip,
            reg_ua: request.fingerprint.user_agent_hash,
            reg_device: request.fingerprint.device_id,
        };

        let header = Header::new(self.algorithm);

        debug!(
            "Issuing access token {} for uid {} (exp: {})",
            token_id, request.uid, expires_at
        );
        let token = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!("Failed to sign access token: {}", e);
            GateError::Issuance(format!("token signing failed: {}", e))
        })?;

        Ok(IssuedToken {
            token,
            token_id,
            expires_at,
        })
    }
}
