use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use log::debug;

use crate::config::settings::{AuthConfig, TokenKeys};
use crate::error::{GateError, GateResult};
use crate::models::AccessClaims;

/// Checks presented tokens: signature, expiry with zero leeway and the
/// pinned subject. Anything wrong comes back as the one opaque
/// [`GateError::TokenInvalid`]; the concrete reason is only logged.
#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> GateResult<Self> {
        let (decoding_key, algorithm) = match &config.keys {
            TokenKeys::Hs256 { secret } => {
                if secret.is_empty() {
                    return Err(GateError::Configuration(
                        "HS256 secret must not be empty".to_string(),
                    ));
                }
                (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
            }
            TokenKeys::Es256 {
                public_key_pem: Some(pem),
                ..
            } => {
                let key = DecodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| {
                    GateError::Configuration(format!("invalid ES256 public key: {}", e))
                })?;
                (key, Algorithm::ES256)
            }
            TokenKeys::Es256 {
                public_key_pem: None,
                ..
            } => {
                return Err(GateError::Configuration(
                    "ES256 validation requires a public key".to_string(),
                ));
            }
        };

        Ok(TokenValidator {
            decoding_key,
            algorithm,
        })
    }

    pub fn validate(&self, token: &str, expected_subject: &str) -> GateResult<AccessClaims> {
        let mut validation = Validation::new(self.algorithm);
        // No grace period on expiry; a token one second past exp is dead.
        validation.leeway = 0;
        // The aud claim is informational here, callers scope it themselves.
        validation.validate_aud = false;
        validation.sub = Some(expected_subject.to_string());
        validation.set_required_spec_claims(&["exp", "sub"]);

        match decode::<AccessClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => {
                debug!("Token validation failed: {}", err);
                Err(GateError::TokenInvalid)
            }
        }
    }

    /// Decodes the claims without verifying the signature or expiry. For
    /// diagnostics and audit tooling only, never for admission.
    pub fn parse_unchecked(&self, token: &str) -> GateResult<AccessClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!("Token parse failed: {}", err);
                GateError::TokenInvalid
            })
    }
}
