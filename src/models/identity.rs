use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, dev::Payload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::{Ready, ready};

use super::claims::{AccessClaims, Fingerprint};

/// The admitted caller, as established by the gate. Inserted into the
/// request extensions after a token passes validation, so handlers can
/// take it as an extractor argument.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identity {
    pub uid: i64,
    pub uuid: Option<String>,
    pub tenant_id: Option<i64>,
    pub subject: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
    pub fingerprint: Fingerprint,
    pub ext: Map<String, Value>,
}

impl Identity {
    pub fn from_claims(claims: AccessClaims) -> Self {
        let fingerprint = claims.fingerprint();
        let expires_at = claims.expires_at();
        Identity {
            uid: claims.uid,
            uuid: claims.uuid,
            tenant_id: claims.tenant_id,
            subject: claims.sub,
            token_id: claims.jti,
            expires_at,
            fingerprint,
            ext: claims.ext,
        }
    }
}

impl FromRequest for Identity {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(identity) = req.extensions().get::<Identity>() {
            ready(Ok(identity.clone()))
        } else {
            ready(Err(actix_web::error::ErrorUnauthorized("Not authenticated")))
        }
    }
}
