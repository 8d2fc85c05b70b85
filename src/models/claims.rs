use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim set carried by every access token the gate issues and validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject, pinned to the deployment's configured value
    pub sub: String,
    /// Numeric account id
    pub uid: i64,
    /// Opaque account identifier, carried when the caller supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Tenant the account belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<i64>,
    /// Free-form extension payload chosen at issuance
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub ext: Map<String, Value>,
    /// Token id, unique per issued token; revocation is keyed on it
    pub jti: String,
    /// Issued at (UTC timestamp, seconds)
    pub iat: i64,
    /// Expiration time (UTC timestamp, seconds)
    pub exp: i64,
    /// Audience list (informational, not asserted during validation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Vec<String>>,
    /// Client IP captured at issuance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reg_ip: Option<String>,
    /// SHA-256 of the user agent captured at issuance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reg_ua: Option<String>,
    /// Device id captured at issuance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reg_device: Option<String>,
}

impl AccessClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Client characteristics recorded when the token was issued.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            ip: self.reg_ip.clone(),
            user_agent_hash: self.reg_ua.clone(),
            device_id: self.reg_device.clone(),
        }
    }
}

/// Snapshot of where a token request came from. Captured at issuance,
/// embedded into the claims and optionally re-checked on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub ip: Option<String>,
    /// SHA-256 hex digest of the raw user agent string
    pub user_agent_hash: Option<String>,
    pub device_id: Option<String>,
}

impl Fingerprint {
    pub fn is_empty(&self) -> bool {
        self.ip.is_none() && self.user_agent_hash.is_none() && self.device_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_claims() -> AccessClaims {
        AccessClaims {
            sub: "api".to_string(),
            uid: 42,
            uuid: Some("acct-42".to_string()),
            tenant_id: Some(7),
            ext: Map::new(),
            jti: "11111111-2222-3333-4444-555555555555".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_600,
            aud: Some(vec!["billing".to_string()]),
            reg_ip: Some("10.0.0.9".to_string()),
            reg_ua: None,
            reg_device: None,
        }
    }

    #[test]
    fn test_claims_survive_a_serde_round_trip() {
        let claims = sample_claims();
        let encoded = serde_json::to_string(&claims).unwrap();
        let decoded: AccessClaims = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.uid, claims.uid);
        assert_eq!(decoded.jti, claims.jti);
        assert_eq!(decoded.aud, claims.aud);
        assert_eq!(decoded.reg_ip, claims.reg_ip);
    }

    #[test]
    fn test_optional_claims_are_omitted_when_absent() {
        let claims = AccessClaims {
            uuid: None,
            tenant_id: None,
            aud: None,
            reg_ip: None,
            ..sample_claims()
        };
        let encoded = serde_json::to_string(&claims).unwrap();

        assert!(!encoded.contains("uuid"));
        assert!(!encoded.contains("tenant_id"));
        assert!(!encoded.contains("aud"));
        assert!(!encoded.contains("reg_ip"));
        assert!(!encoded.contains("ext"));
    }

    #[test]
    fn test_minimal_payload_deserializes_with_defaults() {
        let decoded: AccessClaims = serde_json::from_str(
            r#"{"sub":"api","uid":1,"jti":"j1","iat":10,"exp":20}"#,
        )
        .unwrap();

        assert_eq!(decoded.uuid, None);
        assert_eq!(decoded.tenant_id, None);
        assert!(decoded.ext.is_empty());
        assert!(decoded.fingerprint().is_empty());
    }

    #[test]
    fn test_timestamps_convert_to_utc_datetimes() {
        let claims = sample_claims();
        assert_eq!(claims.issued_at().timestamp(), 1_700_000_000);
        assert_eq!(claims.expires_at().timestamp(), 1_700_000_600);
    }
}
