use actix_web::HttpRequest;
use sha2::{Digest, Sha256};

use crate::middleware::request_info::{client_ip, user_agent};
use crate::models::Fingerprint;

// Header used for device binding
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Hashes a user agent string using SHA-256. Tokens carry the digest
/// instead of the raw string so the claim stays short and does not leak
/// the client stack.
pub fn hash_user_agent(user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Captures the caller's fingerprint at issuance time. An absent user
/// agent hashes as the empty string, so re-validation later compares
/// like with like.
pub fn fingerprint_request(req: &HttpRequest) -> Fingerprint {
    let device_id = req
        .headers()
        .get(DEVICE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string());

    Fingerprint {
        ip: Some(client_ip(req)),
        user_agent_hash: Some(hash_user_agent(&user_agent(req).unwrap_or_default())),
        device_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hash_is_a_sha256_hex_digest() {
        let hash = hash_user_agent("curl/8.5.0");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic for the same input
        assert_eq!(hash, hash_user_agent("curl/8.5.0"));
        assert_ne!(hash, hash_user_agent("curl/8.5.1"));
    }

    #[test]
    fn test_fingerprint_captures_all_three_dimensions() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.7"))
            .insert_header(("user-agent", "wicket-client/1.2"))
            .insert_header((DEVICE_ID_HEADER, "device-77"))
            .to_http_request();

        let fp = fingerprint_request(&req);
        assert_eq!(fp.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(
            fp.user_agent_hash.as_deref(),
            Some(hash_user_agent("wicket-client/1.2").as_str())
        );
        assert_eq!(fp.device_id.as_deref(), Some("device-77"));
    }

    #[test]
    fn test_missing_user_agent_hashes_the_empty_string() {
        let req = TestRequest::default().to_http_request();
        let fp = fingerprint_request(&req);
        assert_eq!(fp.user_agent_hash.as_deref(), Some(hash_user_agent("").as_str()));
        assert_eq!(fp.device_id, None);
    }
}
