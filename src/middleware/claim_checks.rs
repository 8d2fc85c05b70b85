use actix_web::HttpRequest;
use log::warn;

use crate::error::{GateError, GateResult};
use crate::middleware::request_info::user_agent;
use crate::models::AccessClaims;
use crate::security::fingerprint::{DEVICE_ID_HEADER, hash_user_agent};

/// Compares the presented user agent against the hash recorded at
/// issuance. A missing header hashes as the empty string, the same rule
/// the issuance capture applies.
pub fn verify_user_agent(claims: &AccessClaims, req: &HttpRequest) -> GateResult<()> {
    let presented = hash_user_agent(&user_agent(req).unwrap_or_default());
    if claims.reg_ua.as_deref() != Some(presented.as_str()) {
        warn!("Token {} presented with an unexpected user agent", claims.jti);
        return Err(GateError::IdentityMismatch("ua"));
    }
    Ok(())
}

/// Compares the caller's address against the one recorded at issuance.
pub fn verify_ip(claims: &AccessClaims, client_ip: &str) -> GateResult<()> {
    if claims.reg_ip.as_deref() != Some(client_ip) {
        warn!("Token {} presented from an unexpected address", claims.jti);
        return Err(GateError::IdentityMismatch("ip"));
    }
    Ok(())
}

/// Device binding is opt-in per token: only tokens that recorded a device
/// id at issuance demand a matching `x-device-id` header later. Handlers
/// that want stricter coupling call this themselves.
pub fn verify_device_binding(claims: &AccessClaims, req: &HttpRequest) -> GateResult<()> {
    let Some(expected) = claims.reg_device.as_deref() else {
        return Ok(());
    };

    let presented = req
        .headers()
        .get(DEVICE_ID_HEADER)
        .and_then(|value| value.to_str().ok());

    if presented != Some(expected) {
        warn!("Token {} presented from an unexpected device", claims.jti);
        return Err(GateError::IdentityMismatch("device"));
    }
    Ok(())
}
