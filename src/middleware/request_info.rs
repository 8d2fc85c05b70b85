use actix_web::HttpRequest;
use actix_web::http::header::{AUTHORIZATION, USER_AGENT};

/// Best-effort client address for rate limiting and IP binding.
///
/// Proxy headers win over the socket address so deployments behind a
/// load balancer key their counters on the real caller, not the proxy.
pub fn client_ip(req: &HttpRequest) -> String {
    if let Some(forwarded_for) = req.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return first_ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            return real_ip_str.to_string();
        }
    }

    // Fallback to connection info
    if let Some(peer_addr) = req.peer_addr() {
        peer_addr.ip().to_string()
    } else {
        "unknown".to_string()
    }
}

/// Pulls the token out of an `Authorization: Bearer ...` header. Returns
/// `None` when the header is missing, malformed or carries an empty token.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let auth_str = req.headers().get(AUTHORIZATION)?.to_str().ok()?;

    if !auth_str.starts_with("Bearer ") {
        return None;
    }

    let token = auth_str[7..].trim();
    if token.is_empty() {
        return None;
    }

    Some(token.to_string())
}

pub fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_forwarded_for_takes_the_first_hop() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.7, 10.0.0.1"))
            .insert_header(("x-real-ip", "10.0.0.1"))
            .to_http_request();

        assert_eq!(client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_is_the_second_choice() {
        let req = TestRequest::default()
            .insert_header(("x-real-ip", "198.51.100.2"))
            .to_http_request();

        assert_eq!(client_ip(&req), "198.51.100.2");
    }

    #[test]
    fn test_unknown_when_nothing_identifies_the_peer() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(client_ip(&req), "unknown");
    }

    #[test]
    fn test_bearer_token_parsing() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer   "))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn test_user_agent_header() {
        let req = TestRequest::default()
            .insert_header((USER_AGENT, "wicket-client/1.2"))
            .to_http_request();
        assert_eq!(user_agent(&req).as_deref(), Some("wicket-client/1.2"));

        let req = TestRequest::default().to_http_request();
        assert_eq!(user_agent(&req), None);
    }
}
