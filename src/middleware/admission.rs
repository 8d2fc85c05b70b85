use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
};
use actix_web::HttpMessage;
use futures_util::future::{Ready, ok};
use log::{debug, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::auth::{RevocationList, TokenValidator};
use crate::config::settings::{FailurePolicy, GateSettings};
use crate::error::{GateError, GateResult};
use crate::middleware::claim_checks::{verify_ip, verify_user_agent};
use crate::middleware::request_info::{bearer_token, client_ip};
use crate::models::Identity;
use crate::ratelimit::{RateLimiter, RouteLimits};
use crate::store::CounterStore;

/// Per-route behavior of the gate. Wrap a scope with
/// [`AdmissionGate::with_rules`] to loosen authentication or tighten the
/// caps for just that scope.
#[derive(Debug, Clone, Default)]
pub struct RouteRules {
    /// Admit requests without a token. Rate limiting still applies, and a
    /// valid token is still honored so handlers can see who called.
    pub skip_auth: bool,
    /// Replacement caps for this route, `None` keeps the deployment caps.
    pub limits: Option<RouteLimits>,
}

impl RouteRules {
    pub fn public() -> Self {
        RouteRules {
            skip_auth: true,
            limits: None,
        }
    }

    pub fn with_limits(mut self, limits: RouteLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// The admission middleware: rate limiting first, then token validation,
/// revocation lookup and the configured identity bindings. Requests that
/// pass get an [`Identity`] in their extensions.
#[derive(Clone)]
pub struct AdmissionGate {
    limiter: RateLimiter,
    validator: TokenValidator,
    revocations: RevocationList,
    subject: String,
    verify_user_agent: bool,
    verify_ip: bool,
    on_failure: FailurePolicy,
    rules: RouteRules,
}

impl AdmissionGate {
    pub fn new(
        settings: &GateSettings,
        limiter: RateLimiter,
        validator: TokenValidator,
        revocations: RevocationList,
    ) -> Self {
        AdmissionGate {
            limiter,
            validator,
            revocations,
            subject: settings.auth.subject.clone(),
            verify_user_agent: settings.auth.verify_user_agent,
            verify_ip: settings.auth.verify_ip,
            on_failure: settings.store.on_failure,
            rules: RouteRules::default(),
        }
    }

    /// Builds the gate and its components over one store handle.
    pub fn from_settings(settings: &GateSettings, store: CounterStore) -> GateResult<Self> {
        let limiter = RateLimiter::new(
            store.clone(),
            settings.rate_limit.clone(),
            settings.store.on_failure,
        );
        let validator = TokenValidator::new(&settings.auth)?;
        let revocations = RevocationList::new(store);
        Ok(AdmissionGate::new(settings, limiter, validator, revocations))
    }

    /// A copy of this gate with different route rules. Components and
    /// store handles are shared, so all copies enforce against the same
    /// counters.
    pub fn with_rules(&self, rules: RouteRules) -> Self {
        let mut gate = self.clone();
        gate.rules = rules;
        gate
    }

    async fn authenticate(
        &self,
        req: &ServiceRequest,
        client_key: &str,
        token: &str,
    ) -> GateResult<Identity> {
        let claims = self.validator.validate(token, &self.subject)?;

        match self.revocations.is_revoked(&claims.jti).await {
            Ok(false) => {}
            Ok(true) => {
                warn!("Revoked token {} presented by {}", claims.jti, client_key);
                return Err(GateError::TokenRevoked);
            }
            Err(err) if self.on_failure == FailurePolicy::FailOpen => {
                warn!(
                    "Revocation lookup unavailable, accepting token {} unchecked: {}",
                    claims.jti, err
                );
            }
            Err(err) => return Err(err),
        }

        if self.verify_user_agent {
            verify_user_agent(&claims, req.request())?;
        }
        if self.verify_ip {
            verify_ip(&claims, client_key)?;
        }

        Ok(Identity::from_claims(claims))
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdmissionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AdmissionGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdmissionGateService {
            service: Arc::new(service),
            gate: self.clone(),
        })
    }
}

#[derive(Clone)]
pub struct AdmissionGateService<S> {
    service: Arc<S>,
    gate: AdmissionGate,
}

impl<S, B> Service<ServiceRequest> for AdmissionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let gate = self.gate.clone();

        Box::pin(async move {
            // CORS preflights carry no credentials and are never counted.
            if req.method() == Method::OPTIONS {
                return service.call(req).await;
            }

            let path = req.path().to_string();
            let client_key = client_ip(req.request());

            if let Err(err) = gate
                .limiter
                .check(&client_key, gate.rules.limits.as_ref())
                .await
            {
                warn!("Request to {} from {} turned away: {}", path, client_key, err);
                return Err(err.into());
            }

            if gate.rules.skip_auth {
                // Best effort: a valid token still yields an identity, an
                // absent or bad one just leaves the request anonymous.
                if let Some(token) = bearer_token(req.request()) {
                    match gate.authenticate(&req, &client_key, &token).await {
                        Ok(identity) => {
                            req.extensions_mut().insert(identity);
                        }
                        Err(err) => {
                            debug!("Ignoring token on open route {}: {}", path, err);
                        }
                    }
                }
                return service.call(req).await;
            }

            let Some(token) = bearer_token(req.request()) else {
                warn!("No usable bearer token for {} from {}", path, client_key);
                return Err(GateError::TokenInvalid.into());
            };

            match gate.authenticate(&req, &client_key, &token).await {
                Ok(identity) => {
                    debug!("Admitted uid {} to {}", identity.uid, path);
                    req.extensions_mut().insert(identity);
                    service.call(req).await
                }
                Err(err) => {
                    warn!("Rejected token for {} from {}: {}", path, client_key, err);
                    Err(err.into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_rules_require_a_token() {
        let rules = RouteRules::default();
        assert!(!rules.skip_auth);
        assert_eq!(rules.limits, None);
    }

    #[test]
    fn test_public_rules_skip_auth_but_keep_limits_configurable() {
        let rules = RouteRules::public().with_limits(RouteLimits {
            per_second: Some(2),
            ..RouteLimits::default()
        });
        assert!(rules.skip_auth);
        assert_eq!(rules.limits.unwrap().per_second, Some(2));
    }
}
