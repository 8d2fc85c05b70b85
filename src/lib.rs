//! Request admission for actix-web services.
//!
//! One middleware combines two decisions per request: a multi-window
//! rate limit keyed on the client address, and bearer token validation
//! with out-of-band revocation. Both lean on the same shared counter
//! store, Redis in production or an in-process map for single instances
//! and tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod ratelimit;
pub mod security;
pub mod store;

// Re-export commonly used types for convenience
pub use auth::{IssueRequest, IssuedToken, RevocationList, TokenIssuer, TokenValidator};
pub use config::{AuthConfig, FailurePolicy, GateSettings, RateLimitConfig, StoreConfig, TokenKeys};
pub use error::{GateError, GateResult};
pub use middleware::{AdmissionGate, RouteRules};
pub use models::{AccessClaims, Fingerprint, Identity};
pub use ratelimit::{RateLimiter, RateWindow, RouteLimits};
pub use store::{CounterStore, KeyExpiry, MarkerState, MemoryStore, StoreError};
