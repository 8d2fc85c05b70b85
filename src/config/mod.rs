pub mod settings;

pub use settings::{AuthConfig, FailurePolicy, GateSettings, RateLimitConfig, StoreConfig, TokenKeys};
