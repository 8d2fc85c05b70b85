use crate::error::GateError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateSettings {
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub store: StoreConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub keys: TokenKeys,
    /// Subject every issued token carries and every presented token must
    /// match.
    pub subject: String,
    /// Reject tokens presented with a different user agent than the one
    /// they were issued to.
    pub verify_user_agent: bool,
    /// Reject tokens presented from a different IP than the one they were
    /// issued to.
    pub verify_ip: bool,
}

/// Key material for the configured signing algorithm.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TokenKeys {
    Hs256 {
        secret: String,
    },
    /// Issuance needs the private key, validation the public one. A
    /// process doing only one of the two can omit the other half.
    Es256 {
        private_key_pem: Option<String>,
        public_key_pem: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per rolling second, 0 disables the window
    pub per_second: u64,
    /// Requests allowed per rolling minute, 0 disables the window
    pub per_minute: u64,
    /// Requests allowed per rolling hour, 0 disables the window
    pub per_hour: u64,
    /// Requests allowed per calendar day (UTC), 0 disables the quota
    pub per_day: u64,
    /// Requests allowed per calendar month (UTC), 0 disables the quota
    pub per_month: u64,
    /// Punishment handed out on a per-second breach, 0 disables punishment
    pub punish_secs: u64,
    /// Client keys never counted or limited
    pub exclude: HashSet<String>,
    /// Optional namespace prepended to every store key, for sharing one
    /// Redis between deployments
    pub key_prefix: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            per_second: 5,
            per_minute: 10,
            per_hour: 100,
            per_day: 1000,
            per_month: 1000,
            punish_secs: 10,
            exclude: HashSet::new(),
            key_prefix: None,
        }
    }
}

/// What the gate does when the shared store cannot be reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Reject with 503 until the store is back. The safe default.
    #[default]
    FailClosed,
    /// Admit without counting and without revocation checks.
    FailOpen,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL. When absent the gate runs on in-process
    /// counters, which only makes sense for a single instance.
    pub redis_url: Option<String>,
    pub on_failure: FailurePolicy,
}

impl GateSettings {
    pub fn from_env() -> Result<Self, GateError> {
        // Signing keys
        let algo = env::var("GATE_TOKEN_ALGO").unwrap_or_else(|_| "HS256".to_string());
        let keys = match algo.as_str() {
            "HS256" => {
                let secret = env::var("GATE_TOKEN_SECRET").map_err(|_| {
                    GateError::Configuration("GATE_TOKEN_SECRET must be set for HS256".to_string())
                })?;
                TokenKeys::Hs256 { secret }
            }
            "ES256" => {
                let private_key_pem = env::var("GATE_TOKEN_PRIVATE_KEY_PEM").ok();
                let public_key_pem = env::var("GATE_TOKEN_PUBLIC_KEY_PEM").ok();
                if private_key_pem.is_none() && public_key_pem.is_none() {
                    return Err(GateError::Configuration(
                        "GATE_TOKEN_PRIVATE_KEY_PEM or GATE_TOKEN_PUBLIC_KEY_PEM must be set for ES256"
                            .to_string(),
                    ));
                }
                TokenKeys::Es256 {
                    private_key_pem,
                    public_key_pem,
                }
            }
            other => {
                return Err(GateError::Configuration(format!(
                    "unsupported token algorithm: {}",
                    other
                )));
            }
        };

        let subject = env::var("GATE_TOKEN_SUBJECT").map_err(|_| {
            GateError::Configuration("GATE_TOKEN_SUBJECT must be set".to_string())
        })?;

        let verify_user_agent = env::var("GATE_VERIFY_USER_AGENT")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        let verify_ip = env::var("GATE_VERIFY_IP")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        // Rate limiting
        let defaults = RateLimitConfig::default();

        let per_second = env::var("GATE_LIMIT_PER_SECOND")
            .unwrap_or_else(|_| defaults.per_second.to_string())
            .parse::<u64>()
            .map_err(|_| {
                GateError::Configuration("GATE_LIMIT_PER_SECOND must be a valid number".to_string())
            })?;

        let per_minute = env::var("GATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| defaults.per_minute.to_string())
            .parse::<u64>()
            .map_err(|_| {
                GateError::Configuration("GATE_LIMIT_PER_MINUTE must be a valid number".to_string())
            })?;

        let per_hour = env::var("GATE_LIMIT_PER_HOUR")
            .unwrap_or_else(|_| defaults.per_hour.to_string())
            .parse::<u64>()
            .map_err(|_| {
                GateError::Configuration("GATE_LIMIT_PER_HOUR must be a valid number".to_string())
            })?;

        let per_day = env::var("GATE_LIMIT_PER_DAY")
            .unwrap_or_else(|_| defaults.per_day.to_string())
            .parse::<u64>()
            .map_err(|_| {
                GateError::Configuration("GATE_LIMIT_PER_DAY must be a valid number".to_string())
            })?;

        let per_month = env::var("GATE_LIMIT_PER_MONTH")
            .unwrap_or_else(|_| defaults.per_month.to_string())
            .parse::<u64>()
            .map_err(|_| {
                GateError::Configuration("GATE_LIMIT_PER_MONTH must be a valid number".to_string())
            })?;

        let punish_secs = env::var("GATE_PUNISH_SECS")
            .unwrap_or_else(|_| defaults.punish_secs.to_string())
            .parse::<u64>()
            .map_err(|_| {
                GateError::Configuration("GATE_PUNISH_SECS must be a valid number".to_string())
            })?;

        let exclude = env::var("GATE_LIMIT_EXCLUDE")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let key_prefix = env::var("GATE_KEY_PREFIX").ok().filter(|p| !p.is_empty());

        // Shared store
        let redis_url = env::var("GATE_REDIS_URL").ok().filter(|u| !u.is_empty());

        let on_failure = if env::var("GATE_FAIL_OPEN")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true"
        {
            FailurePolicy::FailOpen
        } else {
            FailurePolicy::FailClosed
        };

        Ok(GateSettings {
            auth: AuthConfig {
                keys,
                subject,
                verify_user_agent,
                verify_ip,
            },
            rate_limit: RateLimitConfig {
                per_second,
                per_minute,
                per_hour,
                per_day,
                per_month,
                punish_secs,
                exclude,
                key_prefix,
            },
            store: StoreConfig {
                redis_url,
                on_failure,
            },
        })
    }
}
