use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::{FailurePolicy, RateLimitConfig};
use crate::error::{GateError, GateResult};
use crate::ratelimit::window::RateWindow;
use crate::store::{CounterStore, KeyExpiry, MarkerState};

/// Per-route replacements for the deployment-wide caps. A `None` field
/// keeps the configured value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteLimits {
    pub per_second: Option<u64>,
    pub per_minute: Option<u64>,
    pub per_hour: Option<u64>,
    pub per_day: Option<u64>,
    pub per_month: Option<u64>,
    pub punish_secs: Option<u64>,
}

/// Multi-window limiter with escalating punishment over the shared store.
///
/// Admission is check-then-commit: every cap is inspected before any
/// counter moves, and a rejected request leaves all counters untouched.
/// The evaluation order is fixed: exclusion list, day quota, month
/// quota, active punishment, then the hour, minute and second windows.
/// Only a breach of the second window installs a punishment marker.
#[derive(Clone)]
pub struct RateLimiter {
    store: CounterStore,
    config: Arc<RateLimitConfig>,
    on_failure: FailurePolicy,
}

/// Caps that actually apply to one request, after route overrides.
struct EffectiveLimits {
    per_second: u64,
    per_minute: u64,
    per_hour: u64,
    per_day: u64,
    per_month: u64,
    punish_secs: u64,
}

impl EffectiveLimits {
    fn resolve(config: &RateLimitConfig, overrides: Option<&RouteLimits>) -> Self {
        let route = overrides.cloned().unwrap_or_default();
        EffectiveLimits {
            per_second: route.per_second.unwrap_or(config.per_second),
            per_minute: route.per_minute.unwrap_or(config.per_minute),
            per_hour: route.per_hour.unwrap_or(config.per_hour),
            per_day: route.per_day.unwrap_or(config.per_day),
            per_month: route.per_month.unwrap_or(config.per_month),
            punish_secs: route.punish_secs.unwrap_or(config.punish_secs),
        }
    }

    fn cap(&self, window: RateWindow) -> u64 {
        match window {
            RateWindow::Second => self.per_second,
            RateWindow::Minute => self.per_minute,
            RateWindow::Hour => self.per_hour,
            RateWindow::Day => self.per_day,
            RateWindow::Month => self.per_month,
        }
    }
}

impl RateLimiter {
    pub fn new(store: CounterStore, config: RateLimitConfig, on_failure: FailurePolicy) -> Self {
        RateLimiter {
            store,
            config: Arc::new(config),
            on_failure,
        }
    }

    /// Admits or rejects one request for `client_key`. On admission every
    /// enabled window counter is incremented exactly once.
    pub async fn check(&self, client_key: &str, overrides: Option<&RouteLimits>) -> GateResult<()> {
        if self.config.exclude.contains(client_key) {
            debug!("Client {} is excluded from rate limiting", client_key);
            return Ok(());
        }

        let outcome = self.enforce(client_key, overrides).await;
        self.absorb_store_failure(outcome, client_key)
    }

    async fn enforce(&self, client_key: &str, overrides: Option<&RouteLimits>) -> GateResult<()> {
        let limits = EffectiveLimits::resolve(&self.config, overrides);

        // Cumulative quotas first: a client over its day or month budget
        // is turned away even while it is also serving a punishment.
        for window in [RateWindow::Day, RateWindow::Month] {
            let cap = limits.cap(window);
            if cap == 0 {
                continue;
            }
            let used = self.store.count(&self.counter_key(window, client_key)).await?;
            if used >= cap as i64 {
                warn!(
                    "Client {} exhausted its {} quota ({} of {})",
                    client_key, window, used, cap
                );
                return Err(GateError::QuotaExceeded(window));
            }
        }

        match self.store.marker_ttl(&self.punish_key(client_key)).await? {
            MarkerState::Absent => {}
            MarkerState::Permanent => {
                warn!("Client {} is permanently blocked", client_key);
                return Err(GateError::ClientPunished(None));
            }
            MarkerState::Expires(remaining) => {
                debug!(
                    "Client {} is punished for another {}ms",
                    client_key,
                    remaining.as_millis()
                );
                return Err(GateError::ClientPunished(Some(remaining)));
            }
        }

        // Rolling windows, widest first so the narrowest cap reports last.
        for window in [RateWindow::Hour, RateWindow::Minute, RateWindow::Second] {
            let cap = limits.cap(window);
            if cap == 0 {
                continue;
            }
            let used = self.store.count(&self.counter_key(window, client_key)).await?;
            if used >= cap as i64 {
                if window == RateWindow::Second && limits.punish_secs > 0 {
                    self.store
                        .set_marker(
                            &self.punish_key(client_key),
                            KeyExpiry::After(Duration::from_secs(limits.punish_secs)),
                        )
                        .await?;
                    warn!(
                        "Client {} breached the per-second cap, punished for {}s",
                        client_key, limits.punish_secs
                    );
                }
                warn!(
                    "Client {} over the {} window ({} of {})",
                    client_key, window, used, cap
                );
                return Err(GateError::QuotaExceeded(window));
            }
        }

        // All caps passed, commit the request to every enabled window.
        let now = Utc::now();
        for window in [
            RateWindow::Second,
            RateWindow::Minute,
            RateWindow::Hour,
            RateWindow::Day,
            RateWindow::Month,
        ] {
            if limits.cap(window) == 0 {
                continue;
            }
            self.store
                .increment(&self.counter_key(window, client_key), window.expiry_at(now))
                .await?;
        }

        Ok(())
    }

    /// Blocks a client out of band. `None` blocks it permanently, until an
    /// explicit [`absolve`](Self::absolve).
    pub async fn punish(&self, client_key: &str, duration: Option<Duration>) -> GateResult<()> {
        let expiry = match duration {
            Some(window) => KeyExpiry::After(window),
            None => KeyExpiry::Never,
        };
        self.store.set_marker(&self.punish_key(client_key), expiry).await?;
        warn!(
            "Client {} blocked by operator ({})",
            client_key,
            match duration {
                Some(window) => format!("{}s", window.as_secs()),
                None => "permanent".to_string(),
            }
        );
        Ok(())
    }

    /// Lifts any punishment, including a permanent one.
    pub async fn absolve(&self, client_key: &str) -> GateResult<()> {
        self.store.remove(&self.punish_key(client_key)).await?;
        debug!("Client {} absolved", client_key);
        Ok(())
    }

    /// Remaining punishment for a client, for operator tooling.
    pub async fn punishment(&self, client_key: &str) -> GateResult<MarkerState> {
        Ok(self.store.marker_ttl(&self.punish_key(client_key)).await?)
    }

    fn absorb_store_failure(&self, outcome: GateResult<()>, client_key: &str) -> GateResult<()> {
        match outcome {
            Err(GateError::StoreUnavailable(reason))
                if self.on_failure == FailurePolicy::FailOpen =>
            {
                warn!(
                    "Counter store unavailable, admitting {} without quota enforcement: {}",
                    client_key, reason
                );
                Ok(())
            }
            other => other,
        }
    }

    fn counter_key(&self, window: RateWindow, client_key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:rate:{}:{}", prefix, window.key_segment(), client_key),
            None => format!("rate:{}:{}", window.key_segment(), client_key),
        }
    }

    fn punish_key(&self, client_key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:rate:punish:{}", prefix, client_key),
            None => format!("rate:punish:{}", client_key),
        }
    }
}
