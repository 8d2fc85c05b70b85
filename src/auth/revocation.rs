use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::error::GateResult;
use crate::store::{CounterStore, KeyExpiry};

/// Out-of-band token blocking over the shared store.
///
/// A revocation is a marker keyed on the token id whose lifetime equals
/// the time the token has left. Once the token would have expired anyway
/// the marker evaporates, so the revocation set stays bounded by the
/// number of live tokens.
#[derive(Clone)]
pub struct RevocationList {
    store: CounterStore,
}

impl RevocationList {
    pub fn new(store: CounterStore) -> Self {
        RevocationList { store }
    }

    fn key(token_id: &str) -> String {
        format!("revoke:{}", token_id)
    }

    /// Blocks a token until `expires_at`. Revoking an already expired
    /// token is a no-op: validation rejects it regardless, and writing a
    /// marker would only leak store space.
    pub async fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) -> GateResult<()> {
        let remaining = expires_at - Utc::now();
        let ttl = match remaining.to_std() {
            Ok(ttl) if !ttl.is_zero() => ttl,
            _ => {
                debug!("Token {} is already expired, nothing to revoke", token_id);
                return Ok(());
            }
        };

        self.store
            .set_marker(&Self::key(token_id), KeyExpiry::After(ttl))
            .await?;
        warn!("Revoked token {} for its remaining {}s", token_id, ttl.as_secs());
        Ok(())
    }

    pub async fn is_revoked(&self, token_id: &str) -> GateResult<bool> {
        Ok(self.store.exists(&Self::key(token_id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MarkerState;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_revoked_token_is_reported_revoked() {
        let store = CounterStore::memory();
        let revocations = RevocationList::new(store);

        assert!(!revocations.is_revoked("t-1").await.unwrap());

        revocations
            .revoke("t-1", Utc::now() + Duration::minutes(5))
            .await
            .unwrap();

        assert!(revocations.is_revoked("t-1").await.unwrap());
        assert!(!revocations.is_revoked("t-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_never_outlives_the_token() {
        let store = CounterStore::memory();
        let revocations = RevocationList::new(store.clone());

        revocations
            .revoke("t-9", Utc::now() + Duration::seconds(45))
            .await
            .unwrap();

        match store.marker_ttl(&RevocationList::key("t-9")).await.unwrap() {
            MarkerState::Expires(left) => {
                assert!(left <= StdDuration::from_secs(45));
                assert!(left > StdDuration::from_secs(40));
            }
            other => panic!("expected a bounded revocation marker, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_revoking_an_expired_token_writes_nothing() {
        let store = CounterStore::memory();
        let revocations = RevocationList::new(store.clone());

        revocations
            .revoke("t-old", Utc::now() - Duration::seconds(30))
            .await
            .unwrap();

        assert!(!revocations.is_revoked("t-old").await.unwrap());
        assert_eq!(
            store.marker_ttl(&RevocationList::key("t-old")).await.unwrap(),
            MarkerState::Absent
        );
    }

    #[tokio::test]
    async fn test_shared_handles_observe_each_others_writes() {
        let store = CounterStore::memory();
        let writer = RevocationList::new(store.clone());
        let reader = RevocationList::new(store);

        writer
            .revoke("t-shared", Utc::now() + Duration::minutes(1))
            .await
            .unwrap();

        assert!(reader.is_revoked("t-shared").await.unwrap());
    }
}
