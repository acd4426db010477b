//! Snapshot store: the per-aggregate key-value bucket (spec §4.2)

use std::time::Duration;

use async_nats::jetstream::{
    kv::{Config as KvConfig, Store as KvStore},
    Context as JsContext,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{AggregateError, AggregateResult};

/// Broker interactions are bounded by this deadline (spec §4.2, §5).
const KV_TIMEOUT: Duration = Duration::from_secs(1);

/// The materialized snapshot for one entity key (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    /// Opaque entity identity
    pub key: String,
    /// Monotonically increasing; 0 iff no snapshot has ever been written
    pub version: u64,
    /// Opaque user payload; `None` for the zero-value (never-stored) state
    pub data: Option<serde_json::Value>,
}

impl AggregateState {
    /// The zero-value snapshot returned for a key that has never been stored
    /// (spec §3 invariant: `version == 0 iff no snapshot has ever been written`).
    pub fn absent(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version: 0,
            data: None,
        }
    }
}

/// Wraps one JetStream key-value bucket holding snapshots for one aggregate.
pub struct SnapshotStore {
    bucket_name: String,
    kv: KvStore,
}

impl SnapshotStore {
    /// Get-or-create the bucket named `bucket_name`, describing it with
    /// `aggregate_name` and applying the configured byte limits.
    ///
    /// Sentinel `0` for either limit means unlimited, represented to the
    /// broker as `-1` (spec §4.2).
    pub async fn connect(
        js: &JsContext,
        bucket_name: &str,
        aggregate_name: &str,
        max_value_size: i32,
        max_bytes: i64,
    ) -> AggregateResult<Self> {
        let kv = match js.get_key_value(bucket_name).await {
            Ok(kv) => kv,
            Err(_) => {
                debug!(bucket = bucket_name, "snapshot bucket missing, creating");
                let config = KvConfig {
                    bucket: bucket_name.to_string(),
                    description: format!("Snapshot state for aggregate {aggregate_name}"),
                    max_value_size: unlimited_sentinel(max_value_size as i64) as i32,
                    max_bytes: unlimited_sentinel(max_bytes),
                    ..Default::default()
                };
                match js.create_key_value(config).await {
                    Ok(kv) => kv,
                    // Tolerate the bucket-already-exists race (spec §9).
                    Err(_) => js.get_key_value(bucket_name).await.map_err(|e| {
                        AggregateError::KvStore(format!("bucket {bucket_name} unavailable: {e}"))
                    })?,
                }
            }
        };

        Ok(Self {
            bucket_name: bucket_name.to_string(),
            kv,
        })
    }

    /// `LoadState(key)` — spec §4.2.
    ///
    /// A missing key synthesizes `{key, version:0, data:None}` rather than
    /// erroring; any other broker error propagates.
    pub async fn load(&self, key: &str) -> AggregateResult<AggregateState> {
        let entry = tokio::time::timeout(KV_TIMEOUT, self.kv.get(key))
            .await?
            .map_err(|e| AggregateError::KvStore(format!("load {key}: {e}")))?;

        match entry {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AggregateError::Deserialization(format!("state for {key}: {e}"))),
            None => Ok(AggregateState::absent(key)),
        }
    }

    /// `StoreState(key, s)` — spec §4.2.
    ///
    /// Always increments `version`, even for a logically-identical write;
    /// the stored version counts successful applies, not distinct states.
    pub async fn store(&self, key: &str, state: &AggregateState) -> AggregateResult<AggregateState> {
        let next = AggregateState {
            key: key.to_string(),
            version: state.version + 1,
            data: state.data.clone(),
        };
        let payload = serde_json::to_vec(&next)?;

        tokio::time::timeout(KV_TIMEOUT, self.kv.put(key, payload.into()))
            .await?
            .map_err(|e| AggregateError::KvStore(format!("store {key}: {e}")))?;

        Ok(next)
    }

    /// `DeleteState(key)` — spec §4.2. Deletes the key, then purges tombstones
    /// so the key does not remain visible on a list operation.
    pub async fn delete(&self, key: &str) -> AggregateResult<()> {
        tokio::time::timeout(KV_TIMEOUT, self.kv.delete(key))
            .await?
            .map_err(|e| AggregateError::KvStore(format!("delete {key}: {e}")))?;

        if let Err(e) = tokio::time::timeout(KV_TIMEOUT, self.kv.purge(key)).await {
            warn!(bucket = %self.bucket_name, key, "purge timed out after delete: {e}");
        }

        Ok(())
    }
}

/// Map a configured `StateStoreMaxValueSize`/`StateStoreMaxBytes` value to
/// the `jetstream::kv::Config` representation: `0` (unlimited, per spec
/// §4.2) becomes `-1`, everything else passes through. Used by `connect`
/// when it has to create the bucket; also exposed standalone for tests.
pub fn unlimited_sentinel(configured: i64) -> i64 {
    if configured == 0 {
        -1
    } else {
        configured
    }
}
