//! Event envelope and entity-key identity (spec §4.1)
//!
//! Fixes the two wire-level names that thread the entity key through the
//! pipeline: a request header on inbound commands and a CloudEvents-shaped
//! extension on outbound events. The two names are deliberately distinct
//! because the transport differs (NATS message headers vs. an event
//! attribute), but they carry the same value for the same logical entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request header carrying the entity key on inbound command requests
pub const HEADER_ENTITY_KEY: &str = "x-ergonats-entity-key";

/// CloudEvents extension attribute carrying the entity key on events
pub const EXTENSION_ENTITY_KEY: &str = "entitykey";

/// Reply header carrying the error code of a rejected command (§6, §9 Open Question 1)
pub const HEADER_ERROR_CODE: &str = "x-ergonats-error-code";

const EVENT_SOURCE: &str = "cim-aggregate";
const EVENT_DATACONTENTTYPE: &str = "application/json";

/// A CloudEvents-shaped event envelope.
///
/// The runtime never interprets `data` beyond treating it as an embedded
/// JSON blob (spec §9 "Opaque state payload") — it is the user's payload,
/// serialized once by [`EventEnvelope::new`] and otherwise passed through
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event id
    pub id: Uuid,
    /// Constant source identifying this framework
    pub source: String,
    /// User-supplied event type, e.g. `"account_created"`
    #[serde(rename = "type")]
    pub event_type: String,
    /// UTC timestamp stamped at construction time
    pub time: DateTime<Utc>,
    /// Always `"application/json"`
    pub datacontenttype: String,
    /// Opaque user payload
    pub data: serde_json::Value,
    /// The target entity's key, carried as a CloudEvents extension.
    ///
    /// Absent only for programming errors upstream; the apply path treats a
    /// missing extension as a decode failure (spec §4.6 step 2).
    pub entitykey: Option<String>,
}

impl EventEnvelope {
    /// Build a new event for `entity_key` carrying `data` as its payload.
    ///
    /// Allocates a new id, stamps the current UTC time, and serializes
    /// `data` to JSON — the helper described in spec §4.1.
    pub fn new<T: Serialize>(
        event_type: impl Into<String>,
        entity_key: impl Into<String>,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            source: EVENT_SOURCE.to_string(),
            event_type: event_type.into(),
            time: Utc::now(),
            datacontenttype: EVENT_DATACONTENTTYPE.to_string(),
            data: serde_json::to_value(data)?,
            entitykey: Some(entity_key.into()),
        })
    }

    /// Decode an event's `data` field into a concrete user type.
    pub fn data_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}
