//! Command and reply types (spec §3, §6)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Error code returned to the caller for bad-request style rejections
/// (missing entity key, command rejected by `handle_command`).
pub const ERROR_CODE_BAD_REQUEST: &str = "400";

/// Error code returned to the caller for infrastructure/middleware failures
/// (state load failure, middleware rejection, event write failure).
pub const ERROR_CODE_INTERNAL: &str = "500";

/// A request to mutate an aggregate, built from an inbound broker request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// One of the aggregate's declared accepted command types
    #[serde(rename = "type")]
    pub command_type: String,
    /// Opaque request payload
    pub data: serde_json::Value,
    /// Flattened request headers, including the entity-key header.
    ///
    /// First value wins when a header repeats.
    pub metadata: HashMap<String, String>,
}

impl Command {
    /// Look up a metadata value by header name.
    pub fn metadata_get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// The reply body for every command request, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    /// Whether the command was accepted
    pub accepted: bool,
    /// Human-readable outcome message
    pub message: String,
}

impl CommandReply {
    /// Build the fixed success reply (spec §4.5 step 7).
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            message: "Command accepted".to_string(),
        }
    }

    /// Build a rejection reply carrying `message`.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}
