// Copyright (c) 2025 - Cowboy AI, Inc.

//! Subject and name derivation for the aggregate runtime (spec §4.3, §6)
//!
//! Every name the runtime hands to the broker — command subjects, event
//! subjects, the service name, the queue group, the durable consumer name —
//! is derived deterministically from [`crate::AggregateOptions`]. Centralizing
//! the derivation here keeps the command path and the stream writer from
//! drifting apart on how a subject is built.

/// Replace every `.` in `s` with `_`.
///
/// The broker treats `.` as a subject token separator, so an entity key
/// containing dots would otherwise fracture the subject tree (spec §4.3).
pub fn sanitize(s: &str) -> String {
    s.replace('.', "_")
}

/// Build the request subject for one command type: `<prefix>.<cmd_type>`.
pub fn command_subject(command_subject_prefix: &str, cmd_type: &str) -> String {
    format!("{command_subject_prefix}.{cmd_type}")
}

/// Build the publish subject for one event.
///
/// `<prefix>.<sanitized entitykey>.<event_type>`, or `<prefix>.<event_type>`
/// when the entity key extension is absent.
pub fn event_subject(event_subject_prefix: &str, entity_key: Option<&str>, event_type: &str) -> String {
    match entity_key {
        Some(key) => format!("{event_subject_prefix}.{}.{event_type}", sanitize(key)),
        None => format!("{event_subject_prefix}.{event_type}"),
    }
}

/// Build the stream's catch-all subject filter: `<prefix>.>`.
pub fn stream_subject_filter(event_subject_prefix: &str) -> String {
    format!("{event_subject_prefix}.>")
}

/// Request/reply service name: `aggregate-<AggregateName>`.
pub fn service_name(aggregate_name: &str) -> String {
    format!("aggregate-{aggregate_name}")
}

/// Queue group name: the aggregate name itself, used verbatim so replicas
/// form a single queue group (spec §4.5 step 3).
pub fn queue_group(aggregate_name: &str) -> String {
    aggregate_name.to_string()
}

/// Durable pull consumer name: `AGG_<AggregateName>`.
pub fn consumer_name(aggregate_name: &str) -> String {
    format!("AGG_{aggregate_name}")
}
