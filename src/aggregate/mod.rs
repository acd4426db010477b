// Copyright (c) 2025 - Cowboy AI, Inc.

//! The aggregate runtime: composition of the command path and the apply
//! path (spec §4.5, §4.6, §4.8).
//!
//! An [`AggregateBehavior`] supplies the three user callbacks
//! (`init_aggregate`, `handle_command`, `apply_event`); [`Aggregate::run`]
//! wires them to a live broker connection: one request/reply service per
//! accepted command type, and one durable pull consumer applying events to
//! the snapshot store in the background. `handle_command` only reads state;
//! `apply_event` is the only writer — this separation is the central design
//! decision of the runtime, not an accident of scheduling.

use std::collections::HashMap;
use std::sync::Arc;

use async_nats::{HeaderMap, HeaderValue};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandReply, ERROR_CODE_BAD_REQUEST, ERROR_CODE_INTERNAL};
use crate::consumer::{EventApplier, PullConsumerAdapter};
use crate::envelope::{EventEnvelope, HEADER_ENTITY_KEY, HEADER_ERROR_CODE};
use crate::errors::{AggregateError, AggregateResult};
use crate::middleware::MiddlewareChain;
use crate::snapshot::{AggregateState, SnapshotStore};
use crate::stream::EventStreamWriter;
use crate::subjects::{command_subject, consumer_name, queue_group, service_name, stream_subject_filter};

/// The outcome of applying one event to existing state (spec §9: a sum type
/// replacing the source's overloaded-null "delete" convention).
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The entity persists with this next state.
    Keep(AggregateState),
    /// The entity is destroyed; the snapshot is deleted.
    Delete,
}

/// The three callbacks an aggregate author must supply (spec §6).
#[async_trait]
pub trait AggregateBehavior: Send + Sync {
    /// Produce this aggregate's configuration. Called once at startup.
    fn init_aggregate(&self) -> AggregateOptions;

    /// Validate `cmd` against `state` and produce zero or more events.
    /// An empty slice is a successful no-op. An `Err` rejects the command
    /// (surfaced to the caller as `"Command rejected: {err}"`, code `400`).
    async fn handle_command(
        &self,
        state: &AggregateState,
        cmd: &Command,
    ) -> Result<Vec<EventEnvelope>, String>;

    /// Fold one event onto `state`, producing the next snapshot or
    /// signalling deletion.
    async fn apply_event(
        &self,
        state: &AggregateState,
        event: &EventEnvelope,
    ) -> Result<ApplyOutcome, String>;
}

/// Configuration for one aggregate instance (spec §6).
#[derive(Clone)]
pub struct AggregateOptions {
    /// Broker domain for streams/KV; `""` means the broker's default domain.
    pub js_domain: String,
    /// Reported service version; defaults to `"0.0.1"` if left empty.
    pub service_version: String,
    /// Dotted subject prefix under which command endpoints are mounted.
    pub command_subject_prefix: String,
    /// Dotted subject prefix under which events are published.
    pub event_subject_prefix: String,
    /// Durable event stream name.
    pub stream_name: String,
    /// Command type strings exposed as request/reply endpoints.
    pub accepted_commands: Vec<String>,
    /// KV bucket name for snapshots.
    pub state_store_bucket_name: String,
    /// Per-value byte cap; `0` means unlimited.
    pub state_store_max_value_size: i32,
    /// Total bucket byte cap; `0` means unlimited.
    pub state_store_max_bytes: i64,
    /// Identity used in the service name, queue group, and consumer name.
    pub aggregate_name: String,
    /// Ordered command preprocessor chain.
    pub middleware: MiddlewareChain,
    /// Redelivery cap for the pull consumer (spec §9: a tunable, not a
    /// hardcoded constant; the spec's historical default is `2`).
    pub max_deliver: i64,
}

impl Default for AggregateOptions {
    /// Sane defaults for every option spec §4.5 step 2 fills in when left
    /// empty, plus the zero-value for the options that are inherently
    /// per-aggregate identity (subject prefixes, stream/bucket/aggregate
    /// names, accepted commands) and have no meaningful global default —
    /// callers building an aggregate must still set those explicitly.
    fn default() -> Self {
        Self {
            js_domain: String::new(),
            service_version: "0.0.1".to_string(),
            command_subject_prefix: String::new(),
            event_subject_prefix: String::new(),
            stream_name: String::new(),
            accepted_commands: Vec::new(),
            state_store_bucket_name: String::new(),
            state_store_max_value_size: 0,
            state_store_max_bytes: 0,
            aggregate_name: String::new(),
            middleware: MiddlewareChain::default(),
            max_deliver: 2,
        }
    }
}

impl AggregateOptions {
    /// Apply the default-filling described in spec §4.5 step 2.
    fn normalize(mut self) -> Self {
        if self.service_version.trim().is_empty() {
            self.service_version = "0.0.1".to_string();
        }
        if self.max_deliver <= 0 {
            self.max_deliver = 2;
        }
        self
    }
}

/// Owns the background tasks spawned by [`Aggregate::run`]: one per
/// accepted command's subscriber loop, plus the pull-consumer task.
pub struct AggregateHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl AggregateHandle {
    /// Abort every background task. Used in tests to tear down cleanly.
    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }

    /// Await every background task to completion (they normally run
    /// forever; this is mostly useful after `abort`).
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Entry point: wires one [`AggregateBehavior`] to a live broker connection.
pub struct Aggregate;

impl Aggregate {
    /// Perform the five init steps of spec §4.5 and start both the command
    /// path and the apply path.
    pub async fn run<B>(behavior: Arc<B>, client: async_nats::Client) -> AggregateResult<AggregateHandle>
    where
        B: AggregateBehavior + 'static,
    {
        let options = behavior.init_aggregate().normalize();
        info!(
            aggregate = %options.aggregate_name,
            version = %options.service_version,
            "initializing aggregate"
        );

        let js = if options.js_domain.trim().is_empty() {
            async_nats::jetstream::new(client.clone())
        } else {
            async_nats::jetstream::with_domain(client.clone(), options.js_domain.clone())
        };

        let snapshot_store = Arc::new(
            SnapshotStore::connect(
                &js,
                &options.state_store_bucket_name,
                &options.aggregate_name,
                options.state_store_max_value_size,
                options.state_store_max_bytes,
            )
            .await?,
        );

        let stream_writer = Arc::new(
            EventStreamWriter::connect(&js, &options.stream_name, &options.event_subject_prefix).await?,
        );

        let mut tasks = Vec::new();

        // Command path: one queue-grouped subscriber per accepted command
        // type (spec §4.5 steps 3-4).
        let queue = queue_group(&options.aggregate_name);
        info!(service = %service_name(&options.aggregate_name), %queue, "registering command service");

        for cmd_type in &options.accepted_commands {
            let subject = command_subject(&options.command_subject_prefix, cmd_type);
            let subscriber = client
                .queue_subscribe(subject.clone(), queue.clone())
                .await
                .map_err(|e| AggregateError::NatsSubscribe(format!("{subject}: {e}")))?;

            let handler = CommandHandler {
                behavior: behavior.clone(),
                snapshot_store: snapshot_store.clone(),
                stream_writer: stream_writer.clone(),
                middleware: options.middleware.clone(),
                client: client.clone(),
                command_type: cmd_type.clone(),
            };

            tasks.push(tokio::spawn(handler.run(subscriber)));
        }

        // Apply path: a single durable pull consumer for the whole stream
        // (spec §4.4, §4.6).
        let applier: Arc<dyn EventApplier> = Arc::new(ApplyPathApplier {
            behavior: behavior.clone(),
            snapshot_store: snapshot_store.clone(),
        });

        let consumer_name = consumer_name(&options.aggregate_name);
        let filter_subject = stream_subject_filter(&options.event_subject_prefix);
        let consumer_task = PullConsumerAdapter::spawn(
            stream_writer.stream(),
            &consumer_name,
            &filter_subject,
            options.max_deliver,
            applier,
        )
        .await?;
        tasks.push(consumer_task);

        Ok(AggregateHandle { tasks })
    }
}

/// The per-command-type request/reply loop (spec §4.5's per-request
/// handler).
struct CommandHandler<B> {
    behavior: Arc<B>,
    snapshot_store: Arc<SnapshotStore>,
    stream_writer: Arc<EventStreamWriter>,
    middleware: MiddlewareChain,
    client: async_nats::Client,
    command_type: String,
}

impl<B: AggregateBehavior + 'static> CommandHandler<B> {
    async fn run(self, mut subscriber: async_nats::Subscriber) {
        while let Some(msg) = subscriber.next().await {
            let Some(reply_subject) = msg.reply.clone() else {
                warn!(command = %self.command_type, "command request had no reply subject, dropping");
                continue;
            };

            let (reply, error_code) = self.handle(&msg).await;

            let mut headers = HeaderMap::new();
            if let Some(code) = error_code {
                headers.insert(HEADER_ERROR_CODE, HeaderValue::from(code));
            }

            let payload = match serde_json::to_vec(&reply) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("failed to encode command reply: {e}");
                    continue;
                }
            };

            if let Err(e) = self
                .client
                .publish_with_headers(reply_subject, headers, payload.into())
                .await
            {
                error!(command = %self.command_type, "failed to send command reply: {e}");
            }
        }
    }

    /// The seven-step handler of spec §4.5. Returns the reply to send plus
    /// an optional error code header value.
    async fn handle(&self, msg: &async_nats::Message) -> (CommandReply, Option<&'static str>) {
        // Step 1: extract entity key.
        let entity_key = msg
            .headers
            .as_ref()
            .and_then(|h| h.get(HEADER_ENTITY_KEY))
            .map(|v| v.to_string())
            .unwrap_or_default();

        if entity_key.trim().is_empty() {
            return (
                CommandReply::rejected("No entity key supplied"),
                Some(ERROR_CODE_BAD_REQUEST),
            );
        }

        // Step 2: build the Command from flattened headers (first value wins).
        let mut metadata = HashMap::new();
        if let Some(headers) = &msg.headers {
            for (name, values) in headers.iter() {
                if let Some(first) = values.iter().next() {
                    metadata.insert(name.to_string(), first.to_string());
                }
            }
        }

        let data: serde_json::Value = match serde_json::from_slice(&msg.payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(%entity_key, command = %self.command_type, "command payload is not valid JSON, treating data as null: {e}");
                serde_json::Value::Null
            }
        };

        let mut cmd = Command {
            command_type: self.command_type.clone(),
            data,
            metadata,
        };

        // Step 3: load existing state.
        let existing_state = match self.snapshot_store.load(&entity_key).await {
            Ok(state) => state,
            Err(e) => {
                warn!(%entity_key, "failed to load aggregate state: {e}");
                return (
                    CommandReply::rejected("Failed to load aggregate state"),
                    Some(ERROR_CODE_INTERNAL),
                );
            }
        };

        // Step 4: middleware chain.
        if let Err(e) = self.middleware.run(&existing_state, &mut cmd).await {
            return (CommandReply::rejected(e.to_string()), Some(ERROR_CODE_INTERNAL));
        }

        // Step 5: user command handler.
        let events = match self.behavior.handle_command(&existing_state, &cmd).await {
            Ok(events) => events,
            Err(e) => {
                return (
                    CommandReply::rejected(format!("Command rejected: {e}")),
                    Some(ERROR_CODE_BAD_REQUEST),
                );
            }
        };

        // Step 6: write events. Unlike the historical source, this handler
        // returns immediately on failure instead of falling through to the
        // success reply (spec §9, the fixed bug).
        if let Err(e) = self.stream_writer.write(&events).await {
            error!(%entity_key, "event write failure: {e}");
            return (CommandReply::rejected("Event write failure"), Some(ERROR_CODE_INTERNAL));
        }

        // Step 7.
        debug!(%entity_key, command = %self.command_type, event_count = events.len(), "command accepted");
        (CommandReply::accepted(), None)
    }
}

/// Wires the user's `apply_event` to the snapshot store, implementing the
/// rest of the apply path (spec §4.6 steps 2-4) behind the consumer
/// adapter's generic `EventApplier` callback.
struct ApplyPathApplier<B> {
    behavior: Arc<B>,
    snapshot_store: Arc<SnapshotStore>,
}

#[async_trait]
impl<B: AggregateBehavior + 'static> EventApplier for ApplyPathApplier<B> {
    async fn apply(&self, envelope: EventEnvelope) -> AggregateResult<()> {
        // Step 2: a missing entitykey extension is a producer bug, treated
        // like a decode failure.
        let entity_key = envelope
            .entitykey
            .clone()
            .ok_or_else(|| AggregateError::ApplyFailed("event missing entitykey extension".to_string()))?;

        // Step 3.
        let existing = self.snapshot_store.load(&entity_key).await?;

        // Step 4.
        let outcome = self
            .behavior
            .apply_event(&existing, &envelope)
            .await
            .map_err(AggregateError::ApplyFailed)?;

        match outcome {
            ApplyOutcome::Keep(next) => {
                self.snapshot_store.store(&entity_key, &next).await?;
            }
            ApplyOutcome::Delete => {
                self.snapshot_store.delete(&entity_key).await?;
            }
        }

        Ok(())
    }
}
