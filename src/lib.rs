//! Event-sourced aggregate runtime for the Composable Information Machine
//!
//! This library is the write side of a CQRS/event-sourcing pipeline built on
//! a NATS JetStream broker: a request/reply command service validates
//! commands against a snapshot and emits events onto a durable stream; an
//! independent durable pull consumer applies those same events back onto the
//! snapshot. The two flows are deliberately asymmetric — the command path is
//! synchronous, the apply path runs in the background — and never
//! synchronize beyond both touching the same key-value bucket.
//!
//! # Modules
//!
//! - [`envelope`] - the CloudEvents-shaped event envelope and entity-key identity
//! - [`command`] - the command and reply wire types
//! - [`snapshot`] - the per-aggregate key-value snapshot store
//! - [`stream`] - the durable event stream writer
//! - [`consumer`] - the pull-consumer adapter driving the apply path
//! - [`middleware`] - the ordered command-preprocessor chain
//! - [`subjects`] - subject and name derivation
//! - [`aggregate`] - the runtime composition: [`aggregate::AggregateBehavior`], [`aggregate::Aggregate`]
//! - [`errors`] - error types
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cim_aggregate::aggregate::{Aggregate, AggregateBehavior, AggregateOptions, ApplyOutcome};
//! use cim_aggregate::command::Command;
//! use cim_aggregate::envelope::EventEnvelope;
//! use cim_aggregate::middleware::MiddlewareChain;
//! use cim_aggregate::snapshot::AggregateState;
//! use async_trait::async_trait;
//!
//! struct MyAggregate;
//!
//! #[async_trait]
//! impl AggregateBehavior for MyAggregate {
//!     fn init_aggregate(&self) -> AggregateOptions {
//!         AggregateOptions {
//!             command_subject_prefix: "cmd".to_string(),
//!             event_subject_prefix: "events".to_string(),
//!             stream_name: "MY_EVENTS".to_string(),
//!             accepted_commands: vec!["do_thing".to_string()],
//!             state_store_bucket_name: "my_state".to_string(),
//!             aggregate_name: "MyAggregate".to_string(),
//!             ..Default::default()
//!         }
//!     }
//!
//!     async fn handle_command(&self, _state: &AggregateState, _cmd: &Command) -> Result<Vec<EventEnvelope>, String> {
//!         Ok(vec![])
//!     }
//!
//!     async fn apply_event(&self, state: &AggregateState, _event: &EventEnvelope) -> Result<ApplyOutcome, String> {
//!         Ok(ApplyOutcome::Keep(state.clone()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = async_nats::connect("nats://localhost:4222").await?;
//!     let handle = Aggregate::run(Arc::new(MyAggregate), client).await?;
//!     handle.join().await;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod command;
pub mod consumer;
pub mod envelope;
pub mod errors;
pub mod middleware;
pub mod snapshot;
pub mod stream;
pub mod subjects;

pub use aggregate::{Aggregate, AggregateBehavior, AggregateHandle, AggregateOptions, ApplyOutcome};
pub use command::{Command, CommandReply};
pub use envelope::EventEnvelope;
pub use errors::{AggregateError, AggregateResult};
pub use middleware::{Middleware, MiddlewareChain};
pub use snapshot::{AggregateState, SnapshotStore};
pub use stream::EventStreamWriter;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
