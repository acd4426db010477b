//! Event stream writer: publishes a command's events to the durable log
//! (spec §4.3)

use async_nats::jetstream::{
    stream::{Config as StreamConfig, Stream},
    Context as JsContext,
};
use tracing::debug;

use crate::envelope::EventEnvelope;
use crate::errors::{AggregateError, AggregateResult};
use crate::subjects::{event_subject, stream_subject_filter};

/// Publishes events produced by one command onto the durable stream
/// `StreamName`, under `EventSubjectPrefix`.
pub struct EventStreamWriter {
    event_subject_prefix: String,
    stream: Stream,
    js: JsContext,
}

impl EventStreamWriter {
    /// Idempotently ensure the stream exists (creating it with
    /// `Subjects = [EventSubjectPrefix + ".>"]` if missing), then return a
    /// writer bound to it.
    pub async fn connect(
        js: &JsContext,
        stream_name: &str,
        event_subject_prefix: &str,
    ) -> AggregateResult<Self> {
        let config = StreamConfig {
            name: stream_name.to_string(),
            subjects: vec![stream_subject_filter(event_subject_prefix)],
            ..Default::default()
        };

        let stream = js
            .get_or_create_stream(config)
            .await
            .map_err(|e| AggregateError::Stream(format!("stream {stream_name}: {e}")))?;

        Ok(Self {
            event_subject_prefix: event_subject_prefix.to_string(),
            stream,
            js: js.clone(),
        })
    }

    /// Publish `events` in order. The first publish failure aborts the
    /// batch and is returned to the caller; events already published are
    /// not rolled back (spec §4.3 "all-or-prefix").
    pub async fn write(&self, events: &[EventEnvelope]) -> AggregateResult<()> {
        for event in events {
            let subject = event_subject(
                &self.event_subject_prefix,
                event.entitykey.as_deref(),
                &event.event_type,
            );
            let payload = serde_json::to_vec(event)?;

            debug!(subject = %subject, event_id = %event.id, "publishing event");

            self.js
                .publish(subject.clone(), payload.into())
                .await
                .map_err(|e| AggregateError::NatsPublish(format!("{subject}: {e}")))?
                .await
                .map_err(|e| AggregateError::NatsPublish(format!("{subject} ack: {e}")))?;
        }

        Ok(())
    }

    /// The underlying stream handle, exposed for the pull consumer adapter
    /// to build its consumer against.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }
}
