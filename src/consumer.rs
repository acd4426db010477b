//! Pull consumer adapter: the background event-apply loop (spec §4.4, §4.6)

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::envelope::EventEnvelope;
use crate::errors::{AggregateError, AggregateResult};

/// Invoked once per decoded event by the pull consumer's background task.
///
/// Implementors perform the rest of the apply path (spec §4.6 steps 2-4:
/// load existing state, call the user's `apply_event`, then store or delete
/// the snapshot). Returning `Err` causes the message to be negatively
/// acknowledged; `Ok` acks it.
#[async_trait]
pub trait EventApplier: Send + Sync {
    /// Apply one decoded event, returning whether it should be acked.
    async fn apply(&self, envelope: EventEnvelope) -> AggregateResult<()>;
}

/// Adapts a durable JetStream pull consumer to an [`EventApplier`] callback.
pub struct PullConsumerAdapter;

impl PullConsumerAdapter {
    /// Create or update the durable pull consumer `consumer_name` on
    /// `stream`, filtered to `filter_subject`, with the given `max_deliver`
    /// (spec §4.4: `AGG_<AggregateName>`, `MaxDeliver = 2` by default, but
    /// exposed as a tunable per §9's third open question).
    ///
    /// Spawns a background task that continuously fetches messages and
    /// hands each to `applier`. The returned handle lets the runtime own
    /// the task's lifetime.
    pub async fn spawn(
        stream: &Stream,
        consumer_name: &str,
        filter_subject: &str,
        max_deliver: i64,
        applier: std::sync::Arc<dyn EventApplier>,
    ) -> AggregateResult<JoinHandle<()>> {
        let consumer: PullConsumer = stream
            .get_or_create_consumer(
                consumer_name,
                jetstream::consumer::pull::Config {
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: filter_subject.to_string(),
                    max_deliver,
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AggregateError::Stream(format!("consumer {consumer_name}: {e}")))?;

        let handle = tokio::spawn(async move {
            loop {
                let messages = match consumer.messages().await {
                    Ok(messages) => messages,
                    Err(e) => {
                        error!("failed to start consuming from {consumer_name}: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        continue;
                    }
                };

                tokio::pin!(messages);

                while let Some(message) = messages.next().await {
                    let msg = match message {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!("error receiving message on {consumer_name}: {e}");
                            continue;
                        }
                    };

                    // Step 1 (spec §4.6): decode the envelope. A parse
                    // failure is negatively-acked; redelivery won't fix a
                    // malformed message but MaxDeliver bounds the retries.
                    let envelope: EventEnvelope = match serde_json::from_slice(&msg.payload) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            warn!("failed to decode event envelope on {consumer_name}: {e}");
                            if let Err(e) =
                                msg.ack_with(jetstream::AckKind::Nak(None)).await
                            {
                                error!("failed to nak undecodable message: {e}");
                            }
                            continue;
                        }
                    };

                    let event_id = envelope.id;
                    match applier.apply(envelope).await {
                        Ok(()) => {
                            debug!(%event_id, "event applied, acking");
                            if let Err(e) = msg.ack().await {
                                error!(%event_id, "failed to ack applied event: {e}");
                            }
                        }
                        Err(e) => {
                            warn!(%event_id, "apply failed, naking: {e}");
                            if let Err(e) =
                                msg.ack_with(jetstream::AckKind::Nak(None)).await
                            {
                                error!(%event_id, "failed to nak failed event: {e}");
                            }
                        }
                    }
                }
            }
        });

        Ok(handle)
    }
}
