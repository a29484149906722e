//! NATS JetStream event source.
//!
//! Twin change notifications are published on `twins.{partition}.{device}`
//! with the event metadata in headers and the twin document as the body.
//! Each partition is read by its own durable pull consumer filtered to
//! `twins.{partition}.>`.
//!
//! The consumer acks with [`AckPolicy::All`], so checkpointing an event is
//! a single ack of that event's message: the server then treats it and
//! every earlier message of the consumer as processed.

use std::collections::BTreeMap;
use std::time::Duration;

use async_nats::HeaderMap;
use async_nats::jetstream::{self, Message};
use async_nats::jetstream::consumer::{AckPolicy, Consumer, pull};
use chrono::{DateTime, Utc};
use futures::StreamExt as _;
use tracing::{debug, info, warn};
use twingraph_sync::{EventSource, SourceError};
use twingraph_types::{ChangeEvent, MessageSource, OperationType};

use crate::error::EngineError;

/// Header carrying the hub name.
pub const HUB_NAME_HEADER: &str = "hubName";

/// Header carrying the device id.
pub const DEVICE_ID_HEADER: &str = "deviceId";

/// Header carrying the operation type.
pub const OPERATION_TYPE_HEADER: &str = "opType";

/// Header carrying the message source.
pub const MESSAGE_SOURCE_HEADER: &str = "iothub-message-source";

/// Header carrying the RFC 3339 enqueue time.
pub const ENQUEUED_TIME_HEADER: &str = "iothub-enqueuedtime";

/// Subject filter for one partition.
pub fn partition_subject(partition: &str) -> String {
    format!("twins.{partition}.>")
}

/// Connect to NATS and return a JetStream context.
///
/// # Errors
///
/// Returns [`EngineError::Nats`] if the connection cannot be established.
pub async fn connect(url: &str) -> Result<jetstream::Context, EngineError> {
    info!(url = url, "connecting to NATS server");
    let client = async_nats::connect(url)
        .await
        .map_err(|e| EngineError::Nats(format!("failed to connect to {url}: {e}")))?;
    info!("NATS connection established");
    Ok(jetstream::new(client))
}

/// Settings shared by every partition's consumer.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Stream name.
    pub stream: String,
    /// Durable consumer name prefix.
    pub consumer_name: String,
    /// Maximum messages per fetch.
    pub batch_size: usize,
    /// How long a fetch waits for messages.
    pub batch_expires: Duration,
}

/// One partition of the twin change stream.
pub struct JetStreamSource {
    partition_id: String,
    consumer: Consumer<pull::Config>,
    batch_size: usize,
    batch_expires: Duration,
    /// Fetched messages not yet acked, by stream sequence.
    unacked: BTreeMap<u64, Message>,
}

impl JetStreamSource {
    /// Open (or create) the durable consumer for `partition_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the stream does not exist or the
    /// consumer cannot be created.
    pub async fn open(
        js: &jetstream::Context,
        settings: &ConsumerSettings,
        partition_id: &str,
    ) -> Result<Self, EngineError> {
        let stream = js.get_stream(&settings.stream).await.map_err(|e| {
            EngineError::Nats(format!("failed to get stream {}: {e}", settings.stream))
        })?;

        let durable = format!("{}-{partition_id}", settings.consumer_name);
        let consumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    ack_policy: AckPolicy::All,
                    filter_subject: partition_subject(partition_id),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| EngineError::Nats(format!("failed to open consumer {durable}: {e}")))?;
        info!(partition = partition_id, consumer = durable, "partition consumer ready");

        Ok(Self {
            partition_id: partition_id.to_owned(),
            consumer,
            batch_size: settings.batch_size,
            batch_expires: settings.batch_expires,
            unacked: BTreeMap::new(),
        })
    }

    fn fetch_error(&self, message: String) -> SourceError {
        SourceError::Fetch {
            partition: self.partition_id.clone(),
            message,
        }
    }
}

impl EventSource for JetStreamSource {
    fn partition_id(&self) -> &str {
        &self.partition_id
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<ChangeEvent>>, SourceError> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(self.batch_size)
            .expires(self.batch_expires)
            .messages()
            .await
            .map_err(|e| self.fetch_error(format!("fetch request failed: {e}")))?;

        // Messages left over from an abandoned batch are redelivered.
        self.unacked.clear();
        let mut batch = Vec::new();
        while let Some(message) = messages.next().await {
            let message = message.map_err(|e| self.fetch_error(e.to_string()))?;
            let offset = match message.info() {
                Ok(info) => info.stream_sequence,
                Err(e) => {
                    warn!(partition = self.partition_id, error = %e, "message without JetStream metadata");
                    continue;
                }
            };
            batch.push(change_event(
                message.headers.as_ref(),
                &message.payload,
                offset,
            ));
            self.unacked.insert(offset, message);
        }
        debug!(partition = self.partition_id, events = batch.len(), "batch fetched");
        Ok(Some(batch))
    }

    async fn checkpoint(&mut self, event: &ChangeEvent) -> Result<(), SourceError> {
        let offset = event.sequence_offset;
        let newer = self.unacked.split_off(&offset.saturating_add(1));
        let settled = std::mem::replace(&mut self.unacked, newer);

        let Some(message) = settled.get(&offset) else {
            warn!(partition = self.partition_id, offset, "checkpoint for unknown message");
            return Ok(());
        };
        message.ack().await.map_err(|e| SourceError::Checkpoint {
            partition: self.partition_id.clone(),
            offset,
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for JetStreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JetStreamSource")
            .field("partition_id", &self.partition_id)
            .field("unacked", &self.unacked.len())
            .finish_non_exhaustive()
    }
}

/// Build a [`ChangeEvent`] from a message's headers and body.
///
/// Missing headers become empty strings, which the dispatcher treats as an
/// unsupported operation. A body that is not JSON becomes a `null` twin.
pub fn change_event(headers: Option<&HeaderMap>, payload: &[u8], offset: u64) -> ChangeEvent {
    let header = |name: &str| -> String {
        headers
            .and_then(|h| h.get(name))
            .map(|v| v.as_str().to_owned())
            .unwrap_or_default()
    };

    let payload = serde_json::from_slice(payload).unwrap_or_else(|e| {
        warn!(offset, error = %e, "twin payload is not valid JSON");
        serde_json::Value::Null
    });
    let enqueued_at = DateTime::parse_from_rfc3339(&header(ENQUEUED_TIME_HEADER))
        .ok()
        .map(|t| t.with_timezone(&Utc));

    ChangeEvent {
        hub_name: header(HUB_NAME_HEADER),
        device_id: header(DEVICE_ID_HEADER),
        message_source: MessageSource::from_wire(&header(MESSAGE_SOURCE_HEADER)),
        operation_type: OperationType::from_wire(&header(OPERATION_TYPE_HEADER)),
        payload,
        sequence_offset: offset,
        enqueued_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, *value);
        }
        headers
    }

    #[test]
    fn subject_per_partition() {
        assert_eq!(partition_subject("3"), "twins.3.>");
    }

    #[test]
    fn event_from_headers_and_body() {
        let headers = headers(&[
            (HUB_NAME_HEADER, "hub"),
            (DEVICE_ID_HEADER, "t1"),
            (OPERATION_TYPE_HEADER, "replaceTwin"),
            (MESSAGE_SOURCE_HEADER, "twinChangeEvents"),
            (ENQUEUED_TIME_HEADER, "2026-03-01T12:00:00Z"),
        ]);
        let event = change_event(Some(&headers), br#"{"version": 4}"#, 17);

        assert_eq!(event.hub_name, "hub");
        assert_eq!(event.device_id, "t1");
        assert_eq!(event.message_source, MessageSource::TwinChange);
        assert_eq!(event.operation_type, OperationType::ReplaceTwin);
        assert_eq!(event.payload, serde_json::json!({"version": 4}));
        assert_eq!(event.sequence_offset, 17);
        assert!(event.enqueued_at.is_some());
    }

    #[test]
    fn missing_headers_and_bad_body() {
        let event = change_event(None, b"not json", 3);
        assert!(event.hub_name.is_empty());
        assert_eq!(event.message_source, MessageSource::Other(String::new()));
        assert!(event.payload.is_null());
        assert!(event.enqueued_at.is_none());
    }

    #[tokio::test]
    #[ignore = "requires a NATS server with JetStream at localhost:4222"]
    async fn connect_to_nats() {
        assert!(connect("nats://localhost:4222").await.is_ok());
    }
}
