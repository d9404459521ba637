//! NATS subscription for incoming transactions

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::{Stream, StreamExt};
use tracing::info;

/// Receives transaction payloads from NATS.
///
/// Instances sharing a queue group split the subject's messages between
/// them, which is how the detector scales horizontally.
pub struct TransactionConsumer {
    client: Client,
    subject: String,
    queue_group: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str, queue_group: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: queue_group.to_string(),
        }
    }

    /// Subscribe to the transaction subject within the queue group
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .queue_subscribe(self.subject.clone(), self.queue_group.clone())
            .await?;
        info!(
            subject = %self.subject,
            queue_group = %self.queue_group,
            "Subscribed to transaction subject"
        );
        Ok(subscriber)
    }

    /// Subscribe and expose only the raw payload bytes
    pub async fn payloads(&self) -> Result<impl Stream<Item = Vec<u8>> + Unpin> {
        let subscriber = self.subscribe().await?;
        Ok(subscriber.map(|message| message.payload.to_vec()))
    }
}
