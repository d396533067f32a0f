//! NATS publisher for prediction log documents and request replies

use crate::types::prediction::{PredictionRecord, ScoringReply};
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Hands prediction documents to the store subject and answers requesters.
///
/// Holds an explicitly constructed client; there is no process-wide connection.
#[derive(Clone)]
pub struct PredictionPublisher {
    client: Client,
    subject: String,
}

impl PredictionPublisher {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a prediction log document
    pub async fn publish(&self, record: &PredictionRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            prediction_id = %record.id,
            patient_id = record.patient_id,
            label = record.prediction.label,
            "Published prediction"
        );

        Ok(())
    }

    /// Answer a request on its reply subject
    pub async fn reply(&self, reply_to: Subject, reply: &ScoringReply) -> Result<()> {
        let payload = serde_json::to_vec(reply)?;
        self.client.publish(reply_to, payload.into()).await?;
        Ok(())
    }

    /// Flush buffered messages to the server
    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await?;
        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
