use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use super::Stage;

/// One completed stage, as reported to an [`ObservabilitySink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub run_id: Uuid,
    pub stage: Stage,
    pub input_summary: String,
    pub output_summary: String,
    pub duration_ms: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("sink is full")]
    Full,
    #[error("sink is closed")]
    Closed,
    #[error("sink failed: {0}")]
    Failed(String),
}

/// Receives stage records. Fire-and-forget: the engine ignores the result
/// beyond a debug log, so implementations must return promptly.
pub trait ObservabilitySink: Send + Sync {
    fn record(&self, record: &StageRecord) -> Result<(), SinkError>;
}

/// Emits each record as an `info!` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record(&self, record: &StageRecord) -> Result<(), SinkError> {
        info!(
            run_id = %record.run_id,
            stage = record.stage.as_str(),
            duration_ms = record.duration_ms,
            input = %record.input_summary,
            output = %record.output_summary,
            "Stage completed"
        );
        Ok(())
    }
}

/// Forwards records into a bounded channel, dropping them when it is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<StageRecord>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StageRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ObservabilitySink for ChannelSink {
    fn record(&self, record: &StageRecord) -> Result<(), SinkError> {
        self.sender.try_send(record.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}
