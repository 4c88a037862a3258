use thiserror::Error;

use crate::models::frame::FrameDescriptor;

/// Reasons a downstream element refused a buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("pad not linked")]
    NotLinked,

    #[error("downstream is flushing")]
    Flushing,

    #[error("end of stream")]
    Eos,

    #[error("flow error: {0}")]
    Error(String),
}

/// Serialized events announced ahead of data on a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    StreamStart { stream_id: String, group_id: u32 },
}

/// Downstream consumer of a stream pad.
///
/// `push` may block (e.g. on a full downstream queue); callers must not hold
/// locks across it.
pub trait FrameSink: Send + Sync {
    fn push(&self, frame: FrameDescriptor) -> Result<(), FlowError>;

    /// Returns whether the event was handled.
    fn push_event(&self, event: StreamEvent) -> bool;
}
