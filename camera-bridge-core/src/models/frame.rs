use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Completion status of a single frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Complete,
    Error,
    Cancelled,
}

/// Per-buffer metadata filled in by the engine when a request completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMetadata {
    pub index: u32,
    pub bytes_used: u32,
    /// Monotonic capture time.
    pub timestamp: Duration,
    pub sequence: u32,
    pub status: FrameStatus,
}

/// Immutable snapshot of one completed capture.
///
/// Copied out of the engine's buffer metadata at completion time; never
/// aliases engine-owned memory. `index` identifies the buffer slot, which the
/// consumer maps through the slot's [`BufferHandle`](crate::BufferHandle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub index: u32,
    pub bytes_used: u32,
    pub timestamp: Duration,
    pub sequence: u32,
    pub status: FrameStatus,
}

impl FrameDescriptor {
    pub fn is_complete(&self) -> bool {
        self.status == FrameStatus::Complete
    }
}

impl From<&BufferMetadata> for FrameDescriptor {
    fn from(meta: &BufferMetadata) -> Self {
        Self {
            index: meta.index,
            bytes_used: meta.bytes_used,
            timestamp: meta.timestamp,
            sequence: meta.sequence,
            status: meta.status,
        }
    }
}
