use thiserror::Error;

use super::error::EngineError;
use super::frame::BufferMetadata;
use super::stream::StreamId;

/// Wrapper around an engine buffer slot, attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBuffer {
    index: u32,
}

impl FrameBuffer {
    pub fn new(index: u32) -> Self {
        Self { index }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

/// A capture request: one buffer per stream, identified by `cookie`.
///
/// Ownership moves to the engine on submission; the outcome comes back as a
/// [`CompletedRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    cookie: u64,
    buffers: Vec<(StreamId, FrameBuffer)>,
}

impl CaptureRequest {
    pub fn new(cookie: u64) -> Self {
        Self {
            cookie,
            buffers: Vec::new(),
        }
    }

    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    /// Attach `buffer` for `stream`. A stream may only carry one buffer.
    pub fn add_buffer(&mut self, stream: StreamId, buffer: FrameBuffer) -> Result<(), EngineError> {
        if self.buffer(stream).is_some() {
            return Err(EngineError::InvalidArgument(format!(
                "request {} already has a buffer for stream {}",
                self.cookie, stream.0
            )));
        }
        self.buffers.push((stream, buffer));
        Ok(())
    }

    pub fn buffer(&self, stream: StreamId) -> Option<&FrameBuffer> {
        self.buffers.iter().find(|(s, _)| *s == stream).map(|(_, b)| b)
    }

    pub fn buffers(&self) -> &[(StreamId, FrameBuffer)] {
        &self.buffers
    }
}

/// Final status of a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Complete,
    Error,
    Cancelled,
}

/// Outcome of a request, delivered on an engine thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRequest {
    pub cookie: u64,
    pub status: RequestStatus,
    pub buffers: Vec<(StreamId, BufferMetadata)>,
}

/// A submission the engine refused. The request is handed back untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("request {} rejected: {error}", .request.cookie())]
pub struct QueueError {
    pub error: EngineError,
    pub request: CaptureRequest,
}
