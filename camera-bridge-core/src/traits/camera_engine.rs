use std::sync::Arc;

use crate::models::error::EngineError;
use crate::models::request::{CaptureRequest, CompletedRequest, FrameBuffer, QueueError};
use crate::models::stream::{BufferHandle, CameraConfiguration, StreamId, StreamRole, ValidationStatus};

/// Callback invoked when the engine finishes a request.
///
/// Fires on an engine-owned thread, possibly several concurrently, and in an
/// order that need not match submission order.
pub type CompletionCallback = Arc<dyn Fn(CompletedRequest) + Send + Sync + 'static>;

/// Interface to the camera pipeline engine that owns sensor control, ISP and
/// buffer memory.
///
/// Implemented by:
/// - `VirtualCamera` (camera-bridge-virtual)
pub trait CameraEngine: Send + Sync {
    /// Stable identifier of the camera.
    fn id(&self) -> &str;

    /// Take exclusive ownership of the camera. Fails if already acquired.
    fn acquire(&self) -> Result<(), EngineError>;

    /// Give up ownership. Harmless when not acquired.
    fn release(&self);

    /// Default configuration for the given roles, one stream per role.
    fn generate_configuration(&self, roles: &[StreamRole]) -> Option<CameraConfiguration>;

    /// Check `config` against the hardware, coercing values where possible.
    fn validate(&self, config: &mut CameraConfiguration) -> ValidationStatus;

    /// Apply a validated configuration. Assigns stream identifiers.
    fn configure(&self, config: &mut CameraConfiguration) -> Result<(), EngineError>;

    /// Allocate buffers for `stream`, returning how many were allocated.
    fn allocate_buffers(&self, stream: StreamId, count: u32) -> Result<u32, EngineError>;

    fn free_buffers(&self, stream: StreamId);

    /// Handle of an allocated buffer slot.
    fn buffer_handle(&self, stream: StreamId, index: u32) -> Option<BufferHandle>;

    /// Wrap an allocated slot so it can be attached to a request.
    fn create_buffer(&self, stream: StreamId, index: u32) -> Option<FrameBuffer>;

    fn create_request(&self, cookie: u64) -> Option<CaptureRequest>;

    /// Submit a request. On failure the request is returned in the error.
    fn queue_request(&self, request: CaptureRequest) -> Result<(), QueueError>;

    fn start(&self) -> Result<(), EngineError>;

    /// Stop streaming. In-flight requests complete as cancelled.
    fn stop(&self) -> Result<(), EngineError>;

    /// Install the completion handler, replacing any previous one.
    fn set_completion_handler(&self, callback: CompletionCallback);
}
