//! # camera-bridge-core
//!
//! Engine-agnostic camera capture core library.
//!
//! Provides the capture request lifecycle, completion queues and stream pad
//! identity on top of an asynchronous camera engine. Engines (hardware
//! pipelines, the virtual test camera) implement the `CameraEngine` trait and
//! plug into the generic `CaptureSessionController`.
//!
//! ## Architecture
//!
//! ```text
//! camera-bridge-core (this crate)
//! ├── traits/       ← CameraEngine, FrameSink
//! ├── models/       ← CaptureError, SessionState, FrameDescriptor, CaptureRequest, etc.
//! ├── processing/   ← PendingBufferQueue, CompletionSignal
//! └── session/      ← CaptureSessionController (generic orchestrator), StreamPad
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::SessionConfiguration;
pub use models::error::{CaptureError, EngineError};
pub use models::frame::{BufferMetadata, FrameDescriptor, FrameStatus};
pub use models::request::{CaptureRequest, CompletedRequest, FrameBuffer, QueueError, RequestStatus};
pub use models::state::SessionState;
pub use models::stream::{
    BufferHandle, CameraConfiguration, PixelFormat, Size, StreamConfiguration, StreamId,
    StreamRole, ValidationStatus,
};
pub use processing::completion_signal::CompletionSignal;
pub use processing::pending_queue::PendingBufferQueue;
pub use session::controller::CaptureSessionController;
pub use session::stream_pad::{LatencyInfo, StreamPad};
pub use traits::camera_engine::{CameraEngine, CompletionCallback};
pub use traits::frame_sink::{FlowError, FrameSink, StreamEvent};
