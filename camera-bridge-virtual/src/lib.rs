//! # camera-bridge-virtual
//!
//! Simulated camera engine backend for camera-bridge.
//!
//! Provides:
//! - `VirtualCamera`: In-process `CameraEngine` with synthetic buffer slots
//! - `VirtualCameraOptions`: Supported formats, maximum size and frame pacing
//! - `EngineOp`: Operations that accept injected faults
//!
//! ## Usage
//! ```
//! use camera_bridge_core::{CaptureSessionController, PixelFormat, Size};
//! use camera_bridge_virtual::VirtualCamera;
//!
//! let camera = VirtualCamera::new("virtual0");
//! let session = CaptureSessionController::new(camera.clone());
//! session.open().unwrap();
//! session.configure(Size::new(640, 480), PixelFormat::NV12, 4).unwrap();
//! session.allocate_buffers(4).unwrap();
//! session.submit_buffer(0).unwrap();
//! session.start().unwrap();
//!
//! camera.complete_all();
//! assert_eq!(session.drain_completed().len(), 1);
//! ```

pub mod virtual_camera;

pub use virtual_camera::{EngineOp, VirtualCamera, VirtualCameraOptions, MAX_BUFFERS};
