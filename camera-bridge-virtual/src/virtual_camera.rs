//! Simulated camera engine.
//!
//! Owns synthetic buffer slots and completes queued requests either on a
//! dedicated frame thread (fixed frame interval) or on demand from the
//! caller (manual mode). Used to exercise the session controller without
//! camera hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use camera_bridge_core::models::error::EngineError;
use camera_bridge_core::models::frame::{BufferMetadata, FrameStatus};
use camera_bridge_core::models::request::{
    CaptureRequest, CompletedRequest, FrameBuffer, QueueError, RequestStatus,
};
use camera_bridge_core::models::stream::{
    BufferHandle, CameraConfiguration, PixelFormat, Size, StreamConfiguration, StreamId,
    StreamRole, ValidationStatus,
};
use camera_bridge_core::traits::camera_engine::{CameraEngine, CompletionCallback};

/// Upper bound on buffer slots per stream.
pub const MAX_BUFFERS: u32 = 32;

const DEFAULT_BUFFER_COUNT: u32 = 4;
const SYNTHETIC_FD_BASE: i32 = 1000;

/// Engine operations that accept an injected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    Acquire,
    Configure,
    Allocate,
    Queue,
    Start,
    Stop,
}

/// Capabilities and pacing of a [`VirtualCamera`].
#[derive(Debug, Clone)]
pub struct VirtualCameraOptions {
    /// Supported formats; the first is the fallback when validation adjusts.
    pub formats: Vec<PixelFormat>,
    pub max_size: Size,
    /// Delay between completions. `None` selects manual mode.
    pub frame_interval: Option<Duration>,
    /// Complete queued requests in swapped pairs (B, A, D, C, ...).
    pub reorder: bool,
}

impl Default for VirtualCameraOptions {
    fn default() -> Self {
        Self {
            formats: vec![PixelFormat::NV12, PixelFormat::YUYV, PixelFormat::MJPEG],
            max_size: Size::new(1920, 1080),
            frame_interval: None,
            reorder: false,
        }
    }
}

#[derive(Default)]
struct EngineState {
    streams: Vec<StreamConfiguration>,
    allocated: HashMap<StreamId, u32>,
    in_flight: VecDeque<CaptureRequest>,
    queued_log: Vec<u64>,
    faults: HashMap<EngineOp, EngineError>,
    sequence: u32,
    started_at: Option<Instant>,
    swap_next: bool,
}

impl EngineState {
    fn take_fault(&mut self, op: EngineOp) -> Result<(), EngineError> {
        match self.faults.remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Next request to complete, honouring pair reordering.
    fn next_request(&mut self, reorder: bool) -> Option<CaptureRequest> {
        if !reorder {
            return self.in_flight.pop_front();
        }
        let swap = self.swap_next && self.in_flight.len() >= 2;
        self.swap_next = !swap;
        self.in_flight.remove(usize::from(swap))
    }

    fn stream_config(&self, stream: StreamId) -> Option<&StreamConfiguration> {
        self.streams.iter().find(|s| s.stream == Some(stream))
    }
}

struct Inner {
    id: String,
    options: VirtualCameraOptions,
    acquired: AtomicBool,
    streaming: AtomicBool,
    state: Mutex<EngineState>,
    wake: Condvar,
    handler: RwLock<Option<CompletionCallback>>,
    frame_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Inner {
    fn finish(&self, request: CaptureRequest, status: RequestStatus) {
        let cookie = request.cookie();
        let completed = {
            let mut state = self.state.lock();
            let sequence = state.sequence;
            if status != RequestStatus::Cancelled {
                state.sequence = state.sequence.wrapping_add(1);
            }
            let timestamp = state.started_at.map(|t| t.elapsed()).unwrap_or_default();

            let buffers = request
                .buffers()
                .iter()
                .map(|(stream, buffer)| {
                    let bytes_used = match status {
                        RequestStatus::Cancelled => 0,
                        _ => state
                            .stream_config(*stream)
                            .map(|c| c.pixel_format.frame_size(c.size))
                            .unwrap_or(0),
                    };
                    let metadata = BufferMetadata {
                        index: buffer.index(),
                        bytes_used,
                        timestamp,
                        sequence,
                        status: frame_status(status),
                    };
                    (*stream, metadata)
                })
                .collect();

            CompletedRequest {
                cookie,
                status,
                buffers,
            }
        };

        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => handler(completed),
            None => log::trace!("No completion handler for request {}", cookie),
        }
    }
}

fn frame_status(status: RequestStatus) -> FrameStatus {
    match status {
        RequestStatus::Complete => FrameStatus::Complete,
        RequestStatus::Error => FrameStatus::Error,
        RequestStatus::Cancelled => FrameStatus::Cancelled,
    }
}

/// In-process camera implementing [`CameraEngine`].
///
/// Clones share the same camera, so a test can hand one clone to the
/// session controller and keep another to drive completions.
#[derive(Clone)]
pub struct VirtualCamera {
    inner: Arc<Inner>,
}

impl VirtualCamera {
    /// A manual-mode camera with default capabilities.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_options(id, VirtualCameraOptions::default())
    }

    pub fn with_options(id: impl Into<String>, options: VirtualCameraOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: id.into(),
                options,
                acquired: AtomicBool::new(false),
                streaming: AtomicBool::new(false),
                state: Mutex::new(EngineState::default()),
                wake: Condvar::new(),
                handler: RwLock::new(None),
                frame_thread: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &VirtualCameraOptions {
        &self.inner.options
    }

    /// Make the next call of `op` fail with `error`.
    pub fn fail_next(&self, op: EngineOp, error: EngineError) {
        self.inner.state.lock().faults.insert(op, error);
    }

    pub fn is_acquired(&self) -> bool {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.load(Ordering::SeqCst)
    }

    /// Cookies of every request accepted by `queue_request`, in order.
    pub fn queued_cookies(&self) -> Vec<u64> {
        self.inner.state.lock().queued_log.clone()
    }

    /// Requests queued but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Complete the next in-flight request. Returns `false` if none.
    pub fn complete_next(&self) -> bool {
        let request = self.inner.state.lock().next_request(self.inner.options.reorder);
        match request {
            Some(request) => {
                self.inner.finish(request, RequestStatus::Complete);
                true
            }
            None => false,
        }
    }

    /// Complete every in-flight request, returning how many completed.
    pub fn complete_all(&self) -> usize {
        let mut count = 0;
        while self.complete_next() {
            count += 1;
        }
        count
    }

    /// Complete the in-flight request `cookie` with `status`.
    pub fn complete_request(&self, cookie: u64, status: RequestStatus) -> bool {
        let request = {
            let mut state = self.inner.state.lock();
            let position = state.in_flight.iter().position(|r| r.cookie() == cookie);
            position.and_then(|p| state.in_flight.remove(p))
        };
        match request {
            Some(request) => {
                self.inner.finish(request, status);
                true
            }
            None => false,
        }
    }

    fn default_stream(&self, role: StreamRole) -> StreamConfiguration {
        let options = &self.inner.options;
        let (size, pixel_format, buffer_count) = match role {
            StreamRole::StillCapture => {
                let format = if options.formats.contains(&PixelFormat::MJPEG) {
                    PixelFormat::MJPEG
                } else {
                    options.formats[0]
                };
                (options.max_size, format, 1)
            }
            StreamRole::VideoRecording => (Size::new(1280, 720), options.formats[0], DEFAULT_BUFFER_COUNT),
            StreamRole::Viewfinder => (Size::new(640, 480), options.formats[0], DEFAULT_BUFFER_COUNT),
        };

        StreamConfiguration {
            size: Size::new(
                size.width.min(options.max_size.width),
                size.height.min(options.max_size.height),
            ),
            pixel_format,
            buffer_count,
            stream: None,
        }
    }
}

impl CameraEngine for VirtualCamera {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn acquire(&self) -> Result<(), EngineError> {
        self.inner.state.lock().take_fault(EngineOp::Acquire)?;
        self.inner
            .acquired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| EngineError::PermissionDenied)
    }

    fn release(&self) {
        if self.is_streaming() {
            if let Err(e) = self.stop() {
                log::warn!("Failed to stop {} on release: {}", self.inner.id, e);
            }
        }
        {
            let mut state = self.inner.state.lock();
            state.allocated.clear();
            state.streams.clear();
        }
        self.inner.acquired.store(false, Ordering::SeqCst);
    }

    fn generate_configuration(&self, roles: &[StreamRole]) -> Option<CameraConfiguration> {
        if roles.is_empty() || self.inner.options.formats.is_empty() {
            return None;
        }
        Some(CameraConfiguration::new(
            roles.iter().map(|role| self.default_stream(*role)).collect(),
        ))
    }

    fn validate(&self, config: &mut CameraConfiguration) -> ValidationStatus {
        let options = &self.inner.options;
        if config.is_empty() || options.formats.is_empty() {
            return ValidationStatus::Invalid;
        }

        let mut status = ValidationStatus::Valid;
        for stream in config.iter_mut() {
            if stream.size.is_empty() {
                return ValidationStatus::Invalid;
            }

            let clamped = Size::new(
                stream.size.width.min(options.max_size.width),
                stream.size.height.min(options.max_size.height),
            );
            if clamped != stream.size {
                stream.size = clamped;
                status = ValidationStatus::Adjusted;
            }

            if !options.formats.contains(&stream.pixel_format) {
                stream.pixel_format = options.formats[0];
                status = ValidationStatus::Adjusted;
            }

            let count = match stream.buffer_count {
                0 => DEFAULT_BUFFER_COUNT,
                n => n.min(MAX_BUFFERS),
            };
            if count != stream.buffer_count {
                stream.buffer_count = count;
                status = ValidationStatus::Adjusted;
            }
        }
        status
    }

    fn configure(&self, config: &mut CameraConfiguration) -> Result<(), EngineError> {
        if !self.is_acquired() || self.is_streaming() {
            return Err(EngineError::PermissionDenied);
        }
        self.inner.state.lock().take_fault(EngineOp::Configure)?;

        let mut checked = config.clone();
        if self.validate(&mut checked) != ValidationStatus::Valid {
            return Err(EngineError::InvalidArgument(
                "configuration must be validated before it is applied".into(),
            ));
        }

        for (i, stream) in config.iter_mut().enumerate() {
            stream.stream = Some(StreamId(i as u32));
        }

        let mut state = self.inner.state.lock();
        state.streams = config.iter().copied().collect();
        state.allocated.clear();
        log::debug!("{} configured with {} stream(s)", self.inner.id, config.len());
        Ok(())
    }

    fn allocate_buffers(&self, stream: StreamId, count: u32) -> Result<u32, EngineError> {
        if self.is_streaming() {
            return Err(EngineError::PermissionDenied);
        }

        let mut state = self.inner.state.lock();
        state.take_fault(EngineOp::Allocate)?;
        if state.stream_config(stream).is_none() {
            return Err(EngineError::InvalidArgument(format!("stream {} not configured", stream.0)));
        }
        if count == 0 {
            return Err(EngineError::InvalidArgument("buffer count must be non-zero".into()));
        }

        let allocated = count.min(MAX_BUFFERS);
        state.allocated.insert(stream, allocated);
        Ok(allocated)
    }

    fn free_buffers(&self, stream: StreamId) {
        self.inner.state.lock().allocated.remove(&stream);
    }

    fn buffer_handle(&self, stream: StreamId, index: u32) -> Option<BufferHandle> {
        let state = self.inner.state.lock();
        let count = *state.allocated.get(&stream)?;
        (index < count).then(|| {
            BufferHandle::new(SYNTHETIC_FD_BASE + (stream.0 * MAX_BUFFERS + index) as i32)
        })
    }

    fn create_buffer(&self, stream: StreamId, index: u32) -> Option<FrameBuffer> {
        let state = self.inner.state.lock();
        let count = *state.allocated.get(&stream)?;
        (index < count).then(|| FrameBuffer::new(index))
    }

    fn create_request(&self, cookie: u64) -> Option<CaptureRequest> {
        self.is_acquired().then(|| CaptureRequest::new(cookie))
    }

    fn queue_request(&self, request: CaptureRequest) -> Result<(), QueueError> {
        let mut state = self.inner.state.lock();
        let check = state.take_fault(EngineOp::Queue).and_then(|_| {
            if !self.is_streaming() {
                return Err(EngineError::PermissionDenied);
            }
            if request.buffers().is_empty() {
                return Err(EngineError::InvalidArgument("request has no buffers".into()));
            }
            let unknown = request.buffers().iter().any(|(stream, buffer)| {
                state
                    .allocated
                    .get(stream)
                    .map_or(true, |count| buffer.index() >= *count)
            });
            if unknown {
                return Err(EngineError::InvalidArgument("buffer not allocated".into()));
            }
            Ok(())
        });
        if let Err(error) = check {
            return Err(QueueError { error, request });
        }

        state.queued_log.push(request.cookie());
        state.in_flight.push_back(request);
        self.inner.wake.notify_all();
        Ok(())
    }

    fn start(&self) -> Result<(), EngineError> {
        if !self.is_acquired() || self.is_streaming() {
            return Err(EngineError::PermissionDenied);
        }

        {
            let mut state = self.inner.state.lock();
            state.take_fault(EngineOp::Start)?;
            if state.streams.is_empty() {
                return Err(EngineError::InvalidArgument("camera not configured".into()));
            }
            state.started_at = Some(Instant::now());
            state.swap_next = self.inner.options.reorder;
            self.inner.streaming.store(true, Ordering::SeqCst);
        }

        if let Some(interval) = self.inner.options.frame_interval {
            let inner = Arc::clone(&self.inner);
            let handle = thread::Builder::new()
                .name("virtual-camera-frames".into())
                .spawn(move || frame_loop(inner, interval))
                .map_err(|e| {
                    self.inner.streaming.store(false, Ordering::SeqCst);
                    EngineError::Failure(format!("failed to spawn frame thread: {}", e))
                })?;
            *self.inner.frame_thread.lock() = Some(handle);
        }

        log::debug!("{} streaming", self.inner.id);
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        {
            let mut state = self.inner.state.lock();
            state.take_fault(EngineOp::Stop)?;
            if !self.inner.streaming.swap(false, Ordering::SeqCst) {
                return Ok(());
            }
        }
        self.inner.wake.notify_all();

        if let Some(handle) = self.inner.frame_thread.lock().take() {
            let _ = handle.join();
        }

        let cancelled: Vec<CaptureRequest> = self.inner.state.lock().in_flight.drain(..).collect();
        if !cancelled.is_empty() {
            log::debug!("{} cancelling {} in-flight request(s)", self.inner.id, cancelled.len());
        }
        for request in cancelled {
            self.inner.finish(request, RequestStatus::Cancelled);
        }
        Ok(())
    }

    fn set_completion_handler(&self, callback: CompletionCallback) {
        *self.inner.handler.write() = Some(callback);
    }
}

/// Frame thread: completes one in-flight request per interval until
/// streaming stops.
fn frame_loop(inner: Arc<Inner>, interval: Duration) {
    loop {
        let request = {
            let mut state = inner.state.lock();
            while inner.streaming.load(Ordering::SeqCst) && state.in_flight.is_empty() {
                inner.wake.wait(&mut state);
            }

            let deadline = Instant::now() + interval;
            while inner.streaming.load(Ordering::SeqCst) {
                if inner.wake.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }

            if !inner.streaming.load(Ordering::SeqCst) {
                return;
            }
            state.next_request(inner.options.reorder)
        };

        if let Some(request) = request {
            inner.finish(request, RequestStatus::Complete);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_bridge_core::models::error::CaptureError;
    use camera_bridge_core::session::controller::CaptureSessionController;
    use camera_bridge_core::session::stream_pad::StreamPad;
    use camera_bridge_core::traits::frame_sink::{FlowError, FrameSink, StreamEvent};
    use camera_bridge_core::FrameDescriptor;

    fn recorder(camera: &VirtualCamera) -> Arc<Mutex<Vec<CompletedRequest>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        camera.set_completion_handler(Arc::new(move |r: CompletedRequest| sink.lock().push(r)));
        seen
    }

    fn ready_camera(camera: &VirtualCamera, buffers: u32) -> StreamId {
        camera.acquire().unwrap();
        let mut config = camera.generate_configuration(&[StreamRole::Viewfinder]).unwrap();
        assert_eq!(camera.validate(&mut config), ValidationStatus::Valid);
        camera.configure(&mut config).unwrap();
        let stream = config.get(0).unwrap().stream.unwrap();
        camera.allocate_buffers(stream, buffers).unwrap();
        stream
    }

    fn queue(camera: &VirtualCamera, stream: StreamId, cookie: u64, index: u32) {
        let mut request = camera.create_request(cookie).unwrap();
        request
            .add_buffer(stream, camera.create_buffer(stream, index).unwrap())
            .unwrap();
        camera.queue_request(request).unwrap();
    }

    fn session(camera: &VirtualCamera, buffers: u32) -> CaptureSessionController<VirtualCamera> {
        let session = CaptureSessionController::new(camera.clone());
        session.open().unwrap();
        session
            .configure(Size::new(640, 480), PixelFormat::NV12, buffers)
            .unwrap();
        session.allocate_buffers(buffers).unwrap();
        session
    }

    fn collect(session: &CaptureSessionController<VirtualCamera>, want: usize) -> Vec<FrameDescriptor> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut frames = Vec::new();
        while frames.len() < want && Instant::now() < deadline {
            frames.extend(session.poll_completed(Duration::from_millis(50)));
        }
        frames
    }

    #[test]
    fn acquire_is_exclusive() {
        let camera = VirtualCamera::new("cam0");
        camera.acquire().unwrap();
        assert_eq!(camera.acquire(), Err(EngineError::PermissionDenied));

        camera.release();
        assert!(!camera.is_acquired());
        camera.acquire().unwrap();
    }

    #[test]
    fn generates_role_defaults() {
        let camera = VirtualCamera::new("cam0");
        let config = camera
            .generate_configuration(&[StreamRole::Viewfinder, StreamRole::StillCapture])
            .unwrap();

        assert_eq!(config.len(), 2);
        assert_eq!(config.get(0).unwrap().size, Size::new(640, 480));
        assert_eq!(config.get(1).unwrap().size, Size::new(1920, 1080));
        assert_eq!(config.get(1).unwrap().pixel_format, PixelFormat::MJPEG);
        assert!(camera.generate_configuration(&[]).is_none());
    }

    #[test]
    fn validation_clamps_and_rejects() {
        let camera = VirtualCamera::new("cam0");
        let mut config = camera.generate_configuration(&[StreamRole::Viewfinder]).unwrap();

        {
            let stream = config.get_mut(0).unwrap();
            stream.size = Size::new(4096, 720);
            stream.pixel_format = PixelFormat::RGB888;
            stream.buffer_count = 100;
        }
        assert_eq!(camera.validate(&mut config), ValidationStatus::Adjusted);
        let stream = config.get(0).unwrap();
        assert_eq!(stream.size, Size::new(1920, 720));
        assert_eq!(stream.pixel_format, PixelFormat::NV12);
        assert_eq!(stream.buffer_count, MAX_BUFFERS);

        assert_eq!(camera.validate(&mut config), ValidationStatus::Valid);

        config.get_mut(0).unwrap().size = Size::new(0, 480);
        assert_eq!(camera.validate(&mut config), ValidationStatus::Invalid);
    }

    #[test]
    fn configure_requires_acquire() {
        let camera = VirtualCamera::new("cam0");
        let mut config = camera.generate_configuration(&[StreamRole::Viewfinder]).unwrap();
        assert_eq!(camera.configure(&mut config), Err(EngineError::PermissionDenied));
        assert!(config.get(0).unwrap().stream.is_none());
    }

    #[test]
    fn buffer_slots_have_distinct_handles() {
        let camera = VirtualCamera::new("cam0");
        let stream = ready_camera(&camera, 3);

        let handles: Vec<i32> = (0..3)
            .map(|i| camera.buffer_handle(stream, i).unwrap().as_raw_fd())
            .collect();
        assert_eq!(handles, vec![1000, 1001, 1002]);
        assert!(camera.buffer_handle(stream, 3).is_none());
        assert!(camera.create_buffer(stream, 3).is_none());

        camera.free_buffers(stream);
        assert!(camera.buffer_handle(stream, 0).is_none());
    }

    #[test]
    fn queue_before_start_hands_request_back() {
        let camera = VirtualCamera::new("cam0");
        let stream = ready_camera(&camera, 2);

        let mut request = camera.create_request(9).unwrap();
        request.add_buffer(stream, FrameBuffer::new(0)).unwrap();
        let err = camera.queue_request(request).unwrap_err();

        assert_eq!(err.error, EngineError::PermissionDenied);
        assert_eq!(err.request.cookie(), 9);
        assert!(camera.queued_cookies().is_empty());
    }

    #[test]
    fn manual_completions_follow_caller() {
        let camera = VirtualCamera::new("cam0");
        let seen = recorder(&camera);
        let stream = ready_camera(&camera, 4);
        camera.start().unwrap();

        for cookie in 0..3 {
            queue(&camera, stream, cookie, cookie as u32);
        }
        assert_eq!(camera.in_flight(), 3);

        assert!(camera.complete_request(1, RequestStatus::Error));
        assert!(!camera.complete_request(1, RequestStatus::Error));
        assert_eq!(camera.complete_all(), 2);

        let seen = seen.lock();
        let cookies: Vec<u64> = seen.iter().map(|r| r.cookie).collect();
        assert_eq!(cookies, vec![1, 0, 2]);
        assert_eq!(seen[0].buffers[0].1.status, FrameStatus::Error);
        assert_eq!(seen[1].buffers[0].1.bytes_used, 640 * 480 * 3 / 2);
        assert_eq!(camera.queued_cookies(), vec![0, 1, 2]);
    }

    #[test]
    fn reordering_swaps_pairs() {
        let camera = VirtualCamera::with_options(
            "cam0",
            VirtualCameraOptions {
                reorder: true,
                ..Default::default()
            },
        );
        let seen = recorder(&camera);
        let stream = ready_camera(&camera, 4);
        camera.start().unwrap();
        for cookie in 0..4 {
            queue(&camera, stream, cookie, cookie as u32);
        }

        assert_eq!(camera.complete_all(), 4);
        let cookies: Vec<u64> = seen.lock().iter().map(|r| r.cookie).collect();
        assert_eq!(cookies, vec![1, 0, 3, 2]);
    }

    #[test]
    fn stop_cancels_in_flight() {
        let camera = VirtualCamera::new("cam0");
        let seen = recorder(&camera);
        let stream = ready_camera(&camera, 2);
        camera.start().unwrap();
        queue(&camera, stream, 0, 0);
        queue(&camera, stream, 1, 1);

        camera.stop().unwrap();

        assert!(!camera.is_streaming());
        assert_eq!(camera.in_flight(), 0);
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|r| r.status == RequestStatus::Cancelled));
        assert!(seen.iter().all(|r| r.buffers[0].1.bytes_used == 0));
    }

    #[test]
    fn injected_fault_fires_once() {
        let camera = VirtualCamera::new("cam0");
        ready_camera(&camera, 2);

        camera.fail_next(EngineOp::Start, EngineError::NoDevice);
        assert_eq!(camera.start(), Err(EngineError::NoDevice));
        assert!(!camera.is_streaming());
        camera.start().unwrap();
        camera.stop().unwrap();
    }

    #[test]
    fn frame_thread_completes_queued_requests() {
        let camera = VirtualCamera::with_options(
            "cam0",
            VirtualCameraOptions {
                frame_interval: Some(Duration::from_millis(2)),
                ..Default::default()
            },
        );
        let session = session(&camera, 4);

        for index in 0..4 {
            session.submit_buffer(index).unwrap();
        }
        session.start().unwrap();

        let frames = collect(&session, 4);
        let mut indices: Vec<u32> = frames.iter().map(|f| f.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(frames.iter().all(|f| f.is_complete()));

        session.stop().unwrap();
        session.close();
        assert!(!camera.is_acquired());
    }

    #[test]
    fn session_requeues_after_rejected_flush() {
        let camera = VirtualCamera::new("cam0");
        let session = session(&camera, 4);
        session.submit_buffer(0).unwrap();
        session.submit_buffer(1).unwrap();

        camera.fail_next(EngineOp::Queue, EngineError::InvalidArgument("rejected".into()));
        assert!(matches!(session.start(), Err(CaptureError::Engine(_))));
        assert!(!camera.is_streaming());
        assert_eq!(session.pending_requests(), 2);

        session.start().unwrap();
        assert_eq!(camera.queued_cookies(), vec![0, 1]);
        assert_eq!(camera.complete_all(), 2);
        assert_eq!(session.drain_completed().len(), 2);
    }

    #[test]
    fn session_stop_discards_cancelled() {
        let camera = VirtualCamera::new("cam0");
        let session = session(&camera, 2);
        session.start().unwrap();
        session.submit_buffer(0).unwrap();
        session.submit_buffer(1).unwrap();

        session.stop().unwrap();
        assert!(session.drain_completed().is_empty());
        assert_eq!(camera.in_flight(), 0);
    }

    #[test]
    fn session_collects_concurrent_completions() {
        let camera = VirtualCamera::new("cam0");
        let session = session(&camera, 8);
        session.start().unwrap();
        for index in 0..8 {
            session.submit_buffer(index).unwrap();
        }

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let camera = camera.clone();
                thread::spawn(move || {
                    while camera.complete_next() {}
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(session.drain_completed().len(), 8);
    }

    #[test]
    fn session_open_reports_acquire_failure() {
        let camera = VirtualCamera::new("cam0");
        camera.fail_next(EngineOp::Acquire, EngineError::NoDevice);

        let session = CaptureSessionController::new(camera.clone());
        let err = session.open().unwrap_err();
        assert_eq!(err.code(), "acquire_failed");
        session.open().unwrap();
    }

    #[test]
    fn session_busy_when_reconfiguring_while_streaming() {
        let camera = VirtualCamera::new("cam0");
        let session = session(&camera, 2);
        session.start().unwrap();

        let err = session.allocate_buffers(2).unwrap_err();
        assert_eq!(err, CaptureError::Busy);
        assert!(err.is_retryable());
    }

    #[derive(Default)]
    struct CollectingSink {
        frames: Mutex<Vec<FrameDescriptor>>,
    }

    impl FrameSink for CollectingSink {
        fn push(&self, frame: FrameDescriptor) -> Result<(), FlowError> {
            self.frames.lock().push(frame);
            Ok(())
        }

        fn push_event(&self, _event: StreamEvent) -> bool {
            true
        }
    }

    #[test]
    fn pad_receives_engine_frames() {
        let camera = VirtualCamera::new("cam0");
        let session = session(&camera, 2);
        let sink = Arc::new(CollectingSink::default());
        let pad = Arc::new(StreamPad::new("src", sink.clone()));
        session.attach_pad(Arc::clone(&pad)).unwrap();

        session.start().unwrap();
        assert!(pad.push_stream_start(0));
        session.submit_buffer(1).unwrap();
        camera.complete_all();

        assert!(session.drain_completed().is_empty());
        pad.push_pending().unwrap();
        assert_eq!(sink.frames.lock()[0].index, 1);
    }
}
