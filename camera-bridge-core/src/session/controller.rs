use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::models::config::SessionConfiguration;
use crate::models::error::CaptureError;
use crate::models::frame::FrameDescriptor;
use crate::models::request::{CaptureRequest, CompletedRequest, QueueError, RequestStatus};
use crate::models::state::SessionState;
use crate::models::stream::{
    BufferHandle, CameraConfiguration, PixelFormat, Size, StreamConfiguration, StreamId,
    ValidationStatus,
};
use crate::processing::completion_signal::CompletionSignal;
use crate::session::stream_pad::StreamPad;
use crate::traits::camera_engine::CameraEngine;

/// State touched only by control operations, serialized by one mutex.
struct ControlState {
    state: SessionState,
    acquired: bool,
    config: Option<CameraConfiguration>,
    next_cookie: u64,
}

impl ControlState {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            acquired: false,
            config: None,
            next_cookie: 0,
        }
    }

    fn configured_stream(&self) -> Result<StreamId, CaptureError> {
        self.config
            .as_ref()
            .and_then(|c| c.get(0))
            .and_then(|s| s.stream)
            .ok_or_else(|| CaptureError::Config("stream not configured".into()))
    }
}

/// State shared with the engine's completion threads.
struct CompletionShared {
    completed: Mutex<Vec<FrameDescriptor>>,
    signal: CompletionSignal,
    pads: RwLock<HashMap<StreamId, Arc<StreamPad>>>,
}

impl CompletionShared {
    fn on_request_completed(&self, request: CompletedRequest) {
        if request.status == RequestStatus::Cancelled {
            log::trace!("Request {} cancelled", request.cookie);
            return;
        }

        // Only one stream is configured per session.
        let Some((stream, metadata)) = request.buffers.first() else {
            log::warn!("Request {} completed without buffers", request.cookie);
            return;
        };
        let frame = FrameDescriptor::from(metadata);

        let pad = self.pads.read().get(stream).cloned();
        match pad {
            Some(pad) => pad.queue_buffer(frame),
            None => self.completed.lock().push(frame),
        }

        self.signal.release();
    }
}

/// Owns one camera for the lifetime of a capture session.
///
/// Turns the engine's asynchronous, possibly out-of-order completions into
/// an ordered batch of [`FrameDescriptor`]s (poll style) or feeds attached
/// [`StreamPad`]s (push style).
///
/// ```text
/// submit_buffer ─→ [pending, while idle] ─start()─→ engine
///                                                     │ completion thread
///                       drain_completed ←─ [completed] ←┤
///                       push_pending    ←─ [pad queue] ←┘
/// ```
///
/// Every method takes `&self`; share the controller through an `Arc` to poll
/// from one thread while another drives control operations.
pub struct CaptureSessionController<E: CameraEngine> {
    engine: E,
    config: SessionConfiguration,
    control: Mutex<ControlState>,
    pending: Mutex<VecDeque<CaptureRequest>>,
    shared: Arc<CompletionShared>,
}

impl<E: CameraEngine> CaptureSessionController<E> {
    pub fn new(engine: E) -> Self {
        Self::build(engine, SessionConfiguration::default())
    }

    pub fn with_configuration(engine: E, config: SessionConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::Config)?;
        Ok(Self::build(engine, config))
    }

    fn build(engine: E, config: SessionConfiguration) -> Self {
        let shared = Arc::new(CompletionShared {
            completed: Mutex::new(Vec::new()),
            signal: CompletionSignal::new(),
            pads: RwLock::new(HashMap::new()),
        });

        let handler = Arc::clone(&shared);
        engine.set_completion_handler(Arc::new(move |request: CompletedRequest| {
            handler.on_request_completed(request);
        }));

        Self {
            engine,
            config,
            control: Mutex::new(ControlState::new()),
            pending: Mutex::new(VecDeque::new()),
            shared,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn configuration(&self) -> &SessionConfiguration {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.control.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn is_open(&self) -> bool {
        self.control.lock().acquired
    }

    /// Requests held back until streaming starts.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    /// Acquire the camera and derive a default configuration for the
    /// session's role.
    pub fn open(&self) -> Result<(), CaptureError> {
        let mut control = self.control.lock();
        if control.acquired {
            return Ok(());
        }

        if let Err(e) = self.engine.acquire() {
            log::error!("Failed to acquire camera {}: {}", self.engine.id(), e);
            return Err(CaptureError::Acquire(format!("{}: {}", self.engine.id(), e)));
        }

        let role = self.config.role;
        let config = self
            .engine
            .generate_configuration(&[role])
            .filter(|c| !c.is_empty());
        let Some(config) = config else {
            self.engine.release();
            return Err(CaptureError::Config(format!(
                "no {} configuration for camera {}",
                role,
                self.engine.id()
            )));
        };

        log::debug!("Opened camera {} for {}", self.engine.id(), role);
        control.acquired = true;
        control.config = Some(config);
        Ok(())
    }

    /// Release the camera. Requests that were never submitted are dropped.
    ///
    /// Safe to call repeatedly, or on a session that never opened.
    pub fn close(&self) {
        let mut control = self.control.lock();
        if !control.acquired {
            return;
        }

        if control.state.is_running() {
            if let Err(e) = self.engine.stop() {
                log::warn!("Failed to stop camera {} on close: {}", self.engine.id(), e);
            }
            control.state = SessionState::Idle;
            self.set_pads_active(false);
        }

        let dropped = {
            let mut pending = self.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        if dropped > 0 {
            log::debug!("Dropped {} pending requests on close", dropped);
        }

        self.engine.release();
        control.acquired = false;
        control.config = None;
    }

    /// The current configuration of the session's stream.
    pub fn stream_configuration(&self) -> Option<StreamConfiguration> {
        self.control
            .lock()
            .config
            .as_ref()
            .and_then(|c| c.get(0))
            .copied()
    }

    /// Negotiate size, format and buffer count for the stream.
    ///
    /// Returns the configuration actually applied, which differs from the
    /// request when the engine adjusted it. An invalid request leaves the
    /// previous configuration in place.
    pub fn configure(
        &self,
        size: Size,
        pixel_format: PixelFormat,
        buffer_count: u32,
    ) -> Result<StreamConfiguration, CaptureError> {
        let mut control = self.control.lock();
        let mut candidate = control
            .config
            .clone()
            .ok_or_else(|| CaptureError::Config("camera not open".into()))?;

        {
            let stream = candidate
                .get_mut(0)
                .ok_or_else(|| CaptureError::Config("configuration has no streams".into()))?;
            stream.size = size;
            stream.pixel_format = pixel_format;
            stream.buffer_count = buffer_count;
        }

        match self.engine.validate(&mut candidate) {
            ValidationStatus::Invalid => {
                log::debug!("Configuration invalid");
                return Err(CaptureError::Config(format!(
                    "{}-{} with {} buffers not supported",
                    size, pixel_format, buffer_count
                )));
            }
            ValidationStatus::Adjusted => log::debug!("Configuration adjusted"),
            ValidationStatus::Valid => {}
        }

        self.engine.configure(&mut candidate)?;

        let negotiated = candidate
            .get(0)
            .copied()
            .ok_or_else(|| CaptureError::Config("configuration has no streams".into()))?;
        log::debug!("Validated configuration is: {}", negotiated);

        control.config = Some(candidate);
        Ok(negotiated)
    }

    /// Allocate engine buffers for the configured stream.
    pub fn allocate_buffers(&self, count: u32) -> Result<u32, CaptureError> {
        let control = self.control.lock();
        let stream = control.configured_stream()?;
        Ok(self.engine.allocate_buffers(stream, count)?)
    }

    pub fn free_buffers(&self) {
        let control = self.control.lock();
        if let Ok(stream) = control.configured_stream() {
            self.engine.free_buffers(stream);
        }
    }

    /// Zero-copy handle of buffer slot `index`. The engine keeps ownership.
    pub fn buffer_handle(&self, index: u32) -> Result<BufferHandle, CaptureError> {
        let stream = self.control.lock().configured_stream()?;
        self.engine
            .buffer_handle(stream, index)
            .ok_or_else(|| CaptureError::Resource(format!("no buffer allocated at index {}", index)))
    }

    /// Start streaming and submit every request queued while idle, oldest
    /// first. Does nothing if already running.
    ///
    /// If the engine rejects one of the held-back requests, that request and
    /// all later ones go back to the pending list in order, the engine is
    /// stopped and the session stays idle; a later `start()` retries them.
    /// Should that stop fail as well, the engine is still streaming and the
    /// session reports running; `stop()` followed by `start()` retries.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut control = self.control.lock();
        if control.state.is_running() {
            return Ok(());
        }

        self.engine.start()?;

        let held: Vec<CaptureRequest> = self.pending.lock().drain(..).collect();
        let mut requests = held.into_iter();
        while let Some(request) = requests.next() {
            if let Err(QueueError { error, request }) = self.engine.queue_request(request) {
                log::error!("Failed to queue pending request {}: {}", request.cookie(), error);

                {
                    let mut pending = self.pending.lock();
                    for request in std::iter::once(request).chain(requests).rev() {
                        pending.push_front(request);
                    }
                }

                if let Err(e) = self.engine.stop() {
                    log::warn!("Failed to stop camera {} after flush error: {}", self.engine.id(), e);
                    control.state = SessionState::Running;
                    self.set_pads_active(true);
                }
                return Err(error.into());
            }
        }

        control.state = SessionState::Running;
        self.set_pads_active(true);
        log::debug!("Camera {} streaming", self.engine.id());
        Ok(())
    }

    /// Stop streaming. Does nothing if already idle.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let mut control = self.control.lock();
        if control.state.is_idle() {
            return Ok(());
        }

        self.engine.stop()?;

        control.state = SessionState::Idle;
        self.set_pads_active(false);
        log::debug!("Camera {} stopped", self.engine.id());
        Ok(())
    }

    fn set_pads_active(&self, active: bool) {
        for pad in self.shared.pads.read().values() {
            pad.set_active(active);
        }
    }

    /// Queue buffer slot `index` for capture, returning the request cookie.
    ///
    /// While idle the request is held back until [`start`](Self::start).
    pub fn submit_buffer(&self, index: u32) -> Result<u64, CaptureError> {
        let mut control = self.control.lock();
        let stream = control.configured_stream()?;

        let buffer = self.engine.create_buffer(stream, index).ok_or_else(|| {
            log::error!("Can't create buffer {}", index);
            CaptureError::Resource(format!("can't create buffer {}", index))
        })?;

        let cookie = control.next_cookie;
        let mut request = self.engine.create_request(cookie).ok_or_else(|| {
            log::error!("Can't create request");
            CaptureError::Resource("can't create request".into())
        })?;
        control.next_cookie += 1;

        request.add_buffer(stream, buffer).map_err(|e| {
            log::error!("Can't set buffer for request: {}", e);
            CaptureError::Resource(format!("can't set buffer for request: {}", e))
        })?;

        if control.state.is_idle() {
            self.pending.lock().push_back(request);
            return Ok(cookie);
        }

        self.engine.queue_request(request).map_err(|QueueError { error, .. }| {
            log::error!("Can't queue request: {}", error);
            CaptureError::from(error)
        })?;
        Ok(cookie)
    }

    /// Take every frame completed so far, in completion order.
    ///
    /// Outstanding completion permits are consumed with the batch, so a
    /// following wait blocks until something new completes.
    pub fn drain_completed(&self) -> Vec<FrameDescriptor> {
        let mut completed = self.shared.completed.lock();
        self.shared.signal.reset();
        std::mem::take(&mut *completed)
    }

    /// Block until a completion is signalled or `timeout` elapses.
    ///
    /// A `true` result does not guarantee frames are waiting; they may have
    /// been drained already.
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        self.shared.signal.acquire_timeout(timeout)
    }

    /// Drain completed frames, waiting up to `timeout` if there are none.
    /// Returns an empty batch only once `timeout` has elapsed.
    pub fn poll_completed(&self, timeout: Duration) -> Vec<FrameDescriptor> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let frames = self.drain_completed();
            if !frames.is_empty() {
                return frames;
            }

            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => return Vec::new(),
                },
                None => Duration::MAX,
            };
            if !self.wait_for_completion(remaining) {
                return self.drain_completed();
            }
        }
    }

    /// [`poll_completed`](Self::poll_completed) with the configured timeout.
    pub fn poll(&self) -> Vec<FrameDescriptor> {
        self.poll_completed(self.config.poll_timeout())
    }

    /// Route completions for the configured stream to `pad`.
    pub fn attach_pad(&self, pad: Arc<StreamPad>) -> Result<StreamId, CaptureError> {
        let control = self.control.lock();
        let stream = control.configured_stream()?;

        pad.set_stream(Some(stream));
        pad.set_active(control.state.is_running());
        self.shared.pads.write().insert(stream, pad);
        Ok(stream)
    }

    pub fn detach_pad(&self, stream: StreamId) -> Option<Arc<StreamPad>> {
        let pad = self.shared.pads.write().remove(&stream)?;
        pad.set_active(false);
        pad.set_stream(None);
        Some(pad)
    }

    /// Completion entry point for engines that report through the session
    /// rather than the registered callback.
    pub fn on_request_completed(&self, request: CompletedRequest) {
        self.shared.on_request_completed(request);
    }
}

impl<E: CameraEngine> Drop for CaptureSessionController<E> {
    fn drop(&mut self) {
        self.close();
    }
}
