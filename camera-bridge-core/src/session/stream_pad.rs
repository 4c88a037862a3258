use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::frame::FrameDescriptor;
use crate::models::stream::{StreamId, StreamRole};
use crate::processing::pending_queue::PendingBufferQueue;
use crate::traits::frame_sink::{FlowError, FrameSink, StreamEvent};

/// Answer to a latency query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyInfo {
    pub live: bool,
    pub min: Duration,
    pub max: Duration,
}

struct PadState {
    role: StreamRole,
    active: bool,
    stream: Option<StreamId>,
    latency: Duration,
    stream_id_num: u32,
}

/// Output pad of the push-based element: one per camera stream.
///
/// Completed frames are queued by the session's completion handler and
/// pushed downstream by the streaming thread through [`push_pending`].
///
/// [`push_pending`]: StreamPad::push_pending
pub struct StreamPad {
    name: String,
    upstream_id: String,
    state: Mutex<PadState>,
    pending: PendingBufferQueue<FrameDescriptor>,
    sink: Arc<dyn FrameSink>,
}

impl StreamPad {
    pub fn new(name: impl Into<String>, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            name: name.into(),
            upstream_id: uuid::Uuid::new_v4().simple().to_string(),
            state: Mutex::new(PadState {
                role: StreamRole::VideoRecording,
                active: false,
                stream: None,
                latency: Duration::ZERO,
                stream_id_num: 0,
            }),
            pending: PendingBufferQueue::new(),
            sink,
        }
    }

    pub fn with_role(self, role: StreamRole) -> Self {
        self.state.lock().role = role;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> StreamRole {
        self.state.lock().role
    }

    /// Change the role. Only allowed while the pad is not streaming.
    pub fn set_role(&self, role: StreamRole) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.active {
            return Err(CaptureError::Config(format!(
                "cannot change role of {} while streaming",
                self.name
            )));
        }
        state.role = role;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn set_active(&self, active: bool) {
        self.state.lock().active = active;
    }

    pub fn stream(&self) -> Option<StreamId> {
        self.state.lock().stream
    }

    pub fn set_stream(&self, stream: Option<StreamId>) {
        self.state.lock().stream = stream;
    }

    /// Announce a new stream downstream.
    ///
    /// Every call bumps the pad's instance counter, so each announcement
    /// (e.g. after a reconfiguration) carries a distinct stream id.
    pub fn push_stream_start(&self, group_id: u32) -> bool {
        let num = {
            let mut state = self.state.lock();
            state.stream_id_num += 1;
            state.stream_id_num
        };

        let stream_id = format!("{}/{}-{}", self.upstream_id, group_id, num);
        log::debug!("{}: stream-start {} (group {})", self.name, stream_id, group_id);
        self.sink.push_event(StreamEvent::StreamStart {
            stream_id,
            group_id,
        })
    }

    pub fn queue_buffer(&self, frame: FrameDescriptor) {
        self.pending.enqueue(frame);
    }

    /// Push the oldest pending frame downstream, if any.
    pub fn push_pending(&self) -> Result<(), FlowError> {
        self.pending.try_emit_one(|frame| self.sink.push(frame))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.has_pending()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Discard queued frames, e.g. when flushing. Returns how many were dropped.
    pub fn flush_pending(&self) -> usize {
        self.pending.clear()
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Always live. Min and max are equal since frame duration is unknown.
    pub fn query_latency(&self) -> LatencyInfo {
        let latency = self.state.lock().latency;
        LatencyInfo {
            live: true,
            min: latency,
            max: latency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::FrameStatus;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<FrameDescriptor>>,
        events: Mutex<Vec<StreamEvent>>,
    }

    impl FrameSink for RecordingSink {
        fn push(&self, frame: FrameDescriptor) -> Result<(), FlowError> {
            self.frames.lock().push(frame);
            Ok(())
        }

        fn push_event(&self, event: StreamEvent) -> bool {
            self.events.lock().push(event);
            true
        }
    }

    fn frame(index: u32, sequence: u32) -> FrameDescriptor {
        FrameDescriptor {
            index,
            bytes_used: 1024,
            timestamp: Duration::from_millis(sequence as u64 * 33),
            sequence,
            status: FrameStatus::Complete,
        }
    }

    #[test]
    fn role_defaults_to_video_recording() {
        let pad = StreamPad::new("src", Arc::new(RecordingSink::default()));
        assert_eq!(pad.role(), StreamRole::VideoRecording);
        assert_eq!(pad.name(), "src");

        let pad = pad.with_role(StreamRole::StillCapture);
        assert_eq!(pad.role(), StreamRole::StillCapture);
    }

    #[test]
    fn role_is_frozen_while_active() {
        let pad = StreamPad::new("src", Arc::new(RecordingSink::default()));
        pad.set_role(StreamRole::Viewfinder).unwrap();

        pad.set_active(true);
        let err = pad.set_role(StreamRole::StillCapture).unwrap_err();
        assert!(matches!(err, CaptureError::Config(_)));
        assert_eq!(pad.role(), StreamRole::Viewfinder);

        pad.set_active(false);
        pad.set_role(StreamRole::StillCapture).unwrap();
        assert_eq!(pad.role(), StreamRole::StillCapture);
    }

    #[test]
    fn stream_start_ids_are_unique() {
        let sink = Arc::new(RecordingSink::default());
        let pad = StreamPad::new("src", sink.clone());

        assert!(pad.push_stream_start(1));
        assert!(pad.push_stream_start(1));

        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        let ids: Vec<&str> = events
            .iter()
            .map(|e| match e {
                StreamEvent::StreamStart { stream_id, group_id } => {
                    assert_eq!(*group_id, 1);
                    stream_id.as_str()
                }
            })
            .collect();
        assert_ne!(ids[0], ids[1]);
        assert!(ids[0].ends_with("/1-1"));
        assert!(ids[1].ends_with("/1-2"));
    }

    #[test]
    fn pads_get_distinct_upstream_ids() {
        let sink = Arc::new(RecordingSink::default());
        let a = StreamPad::new("src_0", sink.clone());
        let b = StreamPad::new("src_1", sink.clone());
        a.push_stream_start(3);
        b.push_stream_start(3);

        let events = sink.events.lock();
        assert_ne!(events[0], events[1]);
    }

    #[test]
    fn latency_min_equals_max() {
        let pad = StreamPad::new("src", Arc::new(RecordingSink::default()));

        for latency in [Duration::ZERO, Duration::from_millis(33), Duration::from_secs(2)] {
            pad.set_latency(latency);
            let info = pad.query_latency();
            assert!(info.live);
            assert_eq!(info.min, latency);
            assert_eq!(info.max, latency);
        }
    }

    #[test]
    fn pushes_pending_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let pad = StreamPad::new("src", sink.clone());

        pad.queue_buffer(frame(0, 10));
        pad.queue_buffer(frame(1, 11));
        assert_eq!(pad.pending_len(), 2);

        pad.push_pending().unwrap();
        pad.push_pending().unwrap();
        // Nothing left: still succeeds.
        pad.push_pending().unwrap();

        let sequences: Vec<u32> = sink.frames.lock().iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![10, 11]);
        assert!(!pad.has_pending());
    }

    #[test]
    fn flush_drops_pending() {
        let sink = Arc::new(RecordingSink::default());
        let pad = StreamPad::new("src", sink.clone());
        pad.queue_buffer(frame(0, 0));

        assert_eq!(pad.flush_pending(), 1);
        pad.push_pending().unwrap();
        assert!(sink.frames.lock().is_empty());
    }
}
