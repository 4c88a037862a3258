/// Streaming state of a capture session.
///
/// ```text
/// idle ──start()──→ running
///  ↑                   │
///  └─────stop()────────┘
/// ```
///
/// Requests submitted while idle are held back and flushed, in order, on the
/// transition to running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}
