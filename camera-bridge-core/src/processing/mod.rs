pub mod completion_signal;
pub mod pending_queue;
