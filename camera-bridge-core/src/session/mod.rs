pub mod controller;
pub mod stream_pad;
