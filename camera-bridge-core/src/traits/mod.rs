pub mod camera_engine;
pub mod frame_sink;
