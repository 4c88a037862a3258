use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Usage profile used to pick an engine configuration for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamRole {
    #[serde(rename = "still-capture")]
    StillCapture,
    #[serde(rename = "video-recording")]
    VideoRecording,
    #[serde(rename = "view-finder")]
    Viewfinder,
}

impl StreamRole {
    pub fn nick(&self) -> &'static str {
        match self {
            Self::StillCapture => "still-capture",
            Self::VideoRecording => "video-recording",
            Self::Viewfinder => "view-finder",
        }
    }
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nick())
    }
}

impl FromStr for StreamRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "still-capture" => Ok(Self::StillCapture),
            "video-recording" => Ok(Self::VideoRecording),
            "view-finder" => Ok(Self::Viewfinder),
            other => Err(format!("unknown stream role: {other}")),
        }
    }
}

/// Engine-assigned identifier of a configured stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// FourCC pixel format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat([u8; 4]);

impl PixelFormat {
    pub const NV12: Self = Self(*b"NV12");
    pub const YUYV: Self = Self(*b"YUYV");
    pub const MJPEG: Self = Self(*b"MJPG");
    pub const RGB888: Self = Self(*b"RG24");

    pub const fn new(code: [u8; 4]) -> Self {
        Self(code)
    }

    /// Little-endian u32 encoding, as used by V4L2.
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Approximate bytes per frame for the given size.
    pub fn frame_size(self, size: Size) -> u32 {
        let pixels = size.width.saturating_mul(size.height);
        match &self.0 {
            b"NV12" => pixels.saturating_mul(3) / 2,
            b"YUYV" => pixels.saturating_mul(2),
            b"RG24" => pixels.saturating_mul(3),
            // Compressed: worst case is the raw 4:2:2 size.
            _ => pixels.saturating_mul(2),
        }
    }
}

impl From<u32> for PixelFormat {
    fn from(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "0x{:08x}", self.to_u32()),
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| format!("fourcc must be four ASCII bytes: {s:?}"))?;
        Ok(Self(bytes))
    }
}

/// Negotiated format of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfiguration {
    pub size: Size,
    pub pixel_format: PixelFormat,
    pub buffer_count: u32,
    /// Set by the engine once the configuration has been applied.
    pub stream: Option<StreamId>,
}

impl fmt::Display for StreamConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} ({} buffers)", self.size, self.pixel_format, self.buffer_count)
    }
}

/// Outcome of validating a configuration against hardware capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    /// Values were coerced to a supported configuration; still usable.
    Adjusted,
    Invalid,
}

/// Ordered set of stream configurations for one camera.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CameraConfiguration {
    streams: Vec<StreamConfiguration>,
}

impl CameraConfiguration {
    pub fn new(streams: Vec<StreamConfiguration>) -> Self {
        Self { streams }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StreamConfiguration> {
        self.streams.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut StreamConfiguration> {
        self.streams.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamConfiguration> {
        self.streams.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StreamConfiguration> {
        self.streams.iter_mut()
    }
}

/// Zero-copy handle to an engine-allocated buffer slot.
///
/// Wraps the dmabuf file descriptor number; the engine keeps ownership of the
/// descriptor and the memory behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(i32);

impl BufferHandle {
    pub const fn new(fd: i32) -> Self {
        Self(fd)
    }

    pub fn as_raw_fd(&self) -> i32 {
        self.0
    }
}
