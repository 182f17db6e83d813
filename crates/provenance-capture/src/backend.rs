//! # Camera Backends
//!
//! The platform seam of the capture controller. A backend lists video inputs
//! and opens streams; a stream hands out frames until it is stopped.
//!
//! Platform failures never cross this seam raw: every backend classifies its
//! errors into a [`PlatformFailure`] carrying an [`ErrorKind`].
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UnavailableBackend   always            every call: UnsupportedBrowser │
//! │  V4lBackend           feature = "v4l"   /dev/videoN via rscam (YUYV)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use provenance_core::capture::StreamConstraints;
use provenance_core::{ErrorKind, VideoDevice};
use thiserror::Error;

// =============================================================================
// Frames
// =============================================================================

/// One grayscale frame, row-major, one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Self {
        Frame {
            width,
            height,
            luma,
        }
    }

    /// Extracts the Y plane from packed YUYV (Y0 U Y1 V) data.
    pub fn from_yuyv(width: u32, height: u32, data: &[u8]) -> Self {
        let luma = data.iter().step_by(2).copied().collect();
        Frame::new(width, height, luma)
    }

    /// Converts any decoded image to grayscale.
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let gray = image.to_luma8();
        Frame::new(gray.width(), gray.height(), gray.into_raw())
    }

    /// Decodes PNG, JPEG or any other format `image` understands.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, image::ImageError> {
        Ok(Frame::from_image(&image::load_from_memory(bytes)?))
    }

    /// True when the buffer does not match the declared size.
    pub fn is_truncated(&self) -> bool {
        self.luma.len() < (self.width as usize) * (self.height as usize)
    }
}

// =============================================================================
// Platform Failure
// =============================================================================

/// A classified platform error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct PlatformFailure {
    pub kind: ErrorKind,
    /// Raw platform text, kept for logs.
    pub detail: String,
}

impl PlatformFailure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        PlatformFailure {
            kind,
            detail: detail.into(),
        }
    }

    /// Classifies a named platform exception (e.g. "NotAllowedError").
    pub fn from_platform_name(name: &str, detail: impl Into<String>) -> Self {
        PlatformFailure::new(ErrorKind::from_platform_name(name), detail)
    }
}

/// ENODEV on Linux.
const NO_SUCH_DEVICE: i32 = 19;

impl From<std::io::Error> for PlatformFailure {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => ErrorKind::NoCameraFound,
            _ if err.raw_os_error() == Some(NO_SUCH_DEVICE) => ErrorKind::NoCameraFound,
            _ => ErrorKind::Unknown,
        };
        PlatformFailure::new(kind, err.to_string())
    }
}

// =============================================================================
// Backend Traits
// =============================================================================

/// A live video stream.
#[async_trait]
pub trait VideoStream: Send {
    /// Waits for the next frame. `Ok(None)` means the stream ended.
    async fn next_frame(&mut self) -> Result<Option<Frame>, PlatformFailure>;

    /// Releases the device. Must be safe to call more than once.
    async fn stop(&mut self);
}

/// Access to the platform's cameras.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Whether the app runs framed inside another page. Changes the denial
    /// message only.
    fn is_embedded(&self) -> bool {
        false
    }

    /// Lists video inputs. Labels may be empty before permission is granted.
    async fn video_inputs(&self) -> Result<Vec<VideoDevice>, PlatformFailure>;

    /// Opens a stream matching `constraints`.
    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, PlatformFailure>;
}

// =============================================================================
// Unavailable Backend
// =============================================================================

/// Backend used when no camera support is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBackend;

impl UnavailableBackend {
    fn failure() -> PlatformFailure {
        PlatformFailure::new(
            ErrorKind::UnsupportedBrowser,
            "no camera backend in this build",
        )
    }
}

#[async_trait]
impl CameraBackend for UnavailableBackend {
    async fn video_inputs(&self) -> Result<Vec<VideoDevice>, PlatformFailure> {
        Err(Self::failure())
    }

    async fn open(
        &self,
        _constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, PlatformFailure> {
        Err(Self::failure())
    }
}

/// The best backend this build supports.
pub fn default_backend() -> std::sync::Arc<dyn CameraBackend> {
    #[cfg(feature = "v4l")]
    {
        std::sync::Arc::new(crate::v4l::V4lBackend::default())
    }
    #[cfg(not(feature = "v4l"))]
    {
        std::sync::Arc::new(UnavailableBackend)
    }
}
