//! # V4L2 Backend
//!
//! Linux camera access. Devices are enumerated from sysfs; capture runs on a
//! dedicated thread through `rscam` (feature `v4l`).
//!
//! ## Capture Thread
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open()                                                                 │
//! │    └─ spawn "v4l-capture" thread                                        │
//! │          Camera::new(/dev/videoN) + start(YUYV, 30 fps)                │
//! │          ├── Err ──► ready channel ──► open() returns PlatformFailure  │
//! │          └── Ok  ──► ready channel ──► open() returns V4lStream        │
//! │                loop { capture() ─► Y plane ─► frames channel (cap 2) } │
//! │                until stop flag / receiver closed / capture error       │
//! │                                                                         │
//! │  V4lStream::stop()  flag + close channel + join thread (camera freed)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::io;
use std::path::Path;

use provenance_core::VideoDevice;

/// Where the kernel lists video devices.
pub const SYSFS_ROOT: &str = "/sys/class/video4linux";

/// Device opened when no specific camera was selected.
pub const DEFAULT_DEVICE: &str = "/dev/video0";

/// Lists capture nodes under `root`.
///
/// A camera usually exposes a metadata node next to its capture node; only
/// nodes with `index` 0 are kept. A missing `root` means no cameras.
pub fn list_sysfs_devices(root: &Path) -> io::Result<Vec<VideoDevice>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut nodes: Vec<(u32, VideoDevice)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(number) = name
            .strip_prefix("video")
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };

        let path = entry.path();
        let index = read_trimmed(&path.join("index"));
        if index.as_deref().is_some_and(|i| i != "0") {
            continue;
        }

        let label = read_trimmed(&path.join("name")).unwrap_or_default();
        nodes.push((number, VideoDevice::new(format!("/dev/{}", name), label)));
    }

    nodes.sort_by_key(|(number, _)| *number);
    Ok(nodes.into_iter().map(|(_, device)| device).collect())
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

#[cfg(feature = "v4l")]
pub use self::camera::{V4lBackend, V4lStream};

#[cfg(feature = "v4l")]
mod camera {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use provenance_core::capture::StreamConstraints;
    use provenance_core::{ErrorKind, VideoDevice};
    use tokio::sync::{mpsc, oneshot};
    use tracing::{debug, warn};

    use super::{list_sysfs_devices, DEFAULT_DEVICE, SYSFS_ROOT};
    use crate::backend::{CameraBackend, Frame, PlatformFailure, VideoStream};

    /// Resolution tried when the requested one is refused.
    const FALLBACK_RESOLUTION: (u32, u32) = (640, 480);

    type FrameResult = Result<Frame, PlatformFailure>;

    /// Cameras exposed through V4L2.
    #[derive(Debug, Clone)]
    pub struct V4lBackend {
        sysfs_root: PathBuf,
    }

    impl Default for V4lBackend {
        fn default() -> Self {
            V4lBackend {
                sysfs_root: PathBuf::from(SYSFS_ROOT),
            }
        }
    }

    #[async_trait]
    impl CameraBackend for V4lBackend {
        async fn video_inputs(&self) -> Result<Vec<VideoDevice>, PlatformFailure> {
            let root = self.sysfs_root.clone();
            tokio::task::spawn_blocking(move || list_sysfs_devices(&root))
                .await
                .map_err(|e| PlatformFailure::new(ErrorKind::Unknown, e.to_string()))?
                .map_err(PlatformFailure::from)
        }

        async fn open(
            &self,
            constraints: &StreamConstraints,
        ) -> Result<Box<dyn VideoStream>, PlatformFailure> {
            let path = constraints
                .device_id
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string());
            let resolution = (constraints.ideal_width, constraints.ideal_height);

            let (ready_tx, ready_rx) = oneshot::channel();
            let (frames_tx, frames_rx) = mpsc::channel::<FrameResult>(2);
            let running = Arc::new(AtomicBool::new(true));

            let worker = std::thread::Builder::new()
                .name("v4l-capture".into())
                .spawn({
                    let running = running.clone();
                    move || capture_loop(path, resolution, ready_tx, frames_tx, running)
                })
                .map_err(PlatformFailure::from)?;

            match ready_rx.await {
                Ok(Ok(())) => Ok(Box::new(V4lStream {
                    frames_rx,
                    running,
                    worker: Some(worker),
                })),
                Ok(Err(failure)) => Err(failure),
                Err(_) => Err(PlatformFailure::new(
                    ErrorKind::Unknown,
                    "capture thread exited before opening the camera",
                )),
            }
        }
    }

    /// A running V4L2 capture.
    pub struct V4lStream {
        frames_rx: mpsc::Receiver<FrameResult>,
        running: Arc<AtomicBool>,
        worker: Option<std::thread::JoinHandle<()>>,
    }

    #[async_trait]
    impl VideoStream for V4lStream {
        async fn next_frame(&mut self) -> Result<Option<Frame>, PlatformFailure> {
            match self.frames_rx.recv().await {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(failure)) => Err(failure),
                None => Ok(None),
            }
        }

        async fn stop(&mut self) {
            self.running.store(false, Ordering::Release);
            self.frames_rx.close();

            if let Some(worker) = self.worker.take() {
                if tokio::task::spawn_blocking(move || worker.join())
                    .await
                    .map(|joined| joined.is_err())
                    .unwrap_or(true)
                {
                    warn!("Capture thread panicked");
                }
            }
        }
    }

    impl Drop for V4lStream {
        fn drop(&mut self) {
            self.running.store(false, Ordering::Release);
        }
    }

    fn open_camera(path: &str, resolution: (u32, u32)) -> Result<rscam::Camera, PlatformFailure> {
        match start_camera(path, resolution) {
            Err(rscam::Error::BadResolution) if resolution != FALLBACK_RESOLUTION => {
                debug!(?resolution, "Resolution refused, falling back");
                start_camera(path, FALLBACK_RESOLUTION).map_err(classify)
            }
            other => other.map_err(classify),
        }
    }

    fn start_camera(path: &str, resolution: (u32, u32)) -> Result<rscam::Camera, rscam::Error> {
        let mut camera = rscam::Camera::new(path)?;
        camera.start(&rscam::Config {
            interval: (1, 30),
            resolution,
            format: b"YUYV",
            ..Default::default()
        })?;
        Ok(camera)
    }

    fn classify(err: rscam::Error) -> PlatformFailure {
        match err {
            rscam::Error::Io(e) => PlatformFailure::from(e),
            // The device exists but cannot satisfy the request
            other => PlatformFailure::new(ErrorKind::NoCameraFound, other.to_string()),
        }
    }

    fn capture_loop(
        path: String,
        resolution: (u32, u32),
        ready_tx: oneshot::Sender<Result<(), PlatformFailure>>,
        frames_tx: mpsc::Sender<FrameResult>,
        running: Arc<AtomicBool>,
    ) {
        let mut camera = match open_camera(&path, resolution) {
            Ok(camera) => {
                let _ = ready_tx.send(Ok(()));
                camera
            }
            Err(failure) => {
                let _ = ready_tx.send(Err(failure));
                return;
            }
        };
        debug!(device = %path, "Camera streaming");

        while running.load(Ordering::Acquire) {
            let result = camera
                .capture()
                .map(|raw| {
                    let (width, height) = raw.resolution;
                    Frame::from_yuyv(width, height, &raw)
                })
                .map_err(PlatformFailure::from);

            let failed = result.is_err();
            if frames_tx.blocking_send(result).is_err() || failed {
                break;
            }
        }

        drop(camera);
        debug!(device = %path, "Camera released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(root: &Path, name: &str, label: &str, index: Option<&str>) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("name"), format!("{}\n", label)).unwrap();
        if let Some(index) = index {
            std::fs::write(dir.join("index"), format!("{}\n", index)).unwrap();
        }
    }

    #[test]
    fn test_lists_capture_nodes_in_order() {
        let root = tempfile::tempdir().unwrap();
        node(root.path(), "video10", "USB Camera", Some("0"));
        node(root.path(), "video2", "Integrated Camera: Back", Some("0"));
        node(root.path(), "video3", "Integrated Camera: Back", Some("1"));
        node(root.path(), "video0", "Integrated Camera: Front", None);
        node(root.path(), "v4l-subdev0", "sensor", None);

        let devices = list_sysfs_devices(root.path()).unwrap();
        let ids: Vec<_> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["/dev/video0", "/dev/video2", "/dev/video10"]);
        assert_eq!(devices[1].label, "Integrated Camera: Back");
    }

    #[test]
    fn test_missing_root_means_no_cameras() {
        let root = tempfile::tempdir().unwrap();
        let devices = list_sysfs_devices(&root.path().join("absent")).unwrap();
        assert!(devices.is_empty());
    }
}
