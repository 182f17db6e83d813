//! # Capture Controller
//!
//! Sequences camera permission, stream lifecycle, device selection and the
//! per-frame decode loop. The legal transitions themselves live in
//! [`CaptureMachine`]; this module performs the I/O around them.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start_capture()                                                        │
//! │     │  probe (if permission unknown) ─► open + stop probe stream       │
//! │     │  video_inputs() ─► select_device() ─► open(device)               │
//! │     ▼                                                                   │
//! │  spawn session task ──────────────────────────────────────────┐        │
//! │     │                                                          │        │
//! │     │   loop { next_frame ─► decode ─► ScanGate::offer }       │        │
//! │     │        │ first result ─► CaptureEvent::Decoded ─► end    │        │
//! │     │        │ stream error ─► CaptureEvent::Failed  ─► end    │        │
//! │     │        │ stop signal  ─────────────────────────► end     │        │
//! │     │                                                          │        │
//! │     └─ every exit: stream.stop(), gate dropped ◄───────────────┘        │
//! │                                                                         │
//! │  stop_capture()  signal + join the task. No-op when nothing runs.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use provenance_core::capture::{select_device, CaptureMachine, ScanGate, StreamConstraints};
use provenance_core::{
    CaptureError, CaptureState, ErrorKind, PermissionStatus, ScanResult, VideoDevice,
};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{CameraBackend, Frame, PlatformFailure, VideoStream};
use crate::decoder::BarcodeDecoder;

/// Result type alias for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Events emitted by capture sessions.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// The single result of a session.
    Decoded { session_id: Uuid, result: ScanResult },
    /// The stream failed while running.
    Failed { session_id: Uuid, error: CaptureError },
}

struct ActiveSession {
    id: Uuid,
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns the camera stream and the decoder for one scanner.
///
/// ## Usage
/// ```rust,ignore
/// let (controller, mut events) = CaptureController::new(backend, Arc::new(RxingDecoder));
///
/// controller.request_permission().await?;
/// controller.start_capture().await?;
///
/// if let Some(CaptureEvent::Decoded { result, .. }) = events.recv().await {
///     println!("{}", result.text);
/// }
/// controller.stop_capture().await;
/// ```
pub struct CaptureController {
    backend: Arc<dyn CameraBackend>,
    decoder: Arc<dyn BarcodeDecoder>,
    machine: Arc<RwLock<CaptureMachine>>,
    session: Mutex<Option<ActiveSession>>,
    events_tx: mpsc::Sender<CaptureEvent>,
}

impl CaptureController {
    /// Creates a controller and the receiver its sessions report to.
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        decoder: Arc<dyn BarcodeDecoder>,
    ) -> (Self, mpsc::Receiver<CaptureEvent>) {
        let (events_tx, events_rx) = mpsc::channel::<CaptureEvent>(16);
        let machine = CaptureMachine::new(backend.is_embedded());

        let controller = CaptureController {
            backend,
            decoder,
            machine: Arc::new(RwLock::new(machine)),
            session: Mutex::new(None),
            events_tx,
        };

        (controller, events_rx)
    }

    /// Returns the current capture state.
    pub async fn state(&self) -> CaptureState {
        self.machine.read().await.state().clone()
    }

    /// Returns what is known about camera permission.
    pub async fn permission(&self) -> PermissionStatus {
        self.machine.read().await.permission()
    }

    // =========================================================================
    // Permission
    // =========================================================================

    /// Asks for camera access by opening and immediately releasing a probe
    /// stream. No continuous capture is started.
    pub async fn request_permission(&self) -> CaptureResult<()> {
        let _session = self.session.lock().await;
        self.probe().await
    }

    async fn probe(&self) -> CaptureResult<()> {
        let begun = self.machine.write().await.begin_permission_request();
        if let Err(e) = begun {
            // Only possible while streaming, which implies permission
            debug!(error = %e, "Permission request skipped");
            return Ok(());
        }

        match self.backend.open(&StreamConstraints::probe()).await {
            Ok(mut stream) => {
                stream.stop().await;
                self.machine
                    .write()
                    .await
                    .permission_granted()
                    .map_err(|e| self.unexpected(e.to_string()))?;
                info!("Camera permission granted");
                Ok(())
            }
            Err(failure) => Err(self.fail(failure).await),
        }
    }

    // =========================================================================
    // Continuous Capture
    // =========================================================================

    /// Starts continuous capture on the preferred camera.
    ///
    /// Returns the session id. Calling this while a session is streaming
    /// returns the running session's id.
    pub async fn start_capture(&self) -> CaptureResult<Uuid> {
        let mut session = self.session.lock().await;

        if let Some(active) = session.as_ref() {
            if self.machine.read().await.state().is_streaming() && !active.task.is_finished() {
                debug!(session_id = %active.id, "Capture already running");
                return Ok(active.id);
            }
        }
        // A previous session that ended on its own
        if let Some(finished) = session.take() {
            Self::join(finished).await;
        }

        if self.machine.read().await.permission() != PermissionStatus::Granted {
            self.probe().await?;
        } else {
            self.machine.write().await.reset();
        }

        let devices = match self.backend.video_inputs().await {
            Ok(devices) => devices,
            Err(failure) => return Err(self.fail(failure).await),
        };
        let Some(device) = select_device(&devices) else {
            return Err(self
                .fail(PlatformFailure::new(
                    ErrorKind::NoCameraFound,
                    "no video inputs reported",
                ))
                .await);
        };
        info!(device = %device.id, label = %device.label, "Opening camera");

        let mut stream = match self.backend.open(&StreamConstraints::for_device(device)).await {
            Ok(stream) => stream,
            Err(failure) => return Err(self.fail(failure).await),
        };

        let started = self.machine.write().await.begin_streaming();
        if let Err(e) = started {
            stream.stop().await;
            return Err(self.unexpected(e.to_string()));
        }

        let id = Uuid::new_v4();
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(run_session(
            id,
            stream,
            self.decoder.clone(),
            self.machine.clone(),
            self.events_tx.clone(),
            stop_rx,
        ));

        info!(session_id = %id, "Capture started");
        *session = Some(ActiveSession { id, stop_tx, task });
        Ok(id)
    }

    /// Stops capture and releases the camera. Safe to call at any time,
    /// any number of times.
    ///
    /// An Error state is left in place so the message stays visible.
    pub async fn stop_capture(&self) {
        let Some(active) = self.session.lock().await.take() else {
            debug!("Stop requested with no active session");
            return;
        };

        let id = active.id;
        Self::join(active).await;
        self.machine.write().await.stream_ended();
        info!(session_id = %id, "Capture stopped");
    }

    async fn join(session: ActiveSession) {
        // The task may already have exited and dropped its receiver
        let _ = session.stop_tx.try_send(());
        if let Err(e) = session.task.await {
            warn!(session_id = %session.id, error = %e, "Capture task did not exit cleanly");
        }
    }

    /// Lists cameras without touching capture state.
    pub async fn video_inputs(&self) -> CaptureResult<Vec<VideoDevice>> {
        let embedded = self.backend.is_embedded();
        self.backend
            .video_inputs()
            .await
            .map_err(|f| CaptureError::new(f.kind, embedded).with_detail(f.detail))
    }

    // =========================================================================
    // Still Images
    // =========================================================================

    /// Decodes a barcode from an image file. Needs no camera permission and
    /// never changes capture state.
    pub async fn decode_from_image(&self, path: &Path) -> CaptureResult<ScanResult> {
        let bytes = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || std::fs::read(path)
        })
        .await
        .map_err(|e| CaptureError::decode_failed().with_detail(e.to_string()))?
        .map_err(|e| CaptureError::decode_failed().with_detail(e.to_string()))?;

        self.decode_image_bytes(bytes).await
    }

    /// Decodes a barcode from encoded image bytes (PNG, JPEG, ...).
    pub async fn decode_image_bytes(&self, bytes: Vec<u8>) -> CaptureResult<ScanResult> {
        let decoder = self.decoder.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            let frame = Frame::from_encoded(&bytes).map_err(|e| e.to_string())?;
            Ok::<_, String>(decoder.decode(&frame))
        })
        .await
        .map_err(|e| CaptureError::decode_failed().with_detail(e.to_string()))?
        .map_err(|e| CaptureError::decode_failed().with_detail(e))?;

        let decoded = decoded.ok_or_else(CaptureError::decode_failed)?;
        ScanResult::new(decoded.text, decoded.format)
            .map_err(|e| CaptureError::decode_failed().with_detail(e.to_string()))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn fail(&self, failure: PlatformFailure) -> CaptureError {
        warn!(kind = %failure.kind, detail = %failure.detail, "Camera operation failed");
        self.machine
            .write()
            .await
            .fail(failure.kind, Some(failure.detail))
    }

    fn unexpected(&self, detail: String) -> CaptureError {
        CaptureError::new(ErrorKind::Unknown, self.backend.is_embedded()).with_detail(detail)
    }
}

/// How a session ended.
enum Outcome {
    Stopped,
    Ended,
    Decoded(ScanResult),
    Failed(PlatformFailure),
}

/// Runs one capture session until it decodes, fails or is stopped.
///
/// The stream is released and the state settled before anything is
/// reported, so a listener never sees a result while the camera is held.
async fn run_session(
    id: Uuid,
    mut stream: Box<dyn VideoStream>,
    decoder: Arc<dyn BarcodeDecoder>,
    machine: Arc<RwLock<CaptureMachine>>,
    events: mpsc::Sender<CaptureEvent>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    let mut gate = ScanGate::armed();

    let outcome = loop {
        tokio::select! {
            _ = stop_rx.recv() => break Outcome::Stopped,
            frame = stream.next_frame() => match frame {
                Ok(Some(frame)) => {
                    let decoder = decoder.clone();
                    let decoded = tokio::task::spawn_blocking(move || decoder.decode(&frame))
                        .await
                        .ok()
                        .flatten();

                    let Some(decoded) = decoded else { continue };
                    if let Some(result) = gate.offer(&decoded.text, decoded.format) {
                        break Outcome::Decoded(result);
                    }
                }
                Ok(None) => break Outcome::Ended,
                Err(f) => break Outcome::Failed(f),
            }
        }
    };

    stream.stop().await;

    let event = match outcome {
        Outcome::Stopped => {
            debug!(session_id = %id, "Stop signal received");
            machine.write().await.stream_ended();
            None
        }
        Outcome::Ended => {
            debug!(session_id = %id, "Stream ended");
            machine.write().await.stream_ended();
            None
        }
        Outcome::Decoded(result) => {
            info!(session_id = %id, text = %result.text, "Barcode decoded");
            machine.write().await.stream_ended();
            Some(CaptureEvent::Decoded {
                session_id: id,
                result,
            })
        }
        Outcome::Failed(f) => {
            warn!(session_id = %id, kind = %f.kind, detail = %f.detail, "Stream failed");
            let error = machine.write().await.fail(f.kind, Some(f.detail));
            Some(CaptureEvent::Failed {
                session_id: id,
                error,
            })
        }
    };

    if let Some(event) = event {
        if events.send(event).await.is_err() {
            debug!(session_id = %id, "No listener for capture events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::UnavailableBackend;
    use crate::decoder::{Decoded, RxingDecoder};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    /// Frames whose pixels spell ASCII digits decode to those digits.
    struct DigitDecoder;

    impl BarcodeDecoder for DigitDecoder {
        fn decode(&self, frame: &Frame) -> Option<Decoded> {
            if frame.luma.is_empty() || !frame.luma.iter().all(u8::is_ascii_digit) {
                return None;
            }
            Some(Decoded {
                text: String::from_utf8(frame.luma.clone()).ok()?,
                format: Some("EAN_13".into()),
            })
        }
    }

    fn code(text: &str) -> Frame {
        Frame::new(text.len() as u32, 1, text.as_bytes().to_vec())
    }

    fn blank() -> Frame {
        Frame::new(1, 1, vec![0])
    }

    struct FakeStream {
        frames: VecDeque<Result<Frame, PlatformFailure>>,
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VideoStream for FakeStream {
        async fn next_frame(&mut self) -> Result<Option<Frame>, PlatformFailure> {
            match self.frames.pop_front() {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(f)) => Err(f),
                // A live camera never runs out on its own
                None => std::future::pending().await,
            }
        }

        async fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        embedded: bool,
        devices: Vec<VideoDevice>,
        frames: Vec<Result<Frame, PlatformFailure>>,
        open_error: Option<PlatformFailure>,
        opens: AtomicUsize,
        stops: Arc<AtomicUsize>,
        last_device: std::sync::Mutex<Option<String>>,
    }

    impl FakeBackend {
        fn with_frames(frames: Vec<Result<Frame, PlatformFailure>>) -> Self {
            FakeBackend {
                devices: vec![
                    VideoDevice::new("front", "FaceTime HD Camera"),
                    VideoDevice::new("rear", "Back Camera"),
                ],
                frames,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CameraBackend for FakeBackend {
        fn is_embedded(&self) -> bool {
            self.embedded
        }

        async fn video_inputs(&self) -> Result<Vec<VideoDevice>, PlatformFailure> {
            Ok(self.devices.clone())
        }

        async fn open(
            &self,
            constraints: &StreamConstraints,
        ) -> Result<Box<dyn VideoStream>, PlatformFailure> {
            if let Some(f) = &self.open_error {
                return Err(f.clone());
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            *self.last_device.lock().unwrap() = constraints.device_id.clone();
            Ok(Box::new(FakeStream {
                frames: self.frames.clone().into(),
                stops: self.stops.clone(),
            }))
        }
    }

    fn setup(
        backend: FakeBackend,
    ) -> (CaptureController, mpsc::Receiver<CaptureEvent>, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let (controller, events) = CaptureController::new(backend.clone(), Arc::new(DigitDecoder));
        (controller, events, backend)
    }

    async fn next_event(events: &mut mpsc::Receiver<CaptureEvent>) -> Option<CaptureEvent> {
        tokio::time::timeout(Duration::from_millis(200), events.recv())
            .await
            .ok()
            .flatten()
    }

    // -------------------------------------------------------------------------
    // Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_permission_probe_releases_stream() {
        let (controller, _events, backend) = setup(FakeBackend::with_frames(vec![]));

        controller.request_permission().await.unwrap();

        assert_eq!(controller.permission().await, PermissionStatus::Granted);
        assert_eq!(controller.state().await, CaptureState::Idle);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_decode_emits_once() {
        let (controller, mut events, backend) = setup(FakeBackend::with_frames(vec![
            Ok(blank()),
            Ok(code("3017620425035")),
            Ok(code("3017620425035")),
            Ok(code("8901030810033")),
        ]));

        let id = controller.start_capture().await.unwrap();

        match next_event(&mut events).await {
            Some(CaptureEvent::Decoded { session_id, result }) => {
                assert_eq!(session_id, id);
                assert_eq!(result.text, "3017620425035");
                assert_eq!(result.format.as_deref(), Some("EAN_13"));
            }
            other => panic!("expected a decode, got {:?}", other),
        }
        // Released and idle by the time the result arrives
        assert_eq!(controller.state().await, CaptureState::Idle);
        // Probe stream + session stream, each released once
        assert_eq!(backend.stops.load(Ordering::SeqCst), 2);

        assert!(next_event(&mut events).await.is_none());
        controller.stop_capture().await;
        assert_eq!(backend.stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_restart_rearms_gate() {
        let (controller, mut events, _backend) =
            setup(FakeBackend::with_frames(vec![Ok(code("0012000171901"))]));

        controller.start_capture().await.unwrap();
        assert!(matches!(next_event(&mut events).await, Some(CaptureEvent::Decoded { .. })));

        controller.start_capture().await.unwrap();
        assert!(matches!(next_event(&mut events).await, Some(CaptureEvent::Decoded { .. })));
    }

    #[tokio::test]
    async fn test_prefers_rear_camera() {
        let (controller, _events, backend) = setup(FakeBackend::with_frames(vec![]));
        controller.start_capture().await.unwrap();
        assert_eq!(backend.last_device.lock().unwrap().as_deref(), Some("rear"));
        controller.stop_capture().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (controller, _events, backend) = setup(FakeBackend::with_frames(vec![]));

        // Nothing running yet
        controller.stop_capture().await;
        assert_eq!(controller.state().await, CaptureState::Idle);

        controller.start_capture().await.unwrap();
        assert!(controller.state().await.is_streaming());

        controller.stop_capture().await;
        controller.stop_capture().await;
        assert_eq!(controller.state().await, CaptureState::Idle);
        assert_eq!(backend.stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_start_while_streaming_returns_same_session() {
        let (controller, _events, backend) = setup(FakeBackend::with_frames(vec![]));

        let first = controller.start_capture().await.unwrap();
        let second = controller.start_capture().await.unwrap();
        assert_eq!(first, second);
        // One probe, one stream
        assert_eq!(backend.opens.load(Ordering::SeqCst), 2);

        controller.stop_capture().await;
    }

    #[tokio::test]
    async fn test_denied_permission_in_frame() {
        let (controller, _events, _backend) = setup(FakeBackend {
            embedded: true,
            open_error: Some(PlatformFailure::from_platform_name(
                "NotAllowedError",
                "Permission dismissed",
            )),
            ..FakeBackend::with_frames(vec![])
        });

        let err = controller.request_permission().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
        assert!(err.offers_retry());
        assert!(err.offers_open_in_new_tab());
        assert_eq!(err.detail.as_deref(), Some("Permission dismissed"));

        assert_eq!(controller.permission().await, PermissionStatus::Denied);
        assert_eq!(controller.state().await.error(), Some(&err));

        // Stopping leaves the error visible
        controller.stop_capture().await;
        assert!(controller.state().await.error().is_some());
    }

    #[tokio::test]
    async fn test_no_devices() {
        let (controller, _events, _backend) = setup(FakeBackend::default());
        let err = controller.start_capture().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoCameraFound);
        assert!(!err.offers_open_in_new_tab());
    }

    #[tokio::test]
    async fn test_stream_failure_is_reported() {
        let (controller, mut events, backend) = setup(FakeBackend::with_frames(vec![
            Ok(blank()),
            Err(PlatformFailure::new(ErrorKind::Unknown, "device unplugged")),
        ]));

        let id = controller.start_capture().await.unwrap();
        match next_event(&mut events).await {
            Some(CaptureEvent::Failed { session_id, error }) => {
                assert_eq!(session_id, id);
                assert_eq!(error.kind, ErrorKind::Unknown);
            }
            other => panic!("expected a failure, got {:?}", other),
        }

        controller.stop_capture().await;
        assert_eq!(backend.stops.load(Ordering::SeqCst), 2);
        assert!(controller.state().await.error().is_some());

        // Retry from the error state
        controller.request_permission().await.unwrap();
        assert_eq!(controller.state().await, CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_unavailable_backend_reports_unsupported() {
        let (controller, _events) =
            CaptureController::new(Arc::new(UnavailableBackend), Arc::new(DigitDecoder));
        let err = controller.start_capture().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedBrowser);
        assert!(controller.video_inputs().await.is_err());
    }

    fn png_of(pixels: &[u8]) -> Vec<u8> {
        let gray = image::GrayImage::from_raw(pixels.len() as u32, 1, pixels.to_vec()).unwrap();
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(gray)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_decode_from_image_without_camera() {
        let (controller, _events) =
            CaptureController::new(Arc::new(UnavailableBackend), Arc::new(DigitDecoder));

        let result = controller
            .decode_image_bytes(png_of(b"4006381333931"))
            .await
            .unwrap();
        assert_eq!(result.text, "4006381333931");
        assert_eq!(controller.state().await, CaptureState::Idle);

        let err = controller.decode_image_bytes(png_of(&[0, 0, 0])).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecodeFailed);

        let err = controller.decode_image_bytes(b"junk".to_vec()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecodeFailed);

        // Camera state is untouched by still-image failures
        assert_eq!(controller.state().await, CaptureState::Idle);
        assert_eq!(controller.permission().await, PermissionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_decode_photo_with_real_decoder() {
        use rxing::{BarcodeFormat, MultiFormatWriter, Writer};

        let matrix = MultiFormatWriter
            .encode("3017620425035", &BarcodeFormat::EAN_13, 400, 150)
            .unwrap();
        let photo = image::GrayImage::from_fn(matrix.width(), matrix.height(), |x, y| {
            image::Luma([if matrix.get(x, y) { 0 } else { 255 }])
        });
        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(photo)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();

        let (controller, _events) =
            CaptureController::new(Arc::new(UnavailableBackend), Arc::new(RxingDecoder));
        let result = controller.decode_image_bytes(png.into_inner()).await.unwrap();

        assert_eq!(result.text, "3017620425035");
        assert_eq!(result.format.as_deref(), Some("EAN_13"));
        assert_eq!(controller.state().await, CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_decode_from_missing_file() {
        let (controller, _events) =
            CaptureController::new(Arc::new(UnavailableBackend), Arc::new(DigitDecoder));
        let err = controller
            .decode_from_image(Path::new("/nonexistent/barcode.png"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecodeFailed);
        assert!(err.detail.is_some());
    }
}
