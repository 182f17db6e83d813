//! # Capture State Machine
//!
//! The pure half of the capture controller: which transitions are legal,
//! how permission is tracked, which camera to prefer, and the single-shot
//! gate that guarantees one emission per activation.
//!
//! The I/O half (opening streams, running the decode loop) lives in
//! `provenance-capture` and drives this machine.
//!
//! ## Permission Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  User taps "Start Scanning"                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  begin_permission_request()    Idle ──► RequestingPermission           │
//! │       │                                                                 │
//! │       ├── probe stream opened & released                               │
//! │       │       permission_granted()  ──► Idle, permission = Granted     │
//! │       │                                                                 │
//! │       └── platform refused                                             │
//! │               fail(kind)            ──► Error(CaptureError)            │
//! │                                                                         │
//! │  begin_streaming()             Idle ──► Streaming (needs Granted)      │
//! │  stream_ended()           Streaming ──► Idle (no-op otherwise)         │
//! │  reset()                      Error ──► Idle (retry)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, CoreError, CoreResult, ErrorKind};
use crate::types::{CaptureState, PermissionStatus, ScanResult, VideoDevice};

/// Label fragments that identify a rear-facing camera.
pub const REAR_CAMERA_HINTS: &[&str] = &["back", "rear", "environment"];

/// Preferred capture width.
pub const IDEAL_WIDTH: u32 = 1280;

/// Preferred capture height.
pub const IDEAL_HEIGHT: u32 = 720;

// =============================================================================
// Stream Constraints
// =============================================================================

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera, pointing away from the user.
    #[default]
    Environment,
    /// Front camera.
    User,
}

/// What we ask the platform for when opening a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    /// Facing preference (a hint; the platform may ignore it).
    pub facing: FacingMode,

    /// Specific device, once one has been selected.
    pub device_id: Option<String>,

    /// Resolution hints.
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamConstraints {
    /// Constraints for the permission probe: any rear camera.
    pub fn probe() -> Self {
        StreamConstraints {
            facing: FacingMode::Environment,
            device_id: None,
            ideal_width: IDEAL_WIDTH,
            ideal_height: IDEAL_HEIGHT,
        }
    }

    /// Constraints for continuous capture on `device`.
    pub fn for_device(device: &VideoDevice) -> Self {
        StreamConstraints {
            device_id: Some(device.id.clone()),
            ..Self::probe()
        }
    }
}

/// Picks the camera to scan with.
///
/// Prefers the first device whose label contains one of
/// [`REAR_CAMERA_HINTS`] (case-insensitive), otherwise the first device.
pub fn select_device(devices: &[VideoDevice]) -> Option<&VideoDevice> {
    devices
        .iter()
        .find(|d| {
            let label = d.label.to_lowercase();
            REAR_CAMERA_HINTS.iter().any(|hint| label.contains(hint))
        })
        .or_else(|| devices.first())
}

// =============================================================================
// Capture Machine
// =============================================================================

/// Tracks capture state and permission for one controller.
#[derive(Debug, Clone, Default)]
pub struct CaptureMachine {
    state: CaptureState,
    permission: PermissionStatus,
    embedded: bool,
}

impl CaptureMachine {
    /// Creates an idle machine. `embedded` selects the framed denial message.
    pub fn new(embedded: bool) -> Self {
        CaptureMachine {
            state: CaptureState::Idle,
            permission: PermissionStatus::Unknown,
            embedded,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn permission(&self) -> PermissionStatus {
        self.permission
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// Idle or Error → RequestingPermission.
    pub fn begin_permission_request(&mut self) -> CoreResult<()> {
        match self.state {
            CaptureState::Idle | CaptureState::Error(_) => {
                self.state = CaptureState::RequestingPermission;
                Ok(())
            }
            _ => Err(self.invalid("request permission")),
        }
    }

    /// RequestingPermission → Idle, with permission recorded as granted.
    pub fn permission_granted(&mut self) -> CoreResult<()> {
        match self.state {
            CaptureState::RequestingPermission => {
                self.permission = PermissionStatus::Granted;
                self.state = CaptureState::Idle;
                Ok(())
            }
            _ => Err(self.invalid("grant permission")),
        }
    }

    /// Idle → Streaming. Permission must already be granted.
    pub fn begin_streaming(&mut self) -> CoreResult<()> {
        if self.permission != PermissionStatus::Granted {
            return Err(self.invalid("start streaming without permission"));
        }
        match self.state {
            CaptureState::Idle => {
                self.state = CaptureState::Streaming;
                Ok(())
            }
            _ => Err(self.invalid("start streaming")),
        }
    }

    /// Streaming → Idle. A no-op in every other state.
    pub fn stream_ended(&mut self) {
        if self.state.is_streaming() {
            self.state = CaptureState::Idle;
        }
    }

    /// Any → Error. Returns the error that was stored.
    ///
    /// A denial also records permission as denied so the next start asks
    /// again.
    pub fn fail(&mut self, kind: ErrorKind, detail: Option<String>) -> CaptureError {
        if kind == ErrorKind::PermissionDenied {
            self.permission = PermissionStatus::Denied;
        }

        let mut err = CaptureError::new(kind, self.embedded);
        err.detail = detail;
        self.state = CaptureState::Error(err.clone());
        err
    }

    /// Error → Idle. A no-op in every other state.
    pub fn reset(&mut self) {
        if matches!(self.state, CaptureState::Error(_)) {
            self.state = CaptureState::Idle;
        }
    }

    fn invalid(&self, action: &str) -> CoreError {
        CoreError::InvalidTransition {
            from: self.state.to_string(),
            action: action.to_string(),
        }
    }
}

// =============================================================================
// Scan Gate
// =============================================================================

/// Single-shot latch between the decoder and the caller.
///
/// Armed when a capture session starts; the first non-empty decode passes
/// and closes the gate, every later decode is dropped until re-armed.
#[derive(Debug, Clone, Default)]
pub struct ScanGate {
    armed: bool,
}

impl ScanGate {
    /// A gate ready to pass one result.
    pub fn armed() -> Self {
        ScanGate { armed: true }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Re-arms the gate for a new activation.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Offers a decoded payload. Returns the result only for the first
    /// non-empty offer since the gate was armed.
    pub fn offer(&mut self, text: &str, format: Option<String>) -> Option<ScanResult> {
        if !self.armed {
            return None;
        }

        let result = ScanResult::new(text, format).ok()?;
        self.armed = false;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granted() -> CaptureMachine {
        let mut machine = CaptureMachine::new(false);
        machine.begin_permission_request().unwrap();
        machine.permission_granted().unwrap();
        machine
    }

    #[test]
    fn test_select_prefers_rear_camera() {
        let devices = vec![
            VideoDevice::new("0", "FaceTime HD Camera"),
            VideoDevice::new("1", "Camera 2, facing BACK"),
        ];
        assert_eq!(select_device(&devices).unwrap().id, "1");

        let devices = vec![
            VideoDevice::new("a", "Integrated Webcam"),
            VideoDevice::new("b", "USB Camera"),
        ];
        assert_eq!(select_device(&devices).unwrap().id, "a");

        assert!(select_device(&[]).is_none());
    }

    #[test]
    fn test_select_matches_environment_label() {
        let devices = vec![
            VideoDevice::new("front", "front"),
            VideoDevice::new("env", "Environment Facing"),
        ];
        assert_eq!(select_device(&devices).unwrap().id, "env");
    }

    #[test]
    fn test_permission_then_stream_then_end() {
        let mut machine = granted();
        assert_eq!(machine.state(), &CaptureState::Idle);
        assert_eq!(machine.permission(), PermissionStatus::Granted);

        machine.begin_streaming().unwrap();
        assert!(machine.state().is_streaming());

        machine.stream_ended();
        assert_eq!(machine.state(), &CaptureState::Idle);

        // Ending again is harmless
        machine.stream_ended();
        assert_eq!(machine.state(), &CaptureState::Idle);
    }

    #[test]
    fn test_streaming_requires_permission() {
        let mut machine = CaptureMachine::new(false);
        assert!(machine.begin_streaming().is_err());
        assert_eq!(machine.state(), &CaptureState::Idle);
    }

    #[test]
    fn test_cannot_request_while_streaming() {
        let mut machine = granted();
        machine.begin_streaming().unwrap();
        assert!(machine.begin_permission_request().is_err());
    }

    #[test]
    fn test_fail_from_any_state_and_retry() {
        let mut machine = CaptureMachine::new(true);
        machine.begin_permission_request().unwrap();

        let err = machine.fail(ErrorKind::PermissionDenied, Some("NotAllowedError".into()));
        assert!(err.embedded);
        assert!(err.offers_open_in_new_tab());
        assert_eq!(machine.permission(), PermissionStatus::Denied);
        assert_eq!(machine.state().error(), Some(&err));

        // Retry is allowed straight from Error
        machine.begin_permission_request().unwrap();
        assert_eq!(machine.state(), &CaptureState::RequestingPermission);
    }

    #[test]
    fn test_reset_only_clears_errors() {
        let mut machine = granted();
        machine.begin_streaming().unwrap();
        machine.reset();
        assert!(machine.state().is_streaming());

        machine.fail(ErrorKind::Unknown, None);
        machine.reset();
        assert_eq!(machine.state(), &CaptureState::Idle);
    }

    #[test]
    fn test_gate_passes_exactly_once() {
        let mut gate = ScanGate::armed();
        assert!(gate.offer("", None).is_none());
        assert!(gate.is_armed());

        let first = gate.offer("3017620425035", None).unwrap();
        assert_eq!(first.text, "3017620425035");
        assert!(gate.offer("3017620425035", None).is_none());
        assert!(gate.offer("8901030810033", None).is_none());

        gate.arm();
        assert!(gate.offer("8901030810033", None).is_some());
    }

    #[test]
    fn test_probe_constraints() {
        let probe = StreamConstraints::probe();
        assert_eq!(probe.facing, FacingMode::Environment);
        assert_eq!((probe.ideal_width, probe.ideal_height), (1280, 720));
        assert!(probe.device_id.is_none());

        let device = VideoDevice::new("/dev/video2", "rear");
        let constraints = StreamConstraints::for_device(&device);
        assert_eq!(constraints.device_id.as_deref(), Some("/dev/video2"));
    }
}
