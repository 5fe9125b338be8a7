//! Consumer side of the profile exchange: camera lifecycle and the decode loop.

pub mod device;
mod session;

pub use device::{
    AcquireError, CameraLease, CaptureConstraints, CaptureDevice, DeviceGate, FacingMode,
    FrameStream, ScanRegion, StreamError,
};
pub use session::{ScanEvent, ScanNotice, ScanSession, ScanSnapshot, ScanState};
