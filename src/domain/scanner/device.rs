//! Ports to the host's video capture device.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::domain::errors::ExchangeError;

pub const DEFAULT_SAMPLE_RATE: u32 = 10;
pub const DEFAULT_REGION_SIZE: u32 = 250;

/// Which camera to prefer when the platform distinguishes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera.
    #[default]
    Environment,
    User,
}

/// Fixed box, centred in the frame, that decode attempts look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRegion {
    pub width: u32,
    pub height: u32,
}

impl Default for ScanRegion {
    fn default() -> Self {
        Self {
            width: DEFAULT_REGION_SIZE,
            height: DEFAULT_REGION_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub facing: FacingMode,
    /// Decode attempts per second.
    pub sample_rate: u32,
    pub region: ScanRegion,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            sample_rate: DEFAULT_SAMPLE_RATE,
            region: ScanRegion::default(),
        }
    }
}

impl CaptureConstraints {
    /// Delay between two decode attempts. Never zero.
    pub fn sample_interval(&self) -> Duration {
        let millis = 1000 / u64::from(self.sample_rate.max(1));
        Duration::from_millis(millis.max(1))
    }
}

/// Why the capture device could not be acquired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("no capture device found")]
    NotFound,
    #[error("{0}")]
    Other(String),
}

impl AcquireError {
    /// Maps a platform media error name (`NotAllowedError`, `NotFoundError`, ...)
    /// and its message to an acquisition failure.
    pub fn from_platform(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                AcquireError::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" => AcquireError::NotFound,
            _ if message.is_empty() => AcquireError::Other(name.to_string()),
            _ => AcquireError::Other(message.to_string()),
        }
    }
}

impl From<AcquireError> for ExchangeError {
    fn from(error: AcquireError) -> Self {
        match error {
            AcquireError::PermissionDenied => ExchangeError::PermissionDenied,
            AcquireError::NotFound => ExchangeError::DeviceNotFound,
            AcquireError::Other(reason) => ExchangeError::DeviceUnavailable(reason),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct StreamError(pub String);

/// A video capture device that can be opened for exclusive use.
#[async_trait]
pub trait CaptureDevice: Send + Sync + 'static {
    type Stream: FrameStream;

    /// Requests exclusive access to a device matching `constraints`.
    async fn acquire(&self, constraints: &CaptureConstraints)
    -> Result<Self::Stream, AcquireError>;
}

/// An open capture stream.
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Samples one frame and tries to decode a QR symbol inside `region`.
    ///
    /// Returns `Ok(None)` when the frame holds no readable symbol.
    async fn decode_frame(&mut self, region: &ScanRegion) -> Result<Option<String>, StreamError>;

    /// Stops the stream and gives the device back to the platform.
    async fn release(&mut self) -> Result<(), StreamError>;
}

/// Guards the capture device so only one scan session holds it at a time.
///
/// Every session that shares a camera must be built from clones of the same gate.
#[derive(Debug, Clone)]
pub struct DeviceGate {
    permits: Arc<Semaphore>,
}

impl Default for DeviceGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Takes the device lease if nobody else holds it.
    pub fn try_lease(&self) -> Option<CameraLease> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| CameraLease { _permit: permit })
    }

    pub fn is_leased(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

/// Proof of exclusive device ownership. Dropping it frees the device for other sessions.
#[derive(Debug)]
pub struct CameraLease {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    #[test]
    fn test_platform_error_mapping() {
        assert_eq!(
            AcquireError::from_platform("NotAllowedError", "Permission denied"),
            AcquireError::PermissionDenied
        );
        assert_eq!(
            AcquireError::from_platform("NotFoundError", "Requested device not found"),
            AcquireError::NotFound
        );
        assert_eq!(
            AcquireError::from_platform("NotReadableError", "Could not start video source"),
            AcquireError::Other("Could not start video source".to_string())
        );
        assert_eq!(
            AcquireError::from_platform("AbortError", ""),
            AcquireError::Other("AbortError".to_string())
        );
    }

    #[test]
    fn test_acquire_error_kinds() {
        let kind = |e: AcquireError| ExchangeError::from(e).kind();
        assert_eq!(kind(AcquireError::PermissionDenied), ErrorKind::PermissionDenied);
        assert_eq!(kind(AcquireError::NotFound), ErrorKind::DeviceNotFound);
        assert_eq!(kind(AcquireError::Other("busy".into())), ErrorKind::DeviceUnavailable);
    }

    #[test]
    fn test_sample_interval() {
        let constraints = CaptureConstraints::default();
        assert_eq!(constraints.sample_interval(), Duration::from_millis(100));

        let fast = CaptureConstraints {
            sample_rate: 5000,
            ..CaptureConstraints::default()
        };
        assert_eq!(fast.sample_interval(), Duration::from_millis(1));

        let zero = CaptureConstraints {
            sample_rate: 0,
            ..CaptureConstraints::default()
        };
        assert_eq!(zero.sample_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_gate_is_exclusive() {
        let gate = DeviceGate::new();
        let lease = gate.try_lease().expect("first lease");
        assert!(gate.is_leased());
        assert!(gate.clone().try_lease().is_none());

        drop(lease);
        assert!(!gate.is_leased());
        assert!(gate.try_lease().is_some());
    }
}
