use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use serde::Serialize;
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::device::{CameraLease, CaptureConstraints, CaptureDevice, DeviceGate, FrameStream};
use crate::domain::{
    errors::{ErrorKind, ExchangeError},
    qr::payload::{self, IdentityPayload},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Initializing,
    Active,
    Error,
    Completed,
}

/// Transient hint shown while scanning continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanNotice {
    /// JSON that is not a borrower profile.
    InvalidFormat,
    /// Text that is not JSON at all.
    CouldNotParse,
}

impl ScanNotice {
    pub fn message(self) -> &'static str {
        match self {
            ScanNotice::InvalidFormat => {
                "Invalid QR code format. Please scan a borrower profile code."
            }
            ScanNotice::CouldNotParse => {
                "Could not parse the QR code. Please scan a borrower profile code."
            }
        }
    }

    fn from_decode_error(error: &ExchangeError) -> Self {
        match error.kind() {
            ErrorKind::MalformedPayload => ScanNotice::CouldNotParse,
            _ => ScanNotice::InvalidFormat,
        }
    }
}

/// Output of a scan session, delivered in order on the session's event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Captured(IdentityPayload),
    /// The scanning UI should close. Always follows [`ScanEvent::Captured`].
    CloseRequested,
    Notice(ScanNotice),
    Failed(ExchangeError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSnapshot {
    pub state: ScanState,
    pub last_error: Option<ErrorKind>,
    pub notice: Option<ScanNotice>,
    pub message: Option<String>,
}

type SharedStream<S> = Arc<AsyncMutex<S>>;

/// A device stream together with the lease that makes it exclusive.
struct Held<S> {
    stream: SharedStream<S>,
    _lease: CameraLease,
}

impl<S: FrameStream> Held<S> {
    /// Best-effort release. Failures are logged and never retried.
    async fn release(self) {
        let mut stream = self.stream.lock().await;
        match stream.release().await {
            Ok(()) => debug!("Capture device released"),
            Err(e) => warn!("Capture device release failed: {e}"),
        }
    }
}

struct Inner<S> {
    state: ScanState,
    /// Bumped by every transition that invalidates in-flight continuations.
    epoch: u64,
    held: Option<Held<S>>,
    decode_task: Option<JoinHandle<()>>,
    last_error: Option<ExchangeError>,
    notice: Option<ScanNotice>,
}

impl<S> Inner<S> {
    fn detach(&mut self) -> Option<Held<S>> {
        if let Some(task) = self.decode_task.take() {
            task.abort();
        }
        self.held.take()
    }
}

struct SessionCore<S: FrameStream> {
    id: Uuid,
    inner: Mutex<Inner<S>>,
    /// Held by whichever task may own this session's lease outside `inner`:
    /// an acquisition in flight, or a release after completion or close.
    attempt: AsyncMutex<()>,
    events: mpsc::UnboundedSender<ScanEvent>,
}

impl<S: FrameStream> SessionCore<S> {
    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ScanEvent) {
        // the receiver is gone once the UI stopped listening
        let _ = self.events.send(event);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    fn fail(&self, epoch: u64, error: ExchangeError) -> ScanState {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return inner.state;
        }
        warn!(session = %self.id, "Scanner failed to start: {error}");
        inner.state = ScanState::Error;
        inner.last_error = Some(error.clone());
        self.emit(ScanEvent::Failed(error));
        ScanState::Error
    }

    async fn on_decoded(&self, epoch: u64, text: &str) -> ControlFlow<()> {
        let _attempt = self.attempt.lock().await;
        let (payload, held) = {
            let mut inner = self.lock();
            if inner.epoch != epoch || inner.state != ScanState::Active {
                debug!(session = %self.id, "Ignoring decode result for a stale scan");
                return ControlFlow::Break(());
            }

            match payload::decode(text) {
                Ok(payload) => {
                    inner.epoch += 1;
                    inner.state = ScanState::Completed;
                    inner.notice = None;
                    // called from the decode task itself, which stops on Break
                    inner.decode_task = None;
                    (payload, inner.held.take())
                }
                Err(error) => {
                    debug!(session = %self.id, "Rejected scanned text: {error}");
                    let notice = ScanNotice::from_decode_error(&error);
                    inner.notice = Some(notice);
                    self.emit(ScanEvent::Notice(notice));
                    return ControlFlow::Continue(());
                }
            }
        };

        if let Some(held) = held {
            held.release().await;
        }

        info!(session = %self.id, subject = %payload.subject_id, "Captured borrower profile");
        self.emit(ScanEvent::Captured(payload));
        self.emit(ScanEvent::CloseRequested);
        ControlFlow::Break(())
    }
}

impl<S: FrameStream> Drop for SessionCore<S> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        let Some(held) = inner.detach() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(held.release());
            }
            Err(_) => warn!(
                session = %self.id,
                "Scan session dropped outside a runtime, device not released"
            ),
        }
    }
}

fn spawn_decode_loop<S: FrameStream>(
    core: Weak<SessionCore<S>>,
    epoch: u64,
    stream: SharedStream<S>,
    constraints: CaptureConstraints,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(constraints.sample_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let live = core.upgrade().is_some_and(|core| core.is_current(epoch));
            if !live {
                break;
            }

            let frame = {
                let mut stream = stream.lock().await;
                stream.decode_frame(&constraints.region).await
            };

            let text = match frame {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Frame decode failed: {e}");
                    continue;
                }
            };

            let Some(core) = core.upgrade() else {
                break;
            };
            if core.on_decoded(epoch, &text).await.is_break() {
                break;
            }
        }
    })
}

/// One open scanner dialog.
///
/// Clones share the same session. The state machine runs
/// `Idle -> Initializing -> Active -> Completed | Error`, with `Error -> Initializing`
/// on [`retry`](Self::retry) and any state `-> Idle` on [`close`](Self::close).
pub struct ScanSession<D: CaptureDevice> {
    core: Arc<SessionCore<D::Stream>>,
    device: Arc<D>,
    gate: DeviceGate,
    constraints: CaptureConstraints,
}

impl<D: CaptureDevice> Clone for ScanSession<D> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            device: self.device.clone(),
            gate: self.gate.clone(),
            constraints: self.constraints,
        }
    }
}

impl<D: CaptureDevice> ScanSession<D> {
    /// Creates an idle session and the channel its events are delivered on.
    pub fn new(
        device: Arc<D>,
        gate: DeviceGate,
        constraints: CaptureConstraints,
    ) -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let core = SessionCore {
            id: Uuid::new_v4(),
            inner: Mutex::new(Inner {
                state: ScanState::Idle,
                epoch: 0,
                held: None,
                decode_task: None,
                last_error: None,
                notice: None,
            }),
            attempt: AsyncMutex::new(()),
            events,
        };
        let session = Self {
            core: Arc::new(core),
            device,
            gate,
            constraints,
        };
        (session, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn state(&self) -> ScanState {
        self.core.lock().state
    }

    pub fn last_error(&self) -> Option<ExchangeError> {
        self.core.lock().last_error.clone()
    }

    pub fn notice(&self) -> Option<ScanNotice> {
        self.core.lock().notice
    }

    /// Whether this session currently owns the capture device.
    pub fn holds_device(&self) -> bool {
        self.core.lock().held.is_some()
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        let inner = self.core.lock();
        let message = match (&inner.last_error, inner.notice) {
            (Some(error), _) => Some(error.user_message()),
            (None, Some(notice)) => Some(notice.message().to_string()),
            (None, None) => None,
        };
        ScanSnapshot {
            state: inner.state,
            last_error: inner.last_error.as_ref().map(ExchangeError::kind),
            notice: inner.notice,
            message,
        }
    }

    /// Starts scanning: releases any device this session still holds, acquires
    /// the camera and spawns the decode loop.
    ///
    /// An earlier attempt of this session that is still acquiring or releasing
    /// is waited for, so its lease never counts as contention.
    ///
    /// Returns the state the session settled in, which is `Idle` when the
    /// session was closed while acquisition was in flight.
    #[instrument(skip(self), fields(session = %self.core.id))]
    pub async fn open(&self) -> ScanState {
        let (epoch, previous) = {
            let mut inner = self.core.lock();
            inner.epoch += 1;
            inner.state = ScanState::Initializing;
            inner.last_error = None;
            inner.notice = None;
            (inner.epoch, inner.detach())
        };

        let _attempt = self.core.attempt.lock().await;

        if let Some(previous) = previous {
            debug!("Releasing previously held device before re-acquiring");
            previous.release().await;
        }

        if !self.core.is_current(epoch) {
            return self.state();
        }

        let Some(lease) = self.gate.try_lease() else {
            return self.core.fail(
                epoch,
                ExchangeError::DeviceUnavailable(
                    "the camera is in use by another scanner".to_string(),
                ),
            );
        };

        let stream = match self.device.acquire(&self.constraints).await {
            Ok(stream) => stream,
            Err(e) => return self.core.fail(epoch, e.into()),
        };

        let held = Held {
            stream: Arc::new(AsyncMutex::new(stream)),
            _lease: lease,
        };

        let zombie = {
            let mut inner = self.core.lock();
            if inner.epoch == epoch {
                let task = spawn_decode_loop(
                    Arc::downgrade(&self.core),
                    epoch,
                    held.stream.clone(),
                    self.constraints,
                );
                inner.held = Some(held);
                inner.decode_task = Some(task);
                inner.state = ScanState::Active;
                None
            } else {
                Some(held)
            }
        };

        match zombie {
            Some(held) => {
                debug!("Session was torn down during acquisition, releasing device");
                held.release().await;
                self.state()
            }
            None => {
                info!("Scanner active");
                ScanState::Active
            }
        }
    }

    /// Re-enters acquisition after a failure. Does nothing in any other state.
    pub async fn retry(&self) -> ScanState {
        let state = self.state();
        if state != ScanState::Error {
            debug!(session = %self.core.id, ?state, "Retry ignored");
            return state;
        }
        self.open().await
    }

    /// Stops scanning and releases the device. Safe to call in any state, any number of times.
    #[instrument(skip(self), fields(session = %self.core.id))]
    pub async fn close(&self) {
        let held = {
            let mut inner = self.core.lock();
            inner.epoch += 1;
            inner.state = ScanState::Idle;
            inner.last_error = None;
            inner.notice = None;
            inner.detach()
        };

        if let Some(held) = held {
            let _attempt = self.core.attempt.lock().await;
            held.release().await;
        }
    }
}
