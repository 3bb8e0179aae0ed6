//! Remote playback device lifecycle
//!
//! The controller exclusively owns the one SDK connection. Raw SDK
//! notifications arrive on a channel, are validated into [`DeviceEvent`]s and
//! then drive `Disconnected -> Connecting -> Ready <-> NotReady`. Device
//! errors are recorded without leaving the current connectivity state.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::DeviceConfig;
use crate::model::{
    ApiFailure, DeviceErrorKind, DeviceEvent, DeviceState, DeviceStatus, SignOutHook, TokenAccessor,
};

/// Notification exactly as the playback SDK reports it; payloads may be missing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SdkEvent {
    Ready { device_id: Option<String> },
    NotReady { device_id: Option<String> },
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
    PlaybackError { message: String },
    /// `None` when the SDK reports a null player state
    PlayerStateChanged { paused: Option<bool> },
}

impl SdkEvent {
    /// Boundary check before anything reaches the state machine.
    pub fn validate(self) -> Option<DeviceEvent> {
        match self {
            SdkEvent::Ready { device_id: Some(id) } if !id.is_empty() => Some(DeviceEvent::Ready { device_id: id }),
            SdkEvent::Ready { .. } => {
                tracing::warn!("Dropping ready event without a device id");
                None
            }
            SdkEvent::NotReady { device_id } => Some(DeviceEvent::NotReady { device_id }),
            SdkEvent::InitializationError { message } => Some(DeviceEvent::Error {
                kind: DeviceErrorKind::Initialization,
                message,
            }),
            SdkEvent::AuthenticationError { message } => Some(DeviceEvent::Error {
                kind: DeviceErrorKind::Authentication,
                message,
            }),
            SdkEvent::AccountError { message } => Some(DeviceEvent::Error {
                kind: DeviceErrorKind::Account,
                message,
            }),
            SdkEvent::PlaybackError { message } => Some(DeviceEvent::Error {
                kind: DeviceErrorKind::Playback,
                message,
            }),
            SdkEvent::PlayerStateChanged { paused: Some(paused) } => Some(DeviceEvent::StateChanged { paused }),
            SdkEvent::PlayerStateChanged { paused: None } => None,
        }
    }
}

pub type SdkEventSender = mpsc::UnboundedSender<SdkEvent>;

/// Construction options handed to the SDK
#[derive(Clone)]
pub struct DeviceOptions {
    pub name: String,
    pub volume: f32,
    /// Called by the SDK whenever it needs a token
    pub token: TokenAccessor,
}

/// The playback SDK surface the game relies on.
pub trait PlaybackSdk: Send + Sync + 'static {
    /// Resolves to `false` when the connection could not be established.
    fn connect(&self) -> impl Future<Output = bool> + Send;

    /// Must run before the first command on platforms that gate audio output.
    fn activate_element(&self) -> impl Future<Output = Result<(), ApiFailure>> + Send;

    fn pause(&self) -> impl Future<Output = Result<(), ApiFailure>> + Send;

    fn disconnect(&self);
}

pub type SdkBuilder<S> = Box<dyn Fn(DeviceOptions, SdkEventSender) -> S + Send + Sync>;

/// Runs when the caller reports the SDK as loaded
pub type SdkReadyHook = Box<dyn Fn() + Send + Sync>;

/// Validated event stream for one connection
pub struct DeviceEvents {
    rx: mpsc::UnboundedReceiver<SdkEvent>,
}

impl DeviceEvents {
    /// Next valid event; `None` once the SDK side is gone.
    pub async fn recv(&mut self) -> Option<DeviceEvent> {
        loop {
            let raw = self.rx.recv().await?;
            tracing::trace!(event = ?raw, "SDK event");
            if let Some(event) = raw.validate() {
                return Some(event);
            }
        }
    }
}

/// Device view handed to the playback window
pub struct DeviceSnapshot<S> {
    pub state: DeviceState,
    pub sdk: Option<Arc<S>>,
}

/// What a device event meant for the rest of the game
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceOutcome {
    Ready { device_id: String },
    NotReady,
    Warning { kind: DeviceErrorKind, message: String },
    AuthFailed { message: String },
    PlaybackState { paused: bool },
    Ignored,
}

pub struct PlaybackDeviceController<S> {
    builder: SdkBuilder<S>,
    config: DeviceConfig,
    sign_out: SignOutHook,
    connection: Option<Arc<S>>,
    state: DeviceState,
    sdk_ready_hook: Option<SdkReadyHook>,
}

impl<S: PlaybackSdk> PlaybackDeviceController<S> {
    pub fn new(builder: SdkBuilder<S>, config: DeviceConfig, sign_out: SignOutHook) -> Self {
        Self {
            builder,
            config,
            sign_out,
            connection: None,
            state: DeviceState::default(),
            sdk_ready_hook: None,
        }
    }

    pub fn on_sdk_ready(&mut self, hook: SdkReadyHook) {
        self.sdk_ready_hook = Some(hook);
    }

    /// Returns `false` when no hook is registered (never registered or torn down).
    pub fn notify_sdk_ready(&self) -> bool {
        match &self.sdk_ready_hook {
            Some(hook) => {
                tracing::info!("Playback SDK reported ready");
                hook();
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn connection(&self) -> Option<Arc<S>> {
        self.connection.clone()
    }

    pub fn snapshot(&self) -> DeviceSnapshot<S> {
        DeviceSnapshot {
            state: self.state.clone(),
            sdk: self.connection.clone(),
        }
    }

    /// Builds the SDK connection and moves to `Connecting`.
    ///
    /// No-op (returns `None`) while a connection already exists. The caller
    /// awaits `connect()` on the returned SDK without holding this controller
    /// and reports back through [`Self::connect_finished`].
    pub fn initialize(&mut self, token: TokenAccessor) -> Option<(Arc<S>, DeviceEvents)> {
        if self.connection.is_some() {
            tracing::debug!("Player already initialized");
            return None;
        }

        tracing::info!(device_name = %self.config.name, "Initializing playback device");
        let (tx, rx) = mpsc::unbounded_channel();
        let options = DeviceOptions {
            name: self.config.name.clone(),
            volume: self.config.volume,
            token,
        };
        let sdk = Arc::new((self.builder)(options, tx));
        self.connection = Some(sdk.clone());
        self.state.status = DeviceStatus::Connecting;

        Some((sdk, DeviceEvents { rx }))
    }

    /// Returns `true` when a failed connect was recorded; stale results for a
    /// connection that was already torn down are ignored.
    pub fn connect_finished(&mut self, sdk: &Arc<S>, connected: bool) -> bool {
        let current = self.connection.as_ref().is_some_and(|c| Arc::ptr_eq(c, sdk));
        if !current {
            tracing::debug!("Ignoring connect result for a stale connection");
            return false;
        }

        if connected {
            tracing::info!("Player connected");
            return false;
        }

        tracing::error!("Player connection failed");
        sdk.disconnect();
        self.connection = None;
        self.state.status = DeviceStatus::Disconnected;
        self.state.device_id = None;
        self.state.last_error = Some(DeviceErrorKind::Initialization);
        true
    }

    pub fn apply(&mut self, event: DeviceEvent) -> DeviceOutcome {
        if self.connection.is_none() {
            tracing::debug!(event = ?event, "Ignoring device event without a connection");
            return DeviceOutcome::Ignored;
        }

        match event {
            DeviceEvent::Ready { device_id } => {
                tracing::info!(device_id = %device_id, "Device ready");
                self.state.status = DeviceStatus::Ready;
                self.state.device_id = Some(device_id.clone());
                self.state.last_error = None;
                DeviceOutcome::Ready { device_id }
            }
            DeviceEvent::NotReady { device_id } => {
                tracing::info!(device_id = ?device_id, "Device went offline");
                self.state.status = DeviceStatus::NotReady;
                self.state.device_id = None;
                DeviceOutcome::NotReady
            }
            DeviceEvent::Error { kind: DeviceErrorKind::Authentication, message } => {
                tracing::error!(message = %message, "Device authentication error, requesting sign-out");
                self.state.last_error = Some(DeviceErrorKind::Authentication);
                (self.sign_out)();
                DeviceOutcome::AuthFailed { message }
            }
            DeviceEvent::Error { kind, message } => {
                tracing::warn!(kind = ?kind, message = %message, "Device error");
                self.state.last_error = Some(kind);
                DeviceOutcome::Warning { kind, message }
            }
            DeviceEvent::StateChanged { paused } => {
                tracing::debug!(paused, "Player state changed");
                DeviceOutcome::PlaybackState { paused }
            }
        }
    }

    /// Disconnects and returns to `Disconnected`; safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(sdk) = self.connection.take() {
            tracing::info!("Disconnecting player");
            sdk.disconnect();
        }
        self.state = DeviceState::default();
        self.sdk_ready_hook = None;
    }
}
