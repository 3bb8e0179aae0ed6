//! Core type definitions for the game

use std::fmt;
use std::sync::Arc;
use chrono::{DateTime, Utc};

/// A track the game can play and ask the player to guess.
///
/// Resolved tracks are never edited; loading a new one replaces the whole value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// First credited artist only
    pub artist: String,
    pub artwork_url: Option<String>,
    /// `spotify:track:<id>` handle the playback device accepts
    pub play_uri: String,
}

/// Snapshot of the signed-in user's tokens.
///
/// Owned by the identity collaborator; the game only ever reads it through a
/// [`TokenAccessor`] and never refreshes it itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Returns the current credential snapshot, or `None` when signed out.
/// Must be re-read on every call because the collaborator may swap tokens.
pub type TokenAccessor = Arc<dyn Fn() -> Option<Credential> + Send + Sync>;

/// Invoked when the game needs the identity collaborator to sign the user out.
pub type SignOutHook = Arc<dyn Fn() + Send + Sync>;

/// Connectivity of the remote playback device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeviceStatus {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    NotReady,
}

/// Device-level failures reported by the playback SDK
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceErrorKind {
    Initialization,
    Authentication,
    Account,
    Playback,
}

impl DeviceErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            DeviceErrorKind::Initialization => "Player error",
            DeviceErrorKind::Authentication => "Authentication error",
            DeviceErrorKind::Account => "Account error",
            DeviceErrorKind::Playback => "Playback error",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub status: DeviceStatus,
    pub device_id: Option<String>,
    pub last_error: Option<DeviceErrorKind>,
}

impl DeviceState {
    pub fn ready(&self) -> bool {
        self.status == DeviceStatus::Ready
    }
}

/// Validated device notification; see `controller::device` for the raw SDK side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Ready { device_id: String },
    NotReady { device_id: Option<String> },
    Error { kind: DeviceErrorKind, message: String },
    StateChanged { paused: bool },
}

/// Coarse error category shown to the player
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Catalog,
    NoPlayableTrack,
    Device,
    Precondition,
    Playback,
    Stop,
    SignedOut,
}

/// What `GameState.error` holds: a message plus whether "try a new track" is offered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

/// Observable game state, handed to the view as a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameState {
    pub current_track: Option<Track>,
    pub is_loading: bool,
    pub is_playing: bool,
    pub revealed: bool,
    pub error: Option<ErrorDescriptor>,
    pub guess: String,
    pub guess_correct: Option<bool>,
    pub player_ready: bool,
    pub device_id: Option<String>,
    pub device_paused: Option<bool>,
    pub signed_out: bool,
}

impl GameState {
    pub fn can_play(&self) -> bool {
        self.player_ready && !self.is_playing && !self.is_loading && self.current_track.is_some() && !self.revealed
    }

    pub fn can_guess(&self) -> bool {
        !self.revealed && !self.is_loading && self.current_track.is_some()
    }
}

/// Loose match used when revealing: case, punctuation and spacing are ignored.
pub fn guess_matches(guess: &str, title: &str) -> bool {
    fn normalize(s: &str) -> String {
        s.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }

    let guess = normalize(guess);
    !guess.is_empty() && guess == normalize(title)
}
