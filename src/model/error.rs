//! Error taxonomy for track resolution and playback

use thiserror::Error;

use super::api::ApiFailure;
use super::types::{DeviceErrorKind, ErrorDescriptor, ErrorKind};

/// Why a snippet could not be started before any network call was made
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreconditionReason {
    DeviceNotReady,
    MissingDeviceId,
    MissingTrackUri,
    MissingAccessToken,
    AnswerRevealed,
}

impl PreconditionReason {
    fn describe(self) -> &'static str {
        match self {
            PreconditionReason::DeviceNotReady => "the player is not ready yet",
            PreconditionReason::MissingDeviceId => "the player has no device id yet",
            PreconditionReason::MissingTrackUri => "no track is loaded",
            PreconditionReason::MissingAccessToken => "the session is not valid, please sign in again",
            PreconditionReason::AnswerRevealed => "the answer is already revealed, load a new track",
        }
    }
}

fn status_text(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "n/a".to_string())
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Spotify authentication failed: {0}. Please log in again.")]
    Auth(String),

    #[error("Could not fetch a track (status {}): {message}", status_text(.status))]
    Catalog { status: Option<u16>, message: String },

    #[error("No playable track found. Please try again.")]
    NoPlayableTrack,

    #[error("{}: {message}", .kind.label())]
    Device { kind: DeviceErrorKind, message: String },

    #[error("Cannot play yet: {}", .0.describe())]
    PlaybackPrecondition(PreconditionReason),

    #[error("Playback transfer failed (status {}): {message}", status_text(.status))]
    PlaybackTransfer { status: Option<u16>, message: String },

    #[error("Play command failed (status {}): {message}", status_text(.status))]
    PlaybackStart { status: Option<u16>, message: String },

    #[error("Error while stopping playback: {0}")]
    Stop(String),

    #[error("You must sign in to load a track.")]
    NotSignedIn,
}

impl GameError {
    /// Catalog failures: 401 short-circuits to `Auth`, anything else keeps its status.
    pub fn from_catalog(failure: ApiFailure) -> Self {
        if failure.is_unauthorized() {
            GameError::Auth(failure.message)
        } else {
            GameError::Catalog {
                status: failure.status,
                message: failure.message,
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::Auth(_) => ErrorKind::Auth,
            GameError::Catalog { .. } => ErrorKind::Catalog,
            GameError::NoPlayableTrack => ErrorKind::NoPlayableTrack,
            GameError::Device { kind: DeviceErrorKind::Authentication, .. } => ErrorKind::Auth,
            GameError::Device { .. } => ErrorKind::Device,
            GameError::PlaybackPrecondition(_) => ErrorKind::Precondition,
            GameError::PlaybackTransfer { .. } | GameError::PlaybackStart { .. } => ErrorKind::Playback,
            GameError::Stop(_) => ErrorKind::Stop,
            GameError::NotSignedIn => ErrorKind::SignedOut,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Only failed track loads get a retry action; it re-runs `load_new_track`.
    pub fn retryable(&self) -> bool {
        matches!(self, GameError::Catalog { .. } | GameError::NoPlayableTrack)
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            kind: self.kind(),
            message: self.to_string(),
            retryable: self.retryable(),
        }
    }
}
