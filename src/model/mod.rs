//! Model module - game data, error taxonomy and catalog access
//!
//! - `types`: Core type definitions (track, credential, device and game state)
//! - `error`: Error taxonomy surfaced to the player
//! - `api`: HTTP seams for catalog queries and playback commands
//! - `spotify_client`: rspotify-backed implementation of those seams
//! - `resolver`: Random playable track resolution with tiered fallback
//! - `game_model`: Session state with loading and detach semantics

mod types;
mod error;
mod api;
mod spotify_client;
mod resolver;
mod game_model;

pub use types::{
    Credential, DeviceErrorKind, DeviceEvent, DeviceState, DeviceStatus, ErrorDescriptor, ErrorKind,
    GameState, SignOutHook, TokenAccessor, Track,
};

pub use error::{GameError, PreconditionReason};

pub use api::{ApiFailure, CatalogApi, PlayerApi};
#[cfg(test)]
pub use api::CatalogTrack;

pub use spotify_client::SpotifyClient;

pub use resolver::TrackCatalogResolver;

pub use game_model::GameModel;
