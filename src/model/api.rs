//! HTTP seams the game talks through: catalog queries and playback commands
//!
//! `SpotifyClient` implements both traits against the Web API; tests swap in
//! in-memory fakes.

use std::future::Future;
use thiserror::Error;

use super::types::Track;

/// A failed Web API call, already stripped of transport details.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiFailure {
    /// HTTP status, `None` when the request never got a response
    pub status: Option<u16>,
    pub message: String,
}

impl ApiFailure {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401) || self.message.contains("Unauthorized")
    }
}

/// A catalog entry before the playability filter is applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogTrack {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<String>,
    pub image_urls: Vec<String>,
    pub is_playable: Option<bool>,
}

impl CatalogTrack {
    /// Only tracks the catalog explicitly marks playable in the market count,
    /// and they need an id to build a play URI from.
    pub fn is_playable(&self) -> bool {
        self.is_playable == Some(true) && self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn into_track(self) -> Track {
        let id = self.id.unwrap_or_default();
        Track {
            play_uri: format!("spotify:track:{}", id),
            id,
            title: self.name,
            artist: self.artists.into_iter().next().unwrap_or_default(),
            artwork_url: self.image_urls.into_iter().next(),
        }
    }
}

pub trait CatalogApi: Send + Sync + 'static {
    /// Up to `limit` tracks of a playlist, market-scoped.
    fn playlist_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        market: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<CatalogTrack>, ApiFailure>> + Send;

    /// Up to `limit` tracks matching a search query, market-scoped.
    fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        market: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<CatalogTrack>, ApiFailure>> + Send;
}

pub trait PlayerApi: Send + Sync + 'static {
    /// Moves playback to `device_id`; `play = false` keeps it paused.
    fn transfer_playback(
        &self,
        access_token: &str,
        device_id: &str,
        play: bool,
    ) -> impl Future<Output = Result<(), ApiFailure>> + Send;

    fn start_playback(
        &self,
        access_token: &str,
        device_id: &str,
        uri: &str,
        position_ms: u32,
    ) -> impl Future<Output = Result<(), ApiFailure>> + Send;
}
