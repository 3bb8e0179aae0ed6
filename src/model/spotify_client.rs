//! Spotify Web API client wrapper for catalog queries and playback commands

use std::collections::HashSet;
use std::sync::Arc;
use rspotify::{
    http::HttpError,
    model::{Country, FullTrack, Market, PlayableId, PlayableItem, PlaylistId, SearchResult, SearchType, TrackId},
    prelude::*,
    AuthCodeSpotify, ClientError, Config, Token,
};

use super::api::{ApiFailure, CatalogApi, CatalogTrack, PlayerApi};

/// Field projection for playlist items: page metadata plus the track objects
const PLAYLIST_FIELDS: &str = "href,limit,next,offset,previous,total,items(is_local,track)";

/// rspotify client that never caches or refreshes tokens on its own.
///
/// Every call installs the access token it was handed, so a token swapped
/// by the identity collaborator between calls is always picked up.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
}

impl SpotifyClient {
    pub fn new() -> Self {
        let client = AuthCodeSpotify::with_config(
            Default::default(),
            Default::default(),
            Config {
                token_cached: false,
                token_refreshing: false,
                ..Default::default()
            },
        );
        tracing::debug!("rspotify client initialized");
        Self {
            client: Arc::new(client),
        }
    }

    /// Installs `access_token` for the next request. Fails rather than
    /// letting the request go out with whatever token was there before.
    async fn authorize(&self, access_token: &str) -> Result<(), ApiFailure> {
        let token = Token {
            access_token: access_token.to_string(),
            expires_in: chrono::Duration::seconds(3600),
            expires_at: None,
            scopes: HashSet::new(),
            refresh_token: None,
        };
        match self.client.token.lock().await {
            Ok(mut guard) => {
                *guard = Some(token);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = ?e, "Could not install access token");
                Err(ApiFailure::transport("access token could not be installed"))
            }
        }
    }
}

impl Default for SpotifyClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts an rspotify error into an [`ApiFailure`], reading the
/// `{error: {message}}` body of non-2xx responses when it parses.
async fn api_failure(err: ClientError) -> ApiFailure {
    match err {
        ClientError::Http(http) => match *http {
            HttpError::StatusCode(response) => {
                let status = response.status();
                let fallback = status.canonical_reason().unwrap_or("Unknown error").to_string();
                let body = response.text().await.unwrap_or_default();
                let message = error_message(&body).unwrap_or(fallback);
                tracing::error!(status = status.as_u16(), message = %message, "Spotify API error");
                ApiFailure::status(status.as_u16(), message)
            }
            other => {
                tracing::error!(error = %other, "Spotify API request failed");
                ApiFailure::transport(other.to_string())
            }
        },
        other => {
            tracing::error!(error = %other, "Spotify API request failed");
            ApiFailure::transport(other.to_string())
        }
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn market(code: &str) -> Option<Market> {
    match serde_json::from_value::<Country>(serde_json::Value::String(code.to_string())) {
        Ok(country) => Some(Market::Country(country)),
        Err(_) => {
            tracing::warn!(market = code, "Unknown market code, querying without market");
            None
        }
    }
}

impl From<FullTrack> for CatalogTrack {
    fn from(track: FullTrack) -> Self {
        CatalogTrack {
            id: track.id.as_ref().map(|id| id.id().to_string()),
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            image_urls: track.album.images.into_iter().map(|i| i.url).collect(),
            is_playable: track.is_playable,
        }
    }
}

impl CatalogApi for SpotifyClient {
    async fn playlist_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        market_code: &str,
        limit: u32,
    ) -> Result<Vec<CatalogTrack>, ApiFailure> {
        let id = PlaylistId::from_id(playlist_id)
            .map_err(|e| ApiFailure::transport(format!("Invalid playlist id {}: {}", playlist_id, e)))?;
        self.authorize(access_token).await?;

        tracing::debug!(playlist_id, market = market_code, limit, "API: playlist_items");
        let page = match self
            .client
            .playlist_items_manual(id, Some(PLAYLIST_FIELDS), market(market_code), Some(limit), None)
            .await
        {
            Ok(page) => page,
            Err(e) => return Err(api_failure(e).await),
        };

        Ok(page
            .items
            .into_iter()
            .filter_map(|item| match item.track {
                Some(PlayableItem::Track(track)) => Some(CatalogTrack::from(track)),
                _ => None,
            })
            .collect())
    }

    async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        market_code: &str,
        limit: u32,
    ) -> Result<Vec<CatalogTrack>, ApiFailure> {
        self.authorize(access_token).await?;

        tracing::debug!(query, market = market_code, limit, "API: search");
        let result = match self
            .client
            .search(query, SearchType::Track, market(market_code), None, Some(limit), None)
            .await
        {
            Ok(result) => result,
            Err(e) => return Err(api_failure(e).await),
        };

        match result {
            SearchResult::Tracks(page) => Ok(page.items.into_iter().map(CatalogTrack::from).collect()),
            _ => Ok(Vec::new()),
        }
    }
}

impl PlayerApi for SpotifyClient {
    async fn transfer_playback(&self, access_token: &str, device_id: &str, play: bool) -> Result<(), ApiFailure> {
        self.authorize(access_token).await?;

        tracing::debug!(device_id, play, "API: transfer_playback");
        match self.client.transfer_playback(device_id, Some(play)).await {
            Ok(()) => Ok(()),
            Err(e) => Err(api_failure(e).await),
        }
    }

    async fn start_playback(
        &self,
        access_token: &str,
        device_id: &str,
        uri: &str,
        position_ms: u32,
    ) -> Result<(), ApiFailure> {
        let track_id = TrackId::from_uri(uri)
            .map_err(|e| ApiFailure::transport(format!("Invalid track uri {}: {}", uri, e)))?;
        self.authorize(access_token).await?;

        tracing::debug!(uri, device_id, position_ms, "API: start_uris_playback");
        match self
            .client
            .start_uris_playback(
                [PlayableId::Track(track_id)],
                Some(device_id),
                None,
                Some(chrono::Duration::milliseconds(i64::from(position_ms))),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(api_failure(e).await),
        }
    }
}
