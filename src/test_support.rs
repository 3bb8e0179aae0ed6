//! In-memory fakes for the catalog, player and playback SDK seams

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::controller::{DeviceOptions, PlaybackSdk, SdkBuilder, SdkEvent, SdkEventSender};
use crate::model::{ApiFailure, CatalogApi, CatalogTrack, PlayerApi, Track};

/// `total` candidates named `<prefix>-<n>`, the first `playable` of them playable
pub fn candidates(prefix: &str, total: usize, playable: usize) -> Vec<CatalogTrack> {
    (0..total)
        .map(|n| CatalogTrack {
            id: Some(format!("{}-{}", prefix, n)),
            name: format!("Song {} {}", prefix, n),
            artists: vec![format!("Artist {}", n)],
            image_urls: vec![format!("https://img/{}/{}", prefix, n)],
            is_playable: Some(n < playable),
        })
        .collect()
}

pub fn sample_track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {}", id),
        artist: "Artist".to_string(),
        artwork_url: None,
        play_uri: format!("spotify:track:{}", id),
    }
}

type CatalogResponse = Result<Vec<CatalogTrack>, ApiFailure>;

#[derive(Default)]
struct CatalogInner {
    playlist: Option<CatalogResponse>,
    searches: HashMap<String, CatalogResponse>,
    playlist_calls: usize,
    search_calls: Vec<String>,
    tokens: Vec<String>,
    gate: Option<Arc<Notify>>,
}

#[derive(Clone, Default)]
pub struct FakeCatalog {
    inner: Arc<Mutex<CatalogInner>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlist(self, response: CatalogResponse) -> Self {
        self.inner.lock().unwrap().playlist = Some(response);
        self
    }

    pub fn with_search(self, query: &str, response: CatalogResponse) -> Self {
        self.inner.lock().unwrap().searches.insert(query.to_string(), response);
        self
    }

    /// Playlist requests wait for a permit on `gate` before answering.
    pub fn with_gate(self, gate: Arc<Notify>) -> Self {
        self.inner.lock().unwrap().gate = Some(gate);
        self
    }

    pub fn playlist_calls(&self) -> usize {
        self.inner.lock().unwrap().playlist_calls
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().search_calls.clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.inner.lock().unwrap().tokens.clone()
    }
}

impl CatalogApi for FakeCatalog {
    async fn playlist_tracks(
        &self,
        access_token: &str,
        _playlist_id: &str,
        _market: &str,
        _limit: u32,
    ) -> Result<Vec<CatalogTrack>, ApiFailure> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.playlist_calls += 1;
            inner.tokens.push(access_token.to_string());
            inner.gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.lock().unwrap().playlist.clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        _market: &str,
        _limit: u32,
    ) -> Result<Vec<CatalogTrack>, ApiFailure> {
        let mut inner = self.inner.lock().unwrap();
        inner.search_calls.push(query.to_string());
        inner.tokens.push(access_token.to_string());
        inner.searches.get(query).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerCall {
    Transfer { token: String, device_id: String, play: bool },
    Start { token: String, device_id: String, uri: String, position_ms: u32 },
}

impl PlayerCall {
    pub fn token(&self) -> &str {
        match self {
            PlayerCall::Transfer { token, .. } | PlayerCall::Start { token, .. } => token,
        }
    }
}

#[derive(Default)]
struct PlayerInner {
    calls: Vec<PlayerCall>,
    transfer_failure: Option<ApiFailure>,
    start_failure: Option<ApiFailure>,
    gate: Option<Arc<Notify>>,
}

#[derive(Clone, Default)]
pub struct FakePlayer {
    inner: Arc<Mutex<PlayerInner>>,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_transfer(self, failure: ApiFailure) -> Self {
        self.inner.lock().unwrap().transfer_failure = Some(failure);
        self
    }

    pub fn fail_start(self, failure: ApiFailure) -> Self {
        self.inner.lock().unwrap().start_failure = Some(failure);
        self
    }

    /// Transfers wait for a permit on `gate` after being recorded.
    pub fn with_gate(self, gate: Arc<Notify>) -> Self {
        self.inner.lock().unwrap().gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.inner.lock().unwrap().calls.clone()
    }
}

impl PlayerApi for FakePlayer {
    async fn transfer_playback(&self, access_token: &str, device_id: &str, play: bool) -> Result<(), ApiFailure> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(PlayerCall::Transfer {
                token: access_token.to_string(),
                device_id: device_id.to_string(),
                play,
            });
            inner.gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.lock().unwrap().transfer_failure.clone().map_or(Ok(()), Err)
    }

    async fn start_playback(
        &self,
        access_token: &str,
        device_id: &str,
        uri: &str,
        position_ms: u32,
    ) -> Result<(), ApiFailure> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(PlayerCall::Start {
            token: access_token.to_string(),
            device_id: device_id.to_string(),
            uri: uri.to_string(),
            position_ms,
        });
        inner.start_failure.clone().map_or(Ok(()), Err)
    }
}

#[derive(Default)]
struct SdkInner {
    built: AtomicUsize,
    activations: AtomicUsize,
    pauses: AtomicUsize,
    disconnects: AtomicUsize,
    connect_fails: AtomicBool,
    pause_failure: Mutex<Option<String>>,
    events: Mutex<Option<SdkEventSender>>,
    options: Mutex<Option<DeviceOptions>>,
}

/// Fake SDK; every clone shares the same counters and event sender.
#[derive(Clone, Default)]
pub struct FakeSdk {
    inner: Arc<SdkInner>,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder(&self) -> SdkBuilder<FakeSdk> {
        let sdk = self.clone();
        Box::new(move |options, events| {
            sdk.inner.built.fetch_add(1, Ordering::SeqCst);
            *sdk.inner.events.lock().unwrap() = Some(events);
            *sdk.inner.options.lock().unwrap() = Some(options);
            sdk.clone()
        })
    }

    pub fn fail_connect(&self) {
        self.inner.connect_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_pause(&self, message: &str) {
        *self.inner.pause_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn emit(&self, event: SdkEvent) {
        if let Some(tx) = self.inner.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn options(&self) -> Option<DeviceOptions> {
        self.inner.options.lock().unwrap().clone()
    }

    pub fn built(&self) -> usize {
        self.inner.built.load(Ordering::SeqCst)
    }

    pub fn activations(&self) -> usize {
        self.inner.activations.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.inner.pauses.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }
}

impl PlaybackSdk for FakeSdk {
    async fn connect(&self) -> bool {
        !self.inner.connect_fails.load(Ordering::SeqCst)
    }

    async fn activate_element(&self) -> Result<(), ApiFailure> {
        self.inner.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<(), ApiFailure> {
        self.inner.pauses.fetch_add(1, Ordering::SeqCst);
        match self.inner.pause_failure.lock().unwrap().clone() {
            Some(message) => Err(ApiFailure::transport(message)),
            None => Ok(()),
        }
    }

    fn disconnect(&self) {
        self.inner.disconnects.fetch_add(1, Ordering::SeqCst);
        self.inner.events.lock().unwrap().take();
    }
}
