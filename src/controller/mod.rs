//! Controller module - game orchestration and event handling
//!
//! - `device`: Playback device lifecycle and SDK event validation
//! - `playback`: Time-boxed snippet playback
//! - `player_events`: Reactions to validated device events
//! - `input`: Key event handling

mod device;
mod playback;
mod player_events;
mod input;

pub use device::{DeviceOptions, PlaybackSdk, SdkBuilder, SdkEvent, SdkEventSender};

use device::PlaybackDeviceController;
use playback::PlaybackWindowController;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::config::GameConfig;
use crate::model::{
    CatalogApi, DeviceErrorKind, GameError, GameModel, GameState, PlayerApi, PreconditionReason, SignOutHook,
    TokenAccessor, TrackCatalogResolver,
};

struct Inner<C, P, S> {
    model: GameModel,
    device: Mutex<PlaybackDeviceController<S>>,
    window: PlaybackWindowController<P>,
    resolver: TrackCatalogResolver<C>,
    credentials: TokenAccessor,
    sign_out: SignOutHook,
    should_quit: AtomicBool,
}

/// The game session: composes track resolution, the device and the snippet
/// window into one observable [`GameState`].
///
/// Cheap to clone; clones share the session.
pub struct GameController<C, P, S> {
    inner: Arc<Inner<C, P, S>>,
}

impl<C, P, S> Clone for GameController<C, P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: CatalogApi, P: PlayerApi, S: PlaybackSdk> GameController<C, P, S> {
    pub fn new(
        catalog: C,
        player: P,
        sdk_builder: SdkBuilder<S>,
        config: &GameConfig,
        credentials: TokenAccessor,
        sign_out: SignOutHook,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner<C, P, S>>| {
            let mut device = PlaybackDeviceController::new(sdk_builder, config.device.clone(), sign_out.clone());

            let weak = weak.clone();
            device.on_sdk_ready(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let controller = GameController { inner };
                    tokio::spawn(async move {
                        controller.initialize_device().await;
                    });
                }
            }));

            Inner {
                model: GameModel::new(),
                device: Mutex::new(device),
                window: PlaybackWindowController::new(player, config.snippet),
                resolver: TrackCatalogResolver::new(catalog, config.catalog.clone()),
                credentials,
                sign_out,
                should_quit: AtomicBool::new(false),
            }
        });

        Self { inner }
    }

    fn device(&self) -> MutexGuard<'_, PlaybackDeviceController<S>> {
        self.inner.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The caller reports that the playback SDK is available.
    pub fn sdk_loaded(&self) -> bool {
        self.device().notify_sdk_ready()
    }

    pub(crate) async fn initialize_device(&self) {
        let started = self.device().initialize(self.inner.credentials.clone());
        let Some((sdk, events)) = started else {
            return;
        };
        self.start_device_event_listener(events);

        let connected = sdk.connect().await;
        let failed = self.device().connect_finished(&sdk, connected);
        if failed {
            self.inner.model.set_error_if_clear(&GameError::Device {
                kind: DeviceErrorKind::Initialization,
                message: "player connection could not be established".to_string(),
            });
        }
    }

    // ========================================================================
    // Caller operations
    // ========================================================================

    /// Resolves a fresh track. Ignored while another load is in flight.
    pub async fn load_new_track(&self) {
        let Some(loading) = self.inner.model.begin_loading() else {
            tracing::debug!("Track load already in flight, ignoring request");
            return;
        };

        if self.inner.window.is_playing() || self.inner.window.is_armed() {
            self.stop_playback().await;
        }
        self.inner.model.clear_round();

        let Some(credential) = (self.inner.credentials)() else {
            tracing::warn!("No credential available, cannot load a track");
            loading.finish(Err(GameError::NotSignedIn));
            return;
        };

        let result = self.inner.resolver.resolve(&credential).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, "Failed to load a new track");
            if err.is_auth() {
                self.request_sign_out();
            }
        }
        loading.finish(result);
    }

    pub async fn play_snippet(&self) {
        if self.inner.model.is_revealed() {
            self.inner
                .model
                .set_error(&GameError::PlaybackPrecondition(PreconditionReason::AnswerRevealed));
            return;
        }

        if self.inner.window.is_playing() || self.inner.window.is_armed() {
            self.stop_playback().await;
        }
        self.inner.model.clear_error();

        let round = self.inner.model.round();
        let device = self.device().snapshot();
        let track = self.inner.model.current_track();
        let credential = (self.inner.credentials)();

        let result = self
            .inner
            .window
            .play(&device, track.as_ref(), credential.as_ref())
            .await;

        match result {
            Ok(()) if self.inner.model.is_detached() => {
                tracing::debug!("Session torn down while starting playback");
                self.inner.window.cancel();
            }
            Ok(()) => {
                // The round may have been revealed or replaced, or the device
                // lost, while the playback requests were in flight.
                let round_moved = self.inner.model.round() != round;
                let device_ready = self.device().state().ready();
                if round_moved || !device_ready {
                    tracing::info!(round_moved, device_ready, "Snippet outlived its round, stopping it");
                    self.stop_playback().await;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to play snippet");
                self.inner.window.cancel();
                self.inner.model.set_error(&err);
            }
        }
    }

    pub async fn stop_playback(&self) {
        let sdk = self.device().connection();
        if let Err(err) = self.inner.window.stop(sdk).await {
            self.inner.model.set_error(&err);
        }
    }

    /// Reveals the answer; playback is always stopped afterwards.
    pub async fn submit_guess(&self) {
        self.inner.model.reveal();
        self.stop_playback().await;
    }

    pub fn dismiss_error(&self) {
        self.inner.model.clear_error();
    }

    pub fn snapshot(&self) -> GameState {
        let mut state = self.inner.model.snapshot();
        let device = self.device().state().clone();
        state.is_playing = self.inner.window.is_playing();
        state.player_ready = device.ready();
        state.device_id = device.device_id;
        state
    }

    /// Time left in the current snippet
    pub fn snippet_remaining(&self) -> Option<Duration> {
        self.inner.window.remaining()
    }

    pub fn request_quit(&self) {
        self.inner.should_quit.store(true, Ordering::SeqCst);
    }

    pub fn should_quit(&self) -> bool {
        self.inner.should_quit.load(Ordering::SeqCst)
    }

    /// Cancels the window, releases the device and detaches the state so
    /// late completions cannot touch it. Safe to call more than once.
    pub fn teardown(&self) {
        tracing::info!("Tearing down game session");
        self.inner.window.cancel();
        self.device().teardown();
        self.inner.model.detach();
    }

    fn request_sign_out(&self) {
        tracing::warn!("Credential rejected, requesting sign-out");
        self.inner.model.mark_signed_out();
        (self.inner.sign_out)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use crate::model::{ApiFailure, Credential, ErrorKind};
    use crate::test_support::{candidates, FakeCatalog, FakePlayer, FakeSdk, PlayerCall};

    type TestController = GameController<FakeCatalog, FakePlayer, FakeSdk>;

    struct Harness {
        controller: TestController,
        catalog: FakeCatalog,
        player: FakePlayer,
        sdk: FakeSdk,
        sign_outs: Arc<AtomicUsize>,
    }

    fn harness_with(catalog: FakeCatalog, player: FakePlayer, credential: Option<Credential>) -> Harness {
        harness_with_accessor(catalog, player, Arc::new(move || credential.clone()))
    }

    fn harness_with_accessor(catalog: FakeCatalog, player: FakePlayer, credentials: TokenAccessor) -> Harness {
        let sdk = FakeSdk::new();
        let sign_outs = Arc::new(AtomicUsize::new(0));
        let counter = sign_outs.clone();
        let controller = GameController::new(
            catalog.clone(),
            player.clone(),
            sdk.builder(),
            &GameConfig::default(),
            credentials,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        Harness {
            controller,
            catalog,
            player,
            sdk,
            sign_outs,
        }
    }

    fn harness(catalog: FakeCatalog) -> Harness {
        harness_with(catalog, FakePlayer::new(), Some(Credential::new("token")))
    }

    fn playlist(total: usize, playable: usize) -> FakeCatalog {
        FakeCatalog::new().with_playlist(Ok(candidates("p", total, playable)))
    }

    /// Lets every spawned task run until idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn connect_ready(h: &Harness) {
        assert!(h.controller.sdk_loaded());
        settle().await;
        h.sdk.emit(SdkEvent::Ready { device_id: Some("dev".into()) });
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_ready_bootstraps_exactly_one_load() {
        let h = harness(playlist(10, 4));
        connect_ready(&h).await;

        let state = h.controller.snapshot();
        assert!(state.player_ready);
        assert_eq!(state.device_id.as_deref(), Some("dev"));
        assert!(state.current_track.unwrap().id.starts_with("p-"));
        assert!(!state.is_loading);
        assert_eq!(h.catalog.playlist_calls(), 1);

        h.sdk.emit(SdkEvent::NotReady { device_id: Some("dev".into()) });
        h.sdk.emit(SdkEvent::Ready { device_id: Some("dev".into()) });
        settle().await;
        assert_eq!(h.catalog.playlist_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_device_error_still_loads_first_track() {
        let h = harness(playlist(3, 3));
        assert!(h.controller.sdk_loaded());
        settle().await;

        h.sdk.emit(SdkEvent::InitializationError { message: "transient".into() });
        h.sdk.emit(SdkEvent::Ready { device_id: Some("dev".into()) });
        settle().await;

        let state = h.controller.snapshot();
        assert!(state.player_ready);
        assert_eq!(state.error, None);
        assert!(state.current_track.is_some());
        assert_eq!(h.catalog.playlist_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_keeps_auth_errors() {
        let h = harness(FakeCatalog::new().with_playlist(Err(ApiFailure::status(401, "Invalid access token"))));
        connect_ready(&h).await;

        h.sdk.emit(SdkEvent::NotReady { device_id: Some("dev".into()) });
        h.sdk.emit(SdkEvent::Ready { device_id: Some("dev".into()) });
        settle().await;

        assert_eq!(h.controller.snapshot().error.unwrap().kind, ErrorKind::Auth);
    }

    #[tokio::test(start_paused = true)]
    async fn second_load_while_pending_is_rejected() {
        let gate = Arc::new(Notify::new());
        let h = harness(playlist(5, 5).with_gate(gate.clone()));

        let pending = h.controller.clone();
        tokio::spawn(async move { pending.load_new_track().await });
        settle().await;
        assert!(h.controller.snapshot().is_loading);

        h.controller.load_new_track().await;
        assert_eq!(h.catalog.playlist_calls(), 1);

        gate.notify_one();
        settle().await;
        let state = h.controller.snapshot();
        assert!(!state.is_loading);
        assert!(state.current_track.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credential_is_not_signed_in() {
        let h = harness_with(playlist(5, 5), FakePlayer::new(), None);
        h.controller.load_new_track().await;

        let state = h.controller.snapshot();
        assert_eq!(state.error.unwrap().kind, ErrorKind::SignedOut);
        assert!(!state.is_loading);
        assert_eq!(h.catalog.playlist_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn snippet_auto_pauses_after_the_window() {
        let h = harness(playlist(5, 5));
        connect_ready(&h).await;

        h.controller.play_snippet().await;
        assert!(h.controller.snapshot().is_playing);
        assert!(h.controller.snippet_remaining().is_some());

        tokio::time::sleep(Duration::from_millis(9001)).await;
        settle().await;

        let state = h.controller.snapshot();
        assert!(!state.is_playing);
        assert_eq!(state.error, None);
        assert_eq!(h.sdk.pauses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn play_before_device_ready_makes_no_calls() {
        let h = harness(playlist(5, 5));
        h.controller.load_new_track().await;

        h.controller.play_snippet().await;

        let state = h.controller.snapshot();
        assert_eq!(state.error.unwrap().kind, ErrorKind::Precondition);
        assert!(!state.is_playing);
        assert!(h.player.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_forces_not_playing() {
        let h = harness_with(
            playlist(5, 5),
            FakePlayer::new().fail_start(ApiFailure::status(502, "Bad gateway")),
            Some(Credential::new("token")),
        );
        connect_ready(&h).await;

        h.controller.play_snippet().await;

        let state = h.controller.snapshot();
        assert!(!state.is_playing);
        let error = state.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Playback);
        assert!(!error.retryable);
    }

    #[tokio::test(start_paused = true)]
    async fn guess_reveals_and_stops_even_when_pause_fails() {
        let h = harness(playlist(1, 1));
        connect_ready(&h).await;
        h.controller.play_snippet().await;
        h.sdk.fail_pause("device unreachable");

        h.controller.inner.model.set_guess("song p 0".into());
        h.controller.submit_guess().await;

        let state = h.controller.snapshot();
        assert!(state.revealed);
        assert!(!state.is_playing);
        assert_eq!(state.guess_correct, Some(true));
        assert_eq!(state.error.unwrap().kind, ErrorKind::Stop);
    }

    #[tokio::test(start_paused = true)]
    async fn play_after_reveal_is_rejected() {
        let h = harness(playlist(1, 1));
        connect_ready(&h).await;
        h.controller.submit_guess().await;

        h.controller.play_snippet().await;

        let state = h.controller.snapshot();
        assert_eq!(state.error.unwrap().kind, ErrorKind::Precondition);
        assert!(!state.is_playing);
        assert!(h.player.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn guess_during_pending_play_leaves_nothing_armed() {
        let gate = Arc::new(Notify::new());
        let h = harness_with(
            playlist(1, 1),
            FakePlayer::new().with_gate(gate.clone()),
            Some(Credential::new("token")),
        );
        connect_ready(&h).await;

        let playing = h.controller.clone();
        let play = tokio::spawn(async move { playing.play_snippet().await });
        settle().await;
        h.controller.submit_guess().await;
        gate.notify_one();
        play.await.unwrap();

        let state = h.controller.snapshot();
        assert!(state.revealed);
        assert!(!state.is_playing);
        assert_eq!(h.controller.snippet_remaining(), None);
        assert_eq!(h.sdk.pauses(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.sdk.pauses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn device_lost_during_pending_play_is_not_playing() {
        let gate = Arc::new(Notify::new());
        let h = harness_with(
            playlist(1, 1),
            FakePlayer::new().with_gate(gate.clone()),
            Some(Credential::new("token")),
        );
        connect_ready(&h).await;

        let playing = h.controller.clone();
        let play = tokio::spawn(async move { playing.play_snippet().await });
        settle().await;
        h.sdk.emit(SdkEvent::NotReady { device_id: Some("dev".into()) });
        settle().await;
        gate.notify_one();
        play.await.unwrap();

        let state = h.controller.snapshot();
        assert!(!state.player_ready);
        assert!(!state.is_playing);
        assert_eq!(h.controller.snippet_remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn every_call_reads_the_current_token() {
        let current = Arc::new(Mutex::new(Credential::new("first")));
        let accessor = current.clone();
        let h = harness_with_accessor(
            playlist(3, 3),
            FakePlayer::new(),
            Arc::new(move || Some(accessor.lock().unwrap().clone())),
        );
        connect_ready(&h).await;
        h.controller.play_snippet().await;

        *current.lock().unwrap() = Credential::new("refreshed");
        h.controller.load_new_track().await;
        h.controller.play_snippet().await;

        assert_eq!(h.catalog.tokens(), vec!["first", "refreshed"]);
        let player_tokens: Vec<String> = h.player.calls().iter().map(|c| c.token().to_string()).collect();
        assert_eq!(player_tokens, vec!["first", "first", "refreshed", "refreshed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn replaying_stops_the_current_window_first() {
        let h = harness(playlist(3, 3));
        connect_ready(&h).await;

        h.controller.play_snippet().await;
        tokio::time::sleep(Duration::from_millis(3000)).await;
        h.controller.play_snippet().await;

        assert_eq!(h.sdk.pauses(), 1);
        assert!(h.controller.snapshot().is_playing);
        let starts = h
            .player
            .calls()
            .into_iter()
            .filter(|c| matches!(c, PlayerCall::Start { .. }))
            .count();
        assert_eq!(starts, 2);

        tokio::time::sleep(Duration::from_millis(9001)).await;
        settle().await;
        assert_eq!(h.sdk.pauses(), 2);
        assert!(!h.controller.snapshot().is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn new_track_stops_playback_and_hides_answer() {
        let h = harness(playlist(3, 3));
        connect_ready(&h).await;
        h.controller.play_snippet().await;

        h.controller.load_new_track().await;

        let state = h.controller.snapshot();
        assert!(!state.is_playing);
        assert!(!state.revealed);
        assert_eq!(h.sdk.pauses(), 1);
        assert_eq!(h.catalog.playlist_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn device_authentication_error_signs_out_once() {
        let h = harness(playlist(3, 3));
        connect_ready(&h).await;

        h.sdk.emit(SdkEvent::AuthenticationError { message: "token rejected".into() });
        settle().await;

        let state = h.controller.snapshot();
        assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
        assert_eq!(state.error.unwrap().kind, ErrorKind::Auth);
        assert!(state.signed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_catalog_signs_out() {
        let h = harness(FakeCatalog::new().with_playlist(Err(ApiFailure::status(401, "Invalid access token"))));
        connect_ready(&h).await;

        let state = h.controller.snapshot();
        assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
        assert!(state.signed_out);
        assert_eq!(state.current_track, None);
        let error = state.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Auth);
        assert!(!error.retryable);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_error_ends_the_window() {
        let h = harness(playlist(3, 3));
        connect_ready(&h).await;
        h.controller.play_snippet().await;

        h.sdk.emit(SdkEvent::PlaybackError { message: "decoder failed".into() });
        settle().await;

        let state = h.controller.snapshot();
        assert!(!state.is_playing);
        assert!(state.player_ready);
        assert_eq!(state.error.unwrap().kind, ErrorKind::Device);
    }

    #[tokio::test(start_paused = true)]
    async fn device_state_changes_are_mirrored_only() {
        let h = harness(playlist(3, 3));
        connect_ready(&h).await;
        h.controller.play_snippet().await;

        h.sdk.emit(SdkEvent::PlayerStateChanged { paused: Some(true) });
        h.sdk.emit(SdkEvent::PlayerStateChanged { paused: None });
        settle().await;

        let state = h.controller.snapshot();
        assert_eq!(state.device_paused, Some(true));
        assert!(state.is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_records_initialization_error() {
        let h = harness(playlist(3, 3));
        h.sdk.fail_connect();

        h.controller.sdk_loaded();
        settle().await;

        let state = h.controller.snapshot();
        assert!(!state.player_ready);
        let error = state.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Device);
        assert!(error.message.contains("connection"));
        assert_eq!(h.sdk.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_releases_device_and_ignores_late_events() {
        let h = harness(playlist(3, 3));
        connect_ready(&h).await;
        h.controller.play_snippet().await;

        h.controller.teardown();
        h.controller.teardown();

        assert_eq!(h.sdk.disconnects(), 1);
        assert!(!h.controller.sdk_loaded());
        h.sdk.emit(SdkEvent::Ready { device_id: Some("dev".into()) });
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(h.sdk.pauses(), 0);
        assert_eq!(h.controller.snapshot(), GameState::default());
    }
}
