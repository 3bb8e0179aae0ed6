//! Time-boxed snippet playback
//!
//! `play` activates the local element, transfers playback to the device
//! (paused), starts the track at 0 and arms a cancellable timer that pauses
//! the device when the snippet runs out. At most one window is armed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::model::{Credential, DeviceStatus, GameError, PlayerApi, PreconditionReason, Track};
use super::device::{DeviceSnapshot, PlaybackSdk};

/// The armed window. Dropping the handle does not cancel it; `abort` does.
struct ArmedWindow {
    track_uri: String,
    started_at: Instant,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct WindowSlot {
    armed: Option<ArmedWindow>,
    playing: bool,
    /// Bumped on every arm/cancel so an outdated timer cannot clear a newer window
    generation: u64,
}

pub struct PlaybackWindowController<P> {
    player: P,
    duration: Duration,
    slot: Arc<Mutex<WindowSlot>>,
}

fn lock(slot: &Mutex<WindowSlot>) -> MutexGuard<'_, WindowSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: PlayerApi> PlaybackWindowController<P> {
    pub fn new(player: P, duration: Duration) -> Self {
        Self {
            player,
            duration,
            slot: Arc::new(Mutex::new(WindowSlot::default())),
        }
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.slot).playing
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.slot).armed.is_some()
    }

    /// Remaining time of the armed window, if any
    pub fn remaining(&self) -> Option<Duration> {
        lock(&self.slot)
            .armed
            .as_ref()
            .map(|w| self.duration.saturating_sub(w.started_at.elapsed()))
    }

    pub async fn play<S: PlaybackSdk>(
        &self,
        device: &DeviceSnapshot<S>,
        track: Option<&Track>,
        credential: Option<&Credential>,
    ) -> Result<(), GameError> {
        let sdk = match (&device.sdk, device.state.status) {
            (Some(sdk), DeviceStatus::Ready) => sdk.clone(),
            _ => return Err(GameError::PlaybackPrecondition(PreconditionReason::DeviceNotReady)),
        };
        let device_id = device
            .state
            .device_id
            .as_deref()
            .ok_or(GameError::PlaybackPrecondition(PreconditionReason::MissingDeviceId))?;
        let uri = track
            .map(|t| t.play_uri.as_str())
            .filter(|uri| !uri.is_empty())
            .ok_or(GameError::PlaybackPrecondition(PreconditionReason::MissingTrackUri))?;
        let access_token = credential
            .filter(|c| c.has_access_token())
            .map(|c| c.access_token.as_str())
            .ok_or(GameError::PlaybackPrecondition(PreconditionReason::MissingAccessToken))?;

        tracing::info!(uri, device_id, "Playing track snippet");

        sdk.activate_element().await.map_err(|failure| GameError::Device {
            kind: crate::model::DeviceErrorKind::Playback,
            message: failure.message,
        })?;

        self.player
            .transfer_playback(access_token, device_id, false)
            .await
            .map_err(|failure| GameError::PlaybackTransfer {
                status: failure.status,
                message: failure.message,
            })?;
        tracing::debug!("Playback transferred to game device");

        // A transfer without a following play is left in place.
        self.player
            .start_playback(access_token, device_id, uri, 0)
            .await
            .map_err(|failure| GameError::PlaybackStart {
                status: failure.status,
                message: failure.message,
            })?;
        tracing::debug!("Playback started");

        self.arm(sdk, uri);
        Ok(())
    }

    fn arm<S: PlaybackSdk>(&self, sdk: Arc<S>, uri: &str) {
        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.armed.take() {
            tracing::debug!(uri = %previous.track_uri, "Cancelling previous snippet timer");
            previous.timer.abort();
        }
        slot.generation += 1;
        slot.playing = true;

        let generation = slot.generation;
        let duration = self.duration;
        let shared = self.slot.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            match sdk.pause().await {
                Ok(()) => tracing::info!(duration_ms = duration.as_millis() as u64, "Paused playback after snippet"),
                Err(e) => tracing::warn!(error = %e, "Failed to pause at end of snippet"),
            }
            let mut slot = lock(&shared);
            if slot.generation == generation {
                slot.armed = None;
                slot.playing = false;
            }
        });

        slot.armed = Some(ArmedWindow {
            track_uri: uri.to_string(),
            started_at: Instant::now(),
            timer,
        });
    }

    /// Cancels any armed timer and marks playback stopped without touching
    /// the device. Returns whether a window was armed.
    pub fn cancel(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        slot.playing = false;
        match slot.armed.take() {
            Some(window) => {
                window.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Idempotent stop. Playing is cleared even if the pause command fails.
    pub async fn stop<S: PlaybackSdk>(&self, sdk: Option<Arc<S>>) -> Result<(), GameError> {
        let was_playing = self.is_playing();
        let was_armed = self.cancel();
        if !was_armed && !was_playing {
            return Ok(());
        }

        let Some(sdk) = sdk else {
            return Ok(());
        };
        match sdk.pause().await {
            Ok(()) => {
                tracing::info!("Playback stopped manually");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Error stopping playback");
                Err(GameError::Stop(e.message))
            }
        }
    }
}

impl<P> Drop for PlaybackWindowController<P> {
    fn drop(&mut self) {
        if let Some(window) = lock(&self.slot).armed.take() {
            window.timer.abort();
        }
    }
}
