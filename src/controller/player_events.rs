//! Device event listener

use std::sync::Arc;

use crate::model::{CatalogApi, DeviceErrorKind, DeviceEvent, ErrorKind, GameError, PlayerApi};
use super::device::{DeviceEvents, DeviceOutcome, PlaybackSdk};
use super::GameController;

impl<C: CatalogApi, P: PlayerApi, S: PlaybackSdk> GameController<C, P, S> {
    /// Pumps validated device events into the session until the SDK side
    /// closes. Holds only a weak reference so teardown is never blocked.
    pub(crate) fn start_device_event_listener(&self, mut events: DeviceEvents) {
        let session = Arc::downgrade(&self.inner);
        tracing::info!("Starting device event listener");

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = session.upgrade() else {
                    break;
                };
                GameController { inner }.on_device_event(event);
            }
            tracing::debug!("Device event listener shutting down");
        });
    }

    pub(crate) fn on_device_event(&self, event: DeviceEvent) {
        let outcome = self.device().apply(event);

        match outcome {
            DeviceOutcome::Ready { device_id } => {
                // A device that came up again supersedes earlier device errors.
                self.inner.model.clear_error_of(ErrorKind::Device);
                if self.inner.model.take_bootstrap() {
                    tracing::info!(device_id = %device_id, "Device ready, loading the first track");
                    let controller = self.clone();
                    tokio::spawn(async move {
                        controller.load_new_track().await;
                    });
                }
            }
            DeviceOutcome::NotReady => {
                if self.inner.window.cancel() {
                    tracing::warn!("Device went away during a snippet");
                }
            }
            DeviceOutcome::AuthFailed { message } => {
                // The device controller already requested sign-out.
                self.inner.window.cancel();
                self.inner.model.mark_signed_out();
                self.inner.model.set_error(&GameError::Device {
                    kind: DeviceErrorKind::Authentication,
                    message,
                });
            }
            DeviceOutcome::Warning { kind, message } => {
                if kind == DeviceErrorKind::Playback {
                    self.inner.window.cancel();
                }
                self.inner.model.set_error(&GameError::Device { kind, message });
            }
            DeviceOutcome::PlaybackState { paused } => {
                self.inner.model.set_device_paused(paused);
            }
            DeviceOutcome::Ignored => {}
        }
    }
}
