//! librespot-backed playback device
//!
//! Registers a Spotify Connect device for this process and reports its
//! lifecycle on the SDK event channel.

use std::sync::{Mutex, MutexGuard, PoisonError};
use librespot::connect::{ConnectConfig, Spirc};
use librespot::core::authentication::Credentials;
use librespot::core::config::SessionConfig;
use librespot::core::error::ErrorKind;
use librespot::core::session::Session;
use librespot::core::Error;
use librespot::playback::config::{AudioFormat, Bitrate, PlayerConfig};
use librespot::playback::mixer::{self, MixerConfig};
use librespot::playback::player::{Player, PlayerEvent, PlayerEventChannel};
use librespot::playback::audio_backend;
use tokio::task::JoinHandle;

use crate::controller::{DeviceOptions, PlaybackSdk, SdkEvent, SdkEventSender};
use crate::model::ApiFailure;

struct Backend {
    spirc: Spirc,
    event_forwarder: JoinHandle<()>,
}

pub struct LibrespotDevice {
    options: DeviceOptions,
    events: SdkEventSender,
    device_id: String,
    backend: Mutex<Option<Backend>>,
}

impl LibrespotDevice {
    pub fn new(options: DeviceOptions, events: SdkEventSender) -> Self {
        let device_id = device_id(&options.name);
        Self {
            options,
            events,
            device_id,
            backend: Mutex::new(None),
        }
    }

    fn backend(&self) -> MutexGuard<'_, Option<Backend>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, event: SdkEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Device event receiver is gone");
        }
    }

    async fn start(&self) -> Result<Backend, Error> {
        let credential = (self.options.token)()
            .filter(|c| c.has_access_token())
            .ok_or_else(|| Error::unauthenticated("no access token available"))?;
        let credentials = Credentials::with_access_token(credential.access_token);

        let session_config = SessionConfig {
            device_id: self.device_id.clone(),
            ..Default::default()
        };
        let player_config = PlayerConfig {
            bitrate: Bitrate::Bitrate320,
            ..Default::default()
        };
        let connect_config = ConnectConfig {
            name: self.options.name.clone(),
            ..Default::default()
        };
        let audio_format = AudioFormat::default();
        let sink_builder = audio_backend::find(None).ok_or_else(|| Error::unavailable("no audio backend found"))?;
        let mixer_builder = mixer::find(None).ok_or_else(|| Error::unavailable("no mixer found"))?;

        tracing::info!(device_name = %self.options.name, device_id = %self.device_id, "Connecting librespot");
        let session = Session::new(session_config, None);

        let mixer = mixer_builder(MixerConfig::default())?;
        mixer.set_volume(volume_level(self.options.volume));

        let player = Player::new(
            player_config,
            session.clone(),
            mixer.get_soft_volume(),
            move || sink_builder(None, audio_format),
        );
        let player_events = player.get_player_event_channel();

        let (spirc, spirc_task) = Spirc::new(connect_config, session, credentials, player, mixer).await?;

        let events = self.events.clone();
        let device_id = self.device_id.clone();
        tokio::spawn(async move {
            spirc_task.await;
            tracing::info!("Spirc task finished");
            let _ = events.send(SdkEvent::NotReady {
                device_id: Some(device_id),
            });
        });

        let event_forwarder = tokio::spawn(forward_player_events(
            player_events,
            self.events.clone(),
            self.device_id.clone(),
        ));

        Ok(Backend { spirc, event_forwarder })
    }
}

impl PlaybackSdk for LibrespotDevice {
    /// Only a connection that could not be set up at all resolves `false`.
    /// A rejected token or account is reported as an event instead, like a
    /// server-side rejection after the connection went through.
    async fn connect(&self) -> bool {
        if self.backend().is_some() {
            return true;
        }

        match self.start().await {
            Ok(backend) => {
                *self.backend() = Some(backend);
                tracing::info!(device_id = %self.device_id, "Playback device registered");
                self.report(SdkEvent::Ready {
                    device_id: Some(self.device_id.clone()),
                });
                true
            }
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind, "Failed to start playback device");
                let message = e.to_string();
                match e.kind {
                    ErrorKind::Unauthenticated => {
                        self.report(SdkEvent::AuthenticationError { message });
                        true
                    }
                    ErrorKind::PermissionDenied => {
                        self.report(SdkEvent::AccountError { message });
                        true
                    }
                    _ => {
                        self.report(SdkEvent::InitializationError { message });
                        false
                    }
                }
            }
        }
    }

    async fn activate_element(&self) -> Result<(), ApiFailure> {
        let guard = self.backend();
        let backend = guard
            .as_ref()
            .ok_or_else(|| ApiFailure::transport("playback device is not connected"))?;
        backend
            .spirc
            .activate()
            .map_err(|e| ApiFailure::transport(format!("Failed to activate device: {}", e)))
    }

    async fn pause(&self) -> Result<(), ApiFailure> {
        let guard = self.backend();
        let backend = guard
            .as_ref()
            .ok_or_else(|| ApiFailure::transport("playback device is not connected"))?;
        backend
            .spirc
            .pause()
            .map_err(|e| ApiFailure::transport(format!("Failed to pause: {}", e)))
    }

    fn disconnect(&self) {
        if let Some(backend) = self.backend().take() {
            backend.event_forwarder.abort();
            if let Err(e) = backend.spirc.shutdown() {
                tracing::warn!(error = %e, "Spirc shutdown failed");
            }
            tracing::info!("Playback device disconnected");
        }
    }
}

async fn forward_player_events(mut channel: PlayerEventChannel, events: SdkEventSender, device_id: String) {
    while let Some(event) = channel.recv().await {
        let translated = match event {
            PlayerEvent::Playing { position_ms, .. } => {
                tracing::trace!(position_ms, "PlayerEvent::Playing");
                SdkEvent::PlayerStateChanged { paused: Some(false) }
            }
            PlayerEvent::Paused { position_ms, .. } => {
                tracing::debug!(position_ms, "PlayerEvent::Paused");
                SdkEvent::PlayerStateChanged { paused: Some(true) }
            }
            PlayerEvent::Stopped { .. } | PlayerEvent::EndOfTrack { .. } => {
                SdkEvent::PlayerStateChanged { paused: Some(true) }
            }
            PlayerEvent::Unavailable { .. } => SdkEvent::PlaybackError {
                message: "track is unavailable on this device".to_string(),
            },
            PlayerEvent::SessionConnected { .. } => SdkEvent::Ready {
                device_id: Some(device_id.clone()),
            },
            PlayerEvent::SessionDisconnected { .. } => SdkEvent::NotReady {
                device_id: Some(device_id.clone()),
            },
            _ => continue,
        };
        if events.send(translated).is_err() {
            break;
        }
    }
    tracing::debug!("Player event forwarder shutting down");
}

fn device_id(name: &str) -> String {
    // Consistent per machine
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}-{}", name.replace(' ', "-"), hostname)
}

fn volume_level(volume: f32) -> u16 {
    (volume.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16
}
