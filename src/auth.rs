//! Browser sign-in and the in-memory credential store

use std::fs;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use anyhow::Result;
use chrono::Utc;

use crate::config::GameConfig;
use crate::model::{Credential, SignOutHook, TokenAccessor};

pub const SCOPES: &str =
    "streaming user-read-email user-read-private user-read-playback-state user-modify-playback-state playlist-read-private playlist-read-collaborative";

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Success</title></head>
<body><h1>Signed in, back to the game!</h1><script>window.close();</script></body>
</html>
"#;
const CACHE: &str = ".cache";
const REFRESH_TOKEN_FILE: &str = ".cache/refresh_token";

fn oauth_client(config: &GameConfig, open_browser: bool) -> Result<librespot_oauth::OAuthClient> {
    let builder = librespot_oauth::OAuthClientBuilder::new(
        &config.client_id,
        &config.redirect_uri,
        SCOPES.split_whitespace().collect(),
    );
    let builder = if open_browser {
        builder.open_in_browser().with_custom_message(RESPONSE)
    } else {
        builder
    };
    Ok(builder.build()?)
}

fn credential_from(token: librespot_oauth::OAuthToken) -> Credential {
    let remaining = token.expires_at.saturating_duration_since(Instant::now());
    let expires_at = chrono::Duration::from_std(remaining)
        .ok()
        .map(|d| Utc::now() + d);

    if let Err(e) = fs::create_dir_all(CACHE).and_then(|_| fs::write(REFRESH_TOKEN_FILE, &token.refresh_token)) {
        tracing::warn!(error = %e, "Could not persist refresh token");
    } else {
        tracing::debug!("Saved refresh token to disk");
    }

    Credential {
        access_token: token.access_token,
        refresh_token: Some(token.refresh_token),
        expires_at,
    }
}

async fn browser_sign_in(config: &GameConfig) -> Result<Credential> {
    tracing::info!("Starting browser-based OAuth flow");
    let token = oauth_client(config, true)?.get_access_token_async().await?;
    tracing::info!("Browser authentication completed successfully");
    Ok(credential_from(token))
}

/// Reuses a stored refresh token when it still works, otherwise opens the
/// browser.
pub async fn sign_in(config: &GameConfig) -> Result<Credential> {
    let Some(refresh_token) = fs::read_to_string(REFRESH_TOKEN_FILE).ok() else {
        tracing::info!("No stored refresh token, starting browser authentication");
        return browser_sign_in(config).await;
    };

    match oauth_client(config, false)?.refresh_token_async(refresh_token.trim()).await {
        Ok(token) => {
            tracing::debug!("Token refreshed successfully");
            Ok(credential_from(token))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stored refresh token failed, re-authenticating");
            browser_sign_in(config).await
        }
    }
}

/// Process-wide holder of the signed-in credential.
#[derive(Clone, Default)]
pub struct CredentialStore {
    current: Arc<RwLock<Option<Credential>>>,
}

impl CredentialStore {
    pub fn new(credential: Credential) -> Self {
        Self {
            current: Arc::new(RwLock::new(Some(credential))),
        }
    }

    pub fn current(&self) -> Option<Credential> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Re-read on every call so a swapped token is always picked up.
    pub fn accessor(&self) -> TokenAccessor {
        let store = self.clone();
        Arc::new(move || store.current())
    }

    pub fn sign_out(&self) {
        let had_credential = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if had_credential {
            tracing::warn!("Signed out, credential cleared");
            if let Err(e) = fs::remove_file(REFRESH_TOKEN_FILE) {
                tracing::debug!(error = %e, "No refresh token to remove");
            }
        }
    }

    pub fn sign_out_hook(&self) -> SignOutHook {
        let store = self.clone();
        Arc::new(move || store.sign_out())
    }
}
