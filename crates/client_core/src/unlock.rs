//! Password unlock for protected albums.
//!
//! A successful unlock stores the returned token and reloads the album feed,
//! whose fetcher picks the token up from the same [`CredentialStore`].

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use shared::domain::AlbumId;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::{
    error::FetchError,
    feed::{FeedController, PageFetcher},
};

pub const PASSWORD_REQUIRED: &str = "Password required";

/// Per-album bearer tokens.
pub trait CredentialStore: Send + Sync {
    fn credential_for(&self, album_id: &AlbumId) -> Option<String>;

    fn store(&self, token: String, album_id: &AlbumId);
}

impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn credential_for(&self, album_id: &AlbumId) -> Option<String> {
        (**self).credential_for(album_id)
    }

    fn store(&self, token: String, album_id: &AlbumId) {
        (**self).store(token, album_id)
    }
}

/// Process-lifetime store; tokens are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<HashMap<AlbumId, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credential_for(&self, album_id: &AlbumId) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(album_id)
            .cloned()
    }

    fn store(&self, token: String, album_id: &AlbumId) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(album_id.clone(), token);
    }
}

#[async_trait]
pub trait AlbumUnlocker: Send + Sync + 'static {
    /// Exchanges a password for an album token.
    async fn unlock(&self, album_id: &AlbumId, password: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl<U: AlbumUnlocker> AlbumUnlocker for Arc<U> {
    async fn unlock(&self, album_id: &AlbumId, password: &str) -> Result<String, FetchError> {
        (**self).unlock(album_id, password).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockSnapshot {
    pub is_unlocking: bool,
    pub error_message: Option<String>,
}

pub struct UnlockFlow<F: PageFetcher, U: AlbumUnlocker> {
    album_id: AlbumId,
    feed: Arc<FeedController<F>>,
    unlocker: U,
    credentials: Arc<dyn CredentialStore>,
    state: Mutex<UnlockSnapshot>,
    snapshots: watch::Sender<UnlockSnapshot>,
}

impl<F: PageFetcher, U: AlbumUnlocker> UnlockFlow<F, U> {
    pub fn new(
        album_id: AlbumId,
        feed: Arc<FeedController<F>>,
        unlocker: U,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let (snapshots, _) = watch::channel(UnlockSnapshot::default());
        Self {
            album_id,
            feed,
            unlocker,
            credentials,
            state: Mutex::new(UnlockSnapshot::default()),
            snapshots,
        }
    }

    pub fn album_id(&self) -> &AlbumId {
        &self.album_id
    }

    pub fn feed(&self) -> &Arc<FeedController<F>> {
        &self.feed
    }

    pub async fn snapshot(&self) -> UnlockSnapshot {
        self.state.lock().await.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UnlockSnapshot> {
        self.snapshots.subscribe()
    }

    /// Trades `password` for a token, then reloads the album from page 1.
    ///
    /// Returns `false` when an unlock is already running. Failures are kept
    /// in this flow's snapshot; the feed is left untouched.
    pub async fn submit(&self, password: &str) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.is_unlocking {
                return false;
            }
            if password.trim().is_empty() {
                state.error_message = Some(PASSWORD_REQUIRED.to_string());
                self.publish(&state);
                return true;
            }
            state.is_unlocking = true;
            state.error_message = None;
            self.publish(&state);
        }

        let result = self.unlocker.unlock(&self.album_id, password).await;
        match result {
            Ok(token) => {
                info!(album_id = %self.album_id, "unlock: album unlocked");
                self.credentials.store(token, &self.album_id);
                self.feed.load_initial().await;
            }
            Err(err) => {
                warn!(album_id = %self.album_id, error = %err, "unlock: rejected");
                self.state.lock().await.error_message = Some(err.to_string());
            }
        }

        let mut state = self.state.lock().await;
        state.is_unlocking = false;
        self.publish(&state);
        true
    }

    fn publish(&self, state: &UnlockSnapshot) {
        self.snapshots.send_replace(state.clone());
    }
}

#[cfg(test)]
#[path = "tests/unlock_tests.rs"]
mod tests;
