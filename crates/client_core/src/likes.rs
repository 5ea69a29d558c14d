//! Like counter for a single media item or album.
//!
//! Toggles are applied optimistically. Each request carries a sequence number
//! and only the latest one may settle the displayed state.

use async_trait::async_trait;
use shared::protocol::LikeResponse;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeStatus {
    pub likes: u32,
    pub liked: bool,
}

impl LikeStatus {
    pub fn new(likes: u32, liked: bool) -> Self {
        Self { likes, liked }
    }

    /// The state the server should report once a toggle succeeds.
    pub fn toggled(self) -> Self {
        if self.liked {
            Self::new(self.likes.saturating_sub(1), false)
        } else {
            Self::new(self.likes.saturating_add(1), true)
        }
    }
}

impl From<LikeResponse> for LikeStatus {
    fn from(response: LikeResponse) -> Self {
        Self::new(response.likes, response.liked)
    }
}

/// Like endpoints for one target.
#[async_trait]
pub trait LikeService: Send + Sync + 'static {
    async fn fetch_status(&self) -> Result<LikeStatus, FetchError>;

    async fn set_liked(&self, liked: bool) -> Result<LikeStatus, FetchError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LikeSnapshot {
    pub likes: u32,
    pub liked: bool,
    pub is_loading: bool,
    pub is_updating: bool,
    pub error_message: Option<String>,
}

#[derive(Default)]
struct LikeState {
    shown: LikeStatus,
    confirmed: LikeStatus,
    confirmed_request: u64,
    latest_request: u64,
    latest_load: u64,
    pending_toggle: Option<u64>,
    is_loading: bool,
    error_message: Option<String>,
}

impl LikeState {
    fn issue(&mut self) -> u64 {
        self.latest_request += 1;
        self.latest_request
    }

    /// Records a server answer; older answers never overwrite newer ones.
    fn confirm(&mut self, request_id: u64, status: LikeStatus) {
        if request_id >= self.confirmed_request {
            self.confirmed_request = request_id;
            self.confirmed = status;
        }
    }

    fn snapshot(&self) -> LikeSnapshot {
        LikeSnapshot {
            likes: self.shown.likes,
            liked: self.shown.liked,
            is_loading: self.is_loading,
            is_updating: self.pending_toggle.is_some(),
            error_message: self.error_message.clone(),
        }
    }
}

pub struct LikeController<S: LikeService> {
    service: S,
    state: Mutex<LikeState>,
    snapshots: watch::Sender<LikeSnapshot>,
}

impl<S: LikeService> LikeController<S> {
    pub fn new(service: S) -> Self {
        Self::with_status(service, LikeStatus::default())
    }

    /// Seeds the counter with a value already known from a list response.
    pub fn with_status(service: S, status: LikeStatus) -> Self {
        let state = LikeState {
            shown: status,
            confirmed: status,
            ..LikeState::default()
        };
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            service,
            state: Mutex::new(state),
            snapshots,
        }
    }

    pub async fn snapshot(&self) -> LikeSnapshot {
        self.state.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<LikeSnapshot> {
        self.snapshots.subscribe()
    }

    /// Fetches the current count. A failure keeps the displayed state.
    pub async fn load(&self) {
        let request_id = {
            let mut state = self.state.lock().await;
            state.is_loading = true;
            let request_id = state.issue();
            state.latest_load = request_id;
            self.publish(&state);
            request_id
        };

        let result = self.service.fetch_status().await;

        let mut state = self.state.lock().await;
        if state.latest_load == request_id {
            state.is_loading = false;
        }
        if state.latest_request == request_id {
            state.pending_toggle = None;
        }
        match result {
            Ok(status) => {
                state.confirm(request_id, status);
                if state.latest_request == request_id {
                    state.shown = status;
                    state.error_message = None;
                }
            }
            Err(err) => {
                warn!(error = %err, "likes: status fetch failed");
                if state.latest_request == request_id {
                    state.error_message = Some(err.to_string());
                }
            }
        }
        self.publish(&state);
    }

    /// Flips `liked` immediately and sends the matching request.
    pub async fn toggle(&self) {
        let (request_id, desired) = {
            let mut state = self.state.lock().await;
            state.shown = state.shown.toggled();
            state.error_message = None;
            let request_id = state.issue();
            state.pending_toggle = Some(request_id);
            self.publish(&state);
            (request_id, state.shown.liked)
        };
        debug!(request_id, liked = desired, "likes: toggle issued");

        let result = self.service.set_liked(desired).await;

        let mut state = self.state.lock().await;
        if let Ok(status) = &result {
            state.confirm(request_id, *status);
        }
        if state.latest_request != request_id {
            debug!(
                request_id,
                latest = state.latest_request,
                "likes: dropping superseded response"
            );
            return;
        }

        state.pending_toggle = None;
        match result {
            Ok(status) => state.shown = status,
            Err(err) => {
                warn!(request_id, error = %err, "likes: toggle failed, reverting");
                state.shown = state.confirmed;
                state.error_message = Some(err.to_string());
            }
        }
        self.publish(&state);
    }

    fn publish(&self, state: &LikeState) {
        self.snapshots.send_replace(state.snapshot());
    }
}

#[cfg(test)]
#[path = "tests/likes_tests.rs"]
mod tests;
