use std::sync::Arc;

use async_trait::async_trait;
use shared::protocol::{AlbumComment, CommentInput, CommentPostData};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// Comment endpoints for one album.
#[async_trait]
pub trait CommentService: Send + Sync + 'static {
    async fn fetch_comments(&self) -> Result<Vec<AlbumComment>, FetchError>;

    async fn post_comment(&self, input: &CommentInput) -> Result<Option<CommentPostData>, FetchError>;
}

#[async_trait]
impl<S: CommentService> CommentService for Arc<S> {
    async fn fetch_comments(&self) -> Result<Vec<AlbumComment>, FetchError> {
        (**self).fetch_comments().await
    }

    async fn post_comment(&self, input: &CommentInput) -> Result<Option<CommentPostData>, FetchError> {
        (**self).post_comment(input).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentsSnapshot {
    pub comments: Vec<AlbumComment>,
    pub is_loading: bool,
    pub is_submitting: bool,
    pub error_message: Option<String>,
}

#[derive(Default)]
struct CommentsState {
    view: CommentsSnapshot,
    latest_load: u64,
}

pub struct CommentsController<S: CommentService> {
    service: S,
    state: Mutex<CommentsState>,
    snapshots: watch::Sender<CommentsSnapshot>,
}

impl<S: CommentService> CommentsController<S> {
    pub fn new(service: S) -> Self {
        let (snapshots, _) = watch::channel(CommentsSnapshot::default());
        Self {
            service,
            state: Mutex::new(CommentsState::default()),
            snapshots,
        }
    }

    pub async fn snapshot(&self) -> CommentsSnapshot {
        self.state.lock().await.view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CommentsSnapshot> {
        self.snapshots.subscribe()
    }

    /// Fetches the thread. Only the most recent load may apply its result.
    pub async fn load(&self) {
        let request_id = {
            let mut state = self.state.lock().await;
            state.latest_load += 1;
            state.view.is_loading = true;
            state.view.error_message = None;
            self.publish(&state);
            state.latest_load
        };

        let result = self.service.fetch_comments().await;

        let mut state = self.state.lock().await;
        if state.latest_load != request_id {
            debug!(
                request_id,
                latest = state.latest_load,
                "comments: dropping superseded load"
            );
            return;
        }
        state.view.is_loading = false;
        match result {
            Ok(comments) => state.view.comments = comments,
            Err(err) => {
                warn!(error = %err, "comments: load failed");
                state.view.error_message = Some(err.to_string());
            }
        }
        self.publish(&state);
    }

    /// Posts `input` and reloads the thread once the server accepts it.
    ///
    /// Returns `false` without sending anything while another submission is
    /// still running.
    pub async fn submit(&self, mut input: CommentInput) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.view.is_submitting {
                return false;
            }
            state.view.is_submitting = true;
            state.view.error_message = None;
            self.publish(&state);
        }

        if input
            .author_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            input.author_url = None;
        }

        match self.service.post_comment(&input).await {
            Ok(posted) => {
                info!(
                    status = posted.as_ref().map_or("unknown", |data| data.status.as_str()),
                    "comments: comment accepted"
                );
                self.load().await;
            }
            Err(err) => {
                warn!(error = %err, "comments: submit failed");
                let mut state = self.state.lock().await;
                state.view.error_message = Some(err.to_string());
            }
        }

        let mut state = self.state.lock().await;
        state.view.is_submitting = false;
        self.publish(&state);
        true
    }

    fn publish(&self, state: &CommentsState) {
        self.snapshots.send_replace(state.view.clone());
    }
}

#[cfg(test)]
#[path = "tests/comments_tests.rs"]
mod tests;
