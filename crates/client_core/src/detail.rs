//! Single-record lookups: a media item's full metadata or an album header.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::FetchError;

#[async_trait]
pub trait DetailSource: Send + Sync + 'static {
    type Detail: Clone + Send + Sync + 'static;

    async fn fetch_detail(&self) -> Result<Self::Detail, FetchError>;

    /// A 404 leaves the caller with whatever preview it already has.
    fn missing_is_empty(&self) -> bool {
        false
    }
}

#[async_trait]
impl<S: DetailSource> DetailSource for Arc<S> {
    type Detail = S::Detail;

    async fn fetch_detail(&self) -> Result<S::Detail, FetchError> {
        (**self).fetch_detail().await
    }

    fn missing_is_empty(&self) -> bool {
        (**self).missing_is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailSnapshot<D> {
    pub detail: Option<D>,
    pub is_loading: bool,
    pub requires_unlock: bool,
    pub error_message: Option<String>,
}

impl<D> Default for DetailSnapshot<D> {
    fn default() -> Self {
        Self {
            detail: None,
            is_loading: false,
            requires_unlock: false,
            error_message: None,
        }
    }
}

struct DetailState<D> {
    view: DetailSnapshot<D>,
    latest_load: u64,
}

pub struct DetailController<S: DetailSource> {
    source: S,
    state: Mutex<DetailState<S::Detail>>,
    snapshots: watch::Sender<DetailSnapshot<S::Detail>>,
}

impl<S: DetailSource> DetailController<S> {
    pub fn new(source: S) -> Self {
        let (snapshots, _) = watch::channel(DetailSnapshot::default());
        Self {
            source,
            state: Mutex::new(DetailState {
                view: DetailSnapshot::default(),
                latest_load: 0,
            }),
            snapshots,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn snapshot(&self) -> DetailSnapshot<S::Detail> {
        self.state.lock().await.view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailSnapshot<S::Detail>> {
        self.snapshots.subscribe()
    }

    /// Fetches the record. A 403 raises `requires_unlock`; a 404 on a source
    /// that tolerates it clears the detail without reporting an error.
    pub async fn load(&self) {
        let request_id = {
            let mut state = self.state.lock().await;
            state.latest_load += 1;
            state.view.is_loading = true;
            state.view.error_message = None;
            self.publish(&state);
            state.latest_load
        };

        let result = self.source.fetch_detail().await;

        let mut state = self.state.lock().await;
        if state.latest_load != request_id {
            debug!(
                request_id,
                latest = state.latest_load,
                "detail: dropping superseded load"
            );
            return;
        }
        state.view.is_loading = false;
        match result {
            Ok(detail) => {
                state.view.detail = Some(detail);
                state.view.requires_unlock = false;
            }
            Err(err) if err.is_forbidden() => {
                info!(code = ?err.code(), "detail: record requires unlock");
                state.view.requires_unlock = true;
            }
            Err(err) if err.is_not_found() && self.source.missing_is_empty() => {
                debug!("detail: no record, keeping preview");
                state.view.detail = None;
            }
            Err(err) => {
                warn!(status = ?err.status(), code = ?err.code(), error = %err, "detail: load failed");
                state.view.error_message = Some(err.to_string());
            }
        }
        self.publish(&state);
    }

    fn publish(&self, state: &DetailState<S::Detail>) {
        self.snapshots.send_replace(state.view.clone());
    }
}

#[cfg(test)]
#[path = "tests/detail_tests.rs"]
mod tests;
