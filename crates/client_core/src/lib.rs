use std::sync::Arc;

use anyhow::Result;
use shared::domain::{AlbumId, MediaId};
use tracing::info;

pub mod comments;
pub mod config;
pub mod detail;
pub mod error;
pub mod feed;
pub mod http;
pub mod likes;
pub mod masonry;
pub mod sections;
pub mod unlock;

pub use comments::{CommentService, CommentsController, CommentsSnapshot};
pub use config::{load_settings, Settings};
pub use detail::{DetailController, DetailSnapshot, DetailSource};
pub use error::FetchError;
pub use feed::{FeedController, FeedItem, FeedSnapshot, FilterKey, Page, PageFetcher};
pub use http::{
    AlbumListFetcher, AlbumMediaFetcher, ApiClient, HttpAlbumUnlocker, HttpCommentService,
    HttpLikeService, HttpMediaDetailService, LikeTarget, MediaFeedFetcher,
};
pub use likes::{LikeController, LikeService, LikeSnapshot, LikeStatus};
pub use masonry::{pack, MasonryColumn, MasonryGrid, MasonryItem};
pub use sections::{DayKey, DaySection, DaySectionBuilder, FeedLayout};
pub use unlock::{AlbumUnlocker, CredentialStore, MemoryCredentialStore, UnlockFlow};

pub type MediaFeed = FeedController<MediaFeedFetcher>;
pub type AlbumList = FeedController<AlbumListFetcher>;
pub type AlbumFeed = FeedController<AlbumMediaFetcher>;
pub type AlbumUnlock = UnlockFlow<AlbumMediaFetcher, HttpAlbumUnlocker>;
pub type MediaDetailView = DetailController<HttpMediaDetailService>;
pub type AlbumDetailView = DetailController<AlbumMediaFetcher>;

/// Entry point wiring controllers to the HTTP API and one credential store.
#[derive(Clone)]
pub struct GalleryClient {
    api: Arc<ApiClient>,
    credentials: Arc<dyn CredentialStore>,
    page_size: u32,
    album_page_size: u32,
}

impl GalleryClient {
    pub fn new(api: ApiClient, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            api: Arc::new(api),
            credentials,
            page_size: feed::DEFAULT_PAGE_SIZE,
            album_page_size: feed::DEFAULT_ALBUM_MEDIA_PAGE_SIZE,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api = ApiClient::from_settings(settings)?;
        info!(base_url = %api.base_url(), "gallery: client configured");
        let mut client = Self::new(api, Arc::new(MemoryCredentialStore::new()));
        client.page_size = settings.page_size;
        client.album_page_size = settings.album_page_size;
        Ok(client)
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn media_feed(&self, filter: FilterKey) -> MediaFeed {
        FeedController::with_filter(
            MediaFeedFetcher::new(Arc::clone(&self.api)),
            self.page_size,
            filter,
        )
    }

    pub fn album_list(&self, filter: FilterKey) -> AlbumList {
        FeedController::with_filter(
            AlbumListFetcher::new(Arc::clone(&self.api)),
            self.page_size,
            filter,
        )
    }

    pub fn album_feed(&self, album_id: AlbumId) -> AlbumFeed {
        FeedController::new(
            AlbumMediaFetcher::new(
                Arc::clone(&self.api),
                album_id,
                Arc::clone(&self.credentials),
            ),
            self.album_page_size,
        )
    }

    /// Unlock flow for `feed`'s album, sharing this client's credential store.
    pub fn album_unlock(&self, feed: Arc<AlbumFeed>) -> AlbumUnlock {
        let album_id = feed.fetcher().album_id().clone();
        UnlockFlow::new(
            album_id,
            feed,
            HttpAlbumUnlocker::new(Arc::clone(&self.api)),
            Arc::clone(&self.credentials),
        )
    }

    pub fn media_detail(&self, media_id: MediaId) -> MediaDetailView {
        DetailController::new(HttpMediaDetailService::new(Arc::clone(&self.api), media_id))
    }

    /// Album header; a 403 here is the first sign the album needs unlocking.
    pub fn album_detail(&self, album_id: AlbumId) -> AlbumDetailView {
        DetailController::new(AlbumMediaFetcher::new(
            Arc::clone(&self.api),
            album_id,
            Arc::clone(&self.credentials),
        ))
    }

    pub fn likes(&self, target: LikeTarget) -> LikeController<HttpLikeService> {
        LikeController::new(HttpLikeService::new(Arc::clone(&self.api), target))
    }

    pub fn comments(&self, album_id: AlbumId) -> CommentsController<HttpCommentService> {
        CommentsController::new(HttpCommentService::new(Arc::clone(&self.api), album_id))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
