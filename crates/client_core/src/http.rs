//! reqwest-backed implementations of the collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{AlbumId, MediaId},
    error::ApiErrorBody,
    protocol::{
        AlbumComment, AlbumCommentsResponse, AlbumDetail, AlbumDetailResponse, AlbumListItem,
        AlbumListResponse, AlbumMediaResponse, AlbumUnlockResponse, CategoriesResponse,
        CommentInput, CommentPostData, CommentPostResponse, LikeActionRequest, LikeResponse,
        MediaCategoryItem, MediaDetailResponse, MediaItem, MediaListResponse, UnlockRequest,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    comments::CommentService,
    config::Settings,
    detail::DetailSource,
    error::FetchError,
    feed::{FilterKey, Page, PageFetcher},
    likes::{LikeService, LikeStatus},
    unlock::{AlbumUnlocker, CredentialStore},
};

/// JSON client for the gallery API rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self::with_client(http, settings.base_url()?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        Ok(self.base_url.join(path)?)
    }

    /// Resolves a media URL as returned by the API, which may be relative.
    pub fn resolve_media_url(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        self.base_url.join(raw).ok()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        bearer: Option<&str>,
    ) -> Result<T, FetchError> {
        let mut request = self.http.get(self.endpoint(path)?);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.endpoint(path)?).json(body);
        self.send(request).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let request = self.http.delete(self.endpoint(path)?);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }

        let error: ApiErrorBody = serde_json::from_slice(&body).unwrap_or_default();
        debug!(status = status.as_u16(), code = ?error.code, "http: request failed");
        Err(FetchError::Api {
            status: status.as_u16(),
            message: error.message(),
            code: error.code,
        })
    }
}

fn paging_query(page: u32, page_size: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("pageSize", page_size.to_string())]
}

/// The main media feed: `/api/media/list`.
#[derive(Debug, Clone)]
pub struct MediaFeedFetcher {
    client: Arc<ApiClient>,
}

impl MediaFeedFetcher {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for MediaFeedFetcher {
    type Item = MediaItem;

    async fn fetch_page(
        &self,
        page: u32,
        page_size: u32,
        filter: &FilterKey,
    ) -> Result<Page<MediaItem>, FetchError> {
        let mut query = paging_query(page, page_size);
        query.push(("sort", filter.sort.as_str().to_string()));
        if let Some(category) = filter.category_slug() {
            query.push(("category", category.to_string()));
        }

        let response: MediaListResponse = self.client.get("/api/media/list", &query, None).await?;
        Ok(
            Page::new(response.results, response.page, response.total_pages)
                .with_total_count(response.total as usize),
        )
    }

    async fn fetch_categories(&self) -> Result<Vec<MediaCategoryItem>, FetchError> {
        let response: CategoriesResponse =
            self.client.get("/api/media/categories", &[], None).await?;
        Ok(response.categories)
    }
}

/// Album index: `/api/albums`. Sort order is not supported server-side.
#[derive(Debug, Clone)]
pub struct AlbumListFetcher {
    client: Arc<ApiClient>,
}

impl AlbumListFetcher {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for AlbumListFetcher {
    type Item = AlbumListItem;

    async fn fetch_page(
        &self,
        page: u32,
        page_size: u32,
        filter: &FilterKey,
    ) -> Result<Page<AlbumListItem>, FetchError> {
        let mut query = paging_query(page, page_size);
        if let Some(category) = filter.category_slug() {
            query.push(("category", category.to_string()));
        }

        let response: AlbumListResponse = self.client.get("/api/albums", &query, None).await?;
        // No totalPages means the server does not page; treat this one as the last.
        let page = Page::new(
            response.albums,
            page,
            response.total_pages.unwrap_or(page),
        );
        Ok(match response.total {
            Some(total) => page.with_total_count(total as usize),
            None => page,
        })
    }

    async fn fetch_categories(&self) -> Result<Vec<MediaCategoryItem>, FetchError> {
        let response: CategoriesResponse =
            self.client.get("/api/albums/categories", &[], None).await?;
        Ok(response.categories)
    }
}

/// Media of one album, authorised with the album token when one is stored.
pub struct AlbumMediaFetcher {
    client: Arc<ApiClient>,
    album_id: AlbumId,
    credentials: Arc<dyn CredentialStore>,
}

impl AlbumMediaFetcher {
    pub fn new(
        client: Arc<ApiClient>,
        album_id: AlbumId,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            album_id,
            credentials,
        }
    }

    pub fn album_id(&self) -> &AlbumId {
        &self.album_id
    }
}

/// Album header, authorised the same way as its media.
#[async_trait]
impl DetailSource for AlbumMediaFetcher {
    type Detail = AlbumDetail;

    async fn fetch_detail(&self) -> Result<AlbumDetail, FetchError> {
        let token = self.credentials.credential_for(&self.album_id);
        let response: AlbumDetailResponse = self
            .client
            .get(&format!("/api/albums/{}", self.album_id), &[], token.as_deref())
            .await?;
        Ok(response.data)
    }
}

#[async_trait]
impl PageFetcher for AlbumMediaFetcher {
    type Item = MediaItem;

    async fn fetch_page(
        &self,
        page: u32,
        page_size: u32,
        _filter: &FilterKey,
    ) -> Result<Page<MediaItem>, FetchError> {
        let token = self.credentials.credential_for(&self.album_id);
        let response: AlbumMediaResponse = self
            .client
            .get(
                &format!("/api/albums/{}/media", self.album_id),
                &paging_query(page, page_size),
                token.as_deref(),
            )
            .await?;

        Ok(match response.total {
            Some(total) => Page::from_total(response.media, page, total as usize, page_size),
            None => Page::new(response.media, page, page),
        })
    }
}

/// Full metadata of one media item: `/api/media/{id}`.
#[derive(Debug, Clone)]
pub struct HttpMediaDetailService {
    client: Arc<ApiClient>,
    media_id: MediaId,
}

impl HttpMediaDetailService {
    pub fn new(client: Arc<ApiClient>, media_id: MediaId) -> Self {
        Self { client, media_id }
    }

    pub fn media_id(&self) -> &MediaId {
        &self.media_id
    }
}

#[async_trait]
impl DetailSource for HttpMediaDetailService {
    type Detail = MediaItem;

    async fn fetch_detail(&self) -> Result<MediaItem, FetchError> {
        let response: MediaDetailResponse = self
            .client
            .get(&format!("/api/media/{}", self.media_id), &[], None)
            .await?;
        Ok(response.data)
    }

    /// Older servers have no detail endpoint; the list entry is enough.
    fn missing_is_empty(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeTarget {
    Media(MediaId),
    Album(AlbumId),
}

impl LikeTarget {
    fn path(&self) -> String {
        match self {
            Self::Media(id) => format!("/api/media/{id}/like"),
            Self::Album(id) => format!("/api/albums/{id}/like"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpLikeService {
    client: Arc<ApiClient>,
    target: LikeTarget,
}

impl HttpLikeService {
    pub fn new(client: Arc<ApiClient>, target: LikeTarget) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl LikeService for HttpLikeService {
    async fn fetch_status(&self) -> Result<LikeStatus, FetchError> {
        let response: LikeResponse = self.client.get(&self.target.path(), &[], None).await?;
        Ok(response.into())
    }

    async fn set_liked(&self, liked: bool) -> Result<LikeStatus, FetchError> {
        let path = self.target.path();
        let response: LikeResponse = if liked {
            let body = LikeActionRequest {
                action: "like".into(),
            };
            self.client.post(&path, &body).await?
        } else {
            self.client.delete(&path).await?
        };
        Ok(response.into())
    }
}

#[derive(Debug, Clone)]
pub struct HttpCommentService {
    client: Arc<ApiClient>,
    album_id: AlbumId,
}

impl HttpCommentService {
    pub fn new(client: Arc<ApiClient>, album_id: AlbumId) -> Self {
        Self { client, album_id }
    }

    fn path(&self) -> String {
        format!("/api/albums/{}/comments", self.album_id)
    }
}

#[async_trait]
impl CommentService for HttpCommentService {
    async fn fetch_comments(&self) -> Result<Vec<AlbumComment>, FetchError> {
        let response: AlbumCommentsResponse = self.client.get(&self.path(), &[], None).await?;
        Ok(response.comments)
    }

    async fn post_comment(&self, input: &CommentInput) -> Result<Option<CommentPostData>, FetchError> {
        let response: CommentPostResponse = self.client.post(&self.path(), input).await?;
        Ok(response.data)
    }
}

#[derive(Debug, Clone)]
pub struct HttpAlbumUnlocker {
    client: Arc<ApiClient>,
}

impl HttpAlbumUnlocker {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlbumUnlocker for HttpAlbumUnlocker {
    async fn unlock(&self, album_id: &AlbumId, password: &str) -> Result<String, FetchError> {
        let body = UnlockRequest {
            password: password.to_string(),
        };
        let response: AlbumUnlockResponse = self
            .client
            .post(&format!("/api/albums/{album_id}/unlock"), &body)
            .await?;
        Ok(response.token)
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
