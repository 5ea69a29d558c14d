use serde::{Deserialize, Serialize};

use crate::domain::{AlbumId, CategoryId, CommentId, MediaId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaCategory {
    pub id: CategoryId,
    pub name: String,
}

/// Category entry offered as a feed filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaCategoryItem {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub ok: bool,
    pub categories: Vec<MediaCategoryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_thumb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_large: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_original: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<MediaCategory>>,
}

impl MediaItem {
    /// Minimal item with only an id and url; everything else unknown.
    pub fn new(id: impl Into<MediaId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            url_thumb: None,
            url_medium: None,
            url_large: None,
            width: None,
            height: None,
            likes: None,
            liked: None,
            datetime_original: None,
            created_at: None,
            filename: None,
            size: None,
            mime_type: None,
            camera_make: None,
            camera_model: None,
            lens_model: None,
            aperture: None,
            shutter_speed: None,
            iso: None,
            focal_length: None,
            location_name: None,
            gps_lat: None,
            gps_lon: None,
            tags: None,
            categories: None,
        }
    }

    /// Capture time when the camera recorded one, upload time otherwise.
    pub fn sort_timestamp(&self) -> Option<&str> {
        self.datetime_original
            .as_deref()
            .or(self.created_at.as_deref())
    }

    pub fn like_count(&self) -> u32 {
        self.likes.unwrap_or(0)
    }

    /// Width and height, only when both are known and positive.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaListResponse {
    pub ok: bool,
    pub results: Vec<MediaItem>,
    pub total: u32,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumCoverMedia {
    pub id: MediaId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_thumb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_medium: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumListItem {
    pub id: AlbumId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_media: Option<AlbumCoverMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_protected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<MediaCategoryItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_ids: Option<Vec<CategoryId>>,
}

impl AlbumListItem {
    pub fn new(id: impl Into<AlbumId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            cover_media: None,
            media_count: None,
            likes: None,
            slug: None,
            is_protected: None,
            categories: None,
            category_ids: None,
        }
    }

    pub fn is_protected(&self) -> bool {
        self.is_protected.unwrap_or(false)
    }
}

/// `total` and `totalPages` are optional; older servers omit them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumListResponse {
    pub ok: bool,
    pub albums: Vec<AlbumListItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumDetail {
    pub id: AlbumId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_media: Option<AlbumCoverMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_protected: Option<bool>,
}

/// `GET /api/media/{id}`: the same fields as a list entry, filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDetailResponse {
    pub ok: bool,
    pub data: MediaItem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumDetailResponse {
    pub ok: bool,
    pub data: AlbumDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumMediaResponse {
    pub ok: bool,
    pub media: Vec<MediaItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumUnlockResponse {
    pub ok: bool,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeActionRequest {
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResponse {
    #[serde(default)]
    pub ok: bool,
    pub likes: u32,
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumComment {
    pub id: CommentId,
    pub album_id: AlbumId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumCommentsResponse {
    pub ok: bool,
    pub comments: Vec<AlbumComment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentInput {
    pub author_name: String,
    pub author_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPostData {
    pub id: CommentId,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPostResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CommentPostData>,
}
