use super::*;

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex as StdMutex,
    },
    time::Duration,
};

use shared::protocol::MediaItem;
use tokio::sync::Semaphore;

use crate::feed::{FilterKey, Page, DEFAULT_ALBUM_MEDIA_PAGE_SIZE};

/// Album media fetcher that answers 403 until a token is stored.
struct GatedAlbum {
    album_id: AlbumId,
    credentials: Arc<MemoryCredentialStore>,
    tokens_seen: StdMutex<Vec<Option<String>>>,
}

#[async_trait]
impl PageFetcher for GatedAlbum {
    type Item = MediaItem;

    async fn fetch_page(
        &self,
        page: u32,
        _page_size: u32,
        _filter: &FilterKey,
    ) -> Result<Page<MediaItem>, FetchError> {
        let token = self.credentials.credential_for(&self.album_id);
        self.tokens_seen.lock().expect("tokens").push(token.clone());
        match token {
            Some(_) => Ok(Page::new(
                vec![MediaItem::new("m1", "/m1.jpg"), MediaItem::new("m2", "/m2.jpg")],
                page,
                1,
            )),
            None => Err(FetchError::forbidden("Album is password protected")),
        }
    }
}

struct FakeUnlocker {
    password: &'static str,
    calls: AtomicU32,
    gate: Semaphore,
}

impl FakeUnlocker {
    fn new(open: bool) -> Self {
        Self {
            password: "open sesame",
            calls: AtomicU32::new(0),
            gate: Semaphore::new(if open { Semaphore::MAX_PERMITS } else { 0 }),
        }
    }
}

#[async_trait]
impl AlbumUnlocker for FakeUnlocker {
    async fn unlock(&self, album_id: &AlbumId, password: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| FetchError::Transport("gate closed".into()))?;
        if password == self.password {
            Ok(format!("tok-{album_id}"))
        } else {
            Err(FetchError::api(401, "Invalid password"))
        }
    }
}

struct Harness {
    flow: Arc<UnlockFlow<Arc<GatedAlbum>, Arc<FakeUnlocker>>>,
    album: Arc<GatedAlbum>,
    unlocker: Arc<FakeUnlocker>,
    credentials: Arc<MemoryCredentialStore>,
}

async fn locked_album(unlocker_open: bool) -> Harness {
    let album_id = AlbumId::new("a1");
    let credentials = Arc::new(MemoryCredentialStore::new());
    let album = Arc::new(GatedAlbum {
        album_id: album_id.clone(),
        credentials: Arc::clone(&credentials),
        tokens_seen: StdMutex::new(Vec::new()),
    });
    let feed = Arc::new(FeedController::new(
        Arc::clone(&album),
        DEFAULT_ALBUM_MEDIA_PAGE_SIZE,
    ));
    feed.load_initial().await;
    assert!(feed.snapshot().await.requires_unlock);

    let unlocker = Arc::new(FakeUnlocker::new(unlocker_open));
    let store: Arc<dyn CredentialStore> = credentials.clone();
    let flow = Arc::new(UnlockFlow::new(
        album_id,
        feed,
        Arc::clone(&unlocker),
        store,
    ));
    Harness {
        flow,
        album,
        unlocker,
        credentials,
    }
}

#[tokio::test]
async fn unlock_stores_token_and_retries_first_page() {
    let harness = locked_album(true).await;

    assert!(harness.flow.submit("open sesame").await);

    assert_eq!(
        harness.credentials.credential_for(&AlbumId::new("a1")).as_deref(),
        Some("tok-a1")
    );
    assert_eq!(
        *harness.album.tokens_seen.lock().expect("tokens"),
        [None, Some("tok-a1".to_string())]
    );

    let feed = harness.flow.feed().snapshot().await;
    assert!(!feed.requires_unlock);
    assert_eq!(feed.items.len(), 2);
    assert_eq!(feed.current_page, 1);

    let unlock = harness.flow.snapshot().await;
    assert!(!unlock.is_unlocking);
    assert_eq!(unlock.error_message, None);
}

#[tokio::test]
async fn wrong_password_keeps_feed_locked() {
    let harness = locked_album(true).await;

    assert!(harness.flow.submit("guess").await);

    let unlock = harness.flow.snapshot().await;
    assert_eq!(unlock.error_message.as_deref(), Some("Invalid password"));
    let feed = harness.flow.feed().snapshot().await;
    assert!(feed.requires_unlock);
    assert_eq!(feed.error_message, None);
    assert_eq!(harness.album.tokens_seen.lock().expect("tokens").len(), 1);
}

#[tokio::test]
async fn blank_password_is_not_sent() {
    let harness = locked_album(true).await;

    assert!(harness.flow.submit("   ").await);

    assert_eq!(harness.unlocker.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        harness.flow.snapshot().await.error_message.as_deref(),
        Some(PASSWORD_REQUIRED)
    );
}

#[tokio::test]
async fn concurrent_submit_is_refused() {
    let harness = locked_album(false).await;
    let mut updates = harness.flow.subscribe();

    let first = tokio::spawn({
        let flow = Arc::clone(&harness.flow);
        async move { flow.submit("open sesame").await }
    });
    tokio::time::timeout(
        Duration::from_secs(2),
        updates.wait_for(|snapshot| snapshot.is_unlocking),
    )
    .await
    .expect("unlock started in time")
    .expect("flow alive");

    assert!(!harness.flow.submit("open sesame").await);

    harness.unlocker.gate.add_permits(1);
    assert!(first.await.expect("first submit"));
    assert_eq!(harness.unlocker.calls.load(Ordering::SeqCst), 1);
    assert!(!harness.flow.feed().snapshot().await.requires_unlock);
}

#[test]
fn memory_store_keeps_tokens_per_album() {
    let store = MemoryCredentialStore::new();
    let a1 = AlbumId::new("a1");
    let a2 = AlbumId::new("a2");

    store.store("t1".into(), &a1);
    assert_eq!(store.credential_for(&a1).as_deref(), Some("t1"));
    assert_eq!(store.credential_for(&a2), None);

    store.store("t1b".into(), &a1);
    assert_eq!(store.credential_for(&a1).as_deref(), Some("t1b"));
}
