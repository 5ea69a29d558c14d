use super::*;

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

type Reply = oneshot::Sender<Result<String, FetchError>>;

struct QueuedDetail {
    calls: mpsc::UnboundedSender<Reply>,
    tolerate_missing: bool,
}

#[async_trait]
impl DetailSource for QueuedDetail {
    type Detail = String;

    async fn fetch_detail(&self) -> Result<String, FetchError> {
        let (reply, rx) = oneshot::channel();
        self.calls
            .send(reply)
            .map_err(|_| FetchError::Transport("test harness closed".into()))?;
        rx.await
            .unwrap_or_else(|_| Err(FetchError::Transport("reply dropped".into())))
    }

    fn missing_is_empty(&self) -> bool {
        self.tolerate_missing
    }
}

fn controller(
    tolerate_missing: bool,
) -> (
    Arc<DetailController<QueuedDetail>>,
    mpsc::UnboundedReceiver<Reply>,
) {
    let (calls, rx) = mpsc::unbounded_channel();
    let detail = DetailController::new(QueuedDetail {
        calls,
        tolerate_missing,
    });
    (Arc::new(detail), rx)
}

async fn next_call(rx: &mut mpsc::UnboundedReceiver<Reply>) -> Reply {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("call issued in time")
        .expect("call channel open")
}

fn spawn_load(detail: &Arc<DetailController<QueuedDetail>>) -> tokio::task::JoinHandle<()> {
    let detail = Arc::clone(detail);
    tokio::spawn(async move { detail.load().await })
}

#[tokio::test]
async fn load_publishes_the_record() {
    let (detail, mut rx) = controller(false);
    let mut updates = detail.subscribe();

    let task = spawn_load(&detail);
    let reply = next_call(&mut rx).await;
    assert!(detail.snapshot().await.is_loading);
    let _ = reply.send(Ok("full record".into()));
    task.await.expect("load task");

    let latest = updates.borrow_and_update().clone();
    assert_eq!(latest.detail.as_deref(), Some("full record"));
    assert!(!latest.is_loading);
}

#[tokio::test]
async fn missing_record_is_silent_only_when_tolerated() {
    let (tolerant, mut rx) = controller(true);
    let task = spawn_load(&tolerant);
    let _ = next_call(&mut rx)
        .await
        .send(Err(FetchError::api(404, "Not found")));
    task.await.expect("load task");
    let snapshot = tolerant.snapshot().await;
    assert_eq!(snapshot.detail, None);
    assert_eq!(snapshot.error_message, None);

    let (strict, mut rx) = controller(false);
    let task = spawn_load(&strict);
    let _ = next_call(&mut rx)
        .await
        .send(Err(FetchError::api(404, "Not found")));
    task.await.expect("load task");
    assert_eq!(
        strict.snapshot().await.error_message.as_deref(),
        Some("Not found")
    );
}

#[tokio::test]
async fn forbidden_raises_requires_unlock_without_error() {
    let (detail, mut rx) = controller(false);

    let task = spawn_load(&detail);
    let _ = next_call(&mut rx)
        .await
        .send(Err(FetchError::forbidden("Album is password protected")));
    task.await.expect("load task");

    let snapshot = detail.snapshot().await;
    assert!(snapshot.requires_unlock);
    assert_eq!(snapshot.error_message, None);

    let task = spawn_load(&detail);
    let _ = next_call(&mut rx).await.send(Ok("unlocked".into()));
    task.await.expect("load task");
    assert!(!detail.snapshot().await.requires_unlock);
}

#[tokio::test]
async fn overlapping_loads_apply_only_the_latest() {
    let (detail, mut rx) = controller(false);

    let first = spawn_load(&detail);
    let older = next_call(&mut rx).await;
    let second = spawn_load(&detail);
    let newer = next_call(&mut rx).await;

    let _ = older.send(Ok("stale".into()));
    first.await.expect("first load");
    let waiting = detail.snapshot().await;
    assert!(waiting.is_loading);
    assert_eq!(waiting.detail, None);

    let _ = newer.send(Ok("fresh".into()));
    second.await.expect("second load");
    let settled = detail.snapshot().await;
    assert!(!settled.is_loading);
    assert_eq!(settled.detail.as_deref(), Some("fresh"));
}
