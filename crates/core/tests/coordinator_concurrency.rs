//! Coordinator concurrency tests.
//!
//! Pin the leader/follower semantics: N concurrent duplicates run exactly
//! one acquisition, a failed leader unblocks (not dooms) its followers, and
//! persisted ready results short-circuit acquisition entirely.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;

use mediadrop_core::coordinator::DownloadCoordinator;
use mediadrop_core::store::{
    ContentType, MediaResult, MediaStatus, NewMediaRequest, RequestStore, SqliteRequestStore,
};

#[derive(Debug)]
struct AcquireFailed;

impl fmt::Display for AcquireFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scripted acquisition failure")
    }
}

fn make_store() -> Arc<SqliteRequestStore> {
    Arc::new(SqliteRequestStore::in_memory().unwrap())
}

fn submit(store: &SqliteRequestStore, url: &str) -> String {
    store
        .create(NewMediaRequest {
            group_id: "group-1".to_string(),
            source_url: url.to_string(),
            content_type: ContentType::Video,
            caption: None,
        })
        .unwrap()
        .id
}

fn ready_result(title: &str) -> MediaResult {
    MediaResult {
        title: Some(title.to_string()),
        file_size_bytes: Some(4096),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_n_concurrent_duplicates_acquire_exactly_once() {
    let store = make_store();
    let coordinator = Arc::new(DownloadCoordinator::new(store.clone()));
    let acquisitions = Arc::new(AtomicU32::new(0));

    // Same video, submitted 8 times with assorted tracking params.
    let urls = [
        "https://v.example/watch?v=abc",
        "https://v.example/watch?v=abc&si=1",
        "https://v.example/watch?v=abc&utm_source=share",
        "https://v.example/watch?v=abc&fbclid=xyz",
        "https://v.example/watch?v=abc&si=2&utm_medium=social",
        "https://v.example/watch?v=abc",
        "https://v.example/watch?v=abc&igshid=0",
        "https://v.example/watch?v=abc&t=99",
    ];

    let ids: Vec<String> = urls.iter().map(|url| submit(&store, url)).collect();

    let tasks: Vec<_> = ids
        .iter()
        .zip(urls.iter())
        .map(|(id, url)| {
            let coordinator = Arc::clone(&coordinator);
            let store = store.clone();
            let acquisitions = Arc::clone(&acquisitions);
            let id = id.clone();
            let url = url.to_string();
            tokio::spawn(async move {
                let acquire_id = id.clone();
                coordinator
                    .coordinate(&id, &url, move || async move {
                        acquisitions.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_millis(100)).await;
                        store
                            .update_result(
                                &acquire_id,
                                &ready_result("the one download"),
                                MediaStatus::Ready,
                            )
                            .unwrap();
                        Ok::<(), AcquireFailed>(())
                    })
                    .await;
            })
        })
        .collect();

    join_all(tasks).await;

    assert_eq!(
        acquisitions.load(Ordering::SeqCst),
        1,
        "exactly one acquisition must run"
    );
    for id in &ids {
        let request = store.get(id).unwrap().unwrap();
        assert_eq!(request.status, MediaStatus::Ready, "request {id}");
        assert_eq!(request.result.title.as_deref(), Some("the one download"));
    }
    assert_eq!(coordinator.in_flight(), 0);
}

#[tokio::test]
async fn test_failed_leader_gives_followers_their_own_attempts() {
    let store = make_store();
    let coordinator = Arc::new(DownloadCoordinator::new(store.clone()));
    let acquisitions = Arc::new(AtomicU32::new(0));

    let url = "https://v.example/watch?v=doomed";
    let leader_id = submit(&store, url);
    let follower_ids: Vec<String> = (0..3).map(|_| submit(&store, url)).collect();

    // Leader claims the key, then fails after a delay.
    let leader = {
        let coordinator = Arc::clone(&coordinator);
        let acquisitions = Arc::clone(&acquisitions);
        let id = leader_id.clone();
        tokio::spawn(async move {
            coordinator
                .coordinate(&id, url, move || async move {
                    acquisitions.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(80)).await;
                    Err::<(), _>(AcquireFailed)
                })
                .await;
        })
    };

    sleep(Duration::from_millis(20)).await;

    // Followers join while the leader is in flight; every one of them fails
    // its own attempt too.
    let followers: Vec<_> = follower_ids
        .iter()
        .map(|id| {
            let coordinator = Arc::clone(&coordinator);
            let acquisitions = Arc::clone(&acquisitions);
            let id = id.clone();
            tokio::spawn(async move {
                coordinator
                    .coordinate(&id, url, move || async move {
                        acquisitions.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(AcquireFailed)
                    })
                    .await;
            })
        })
        .collect();

    leader.await.unwrap();
    join_all(followers).await;

    // A failing leader does not doom followers: each became a leader in
    // turn and ran its own (failing) acquisition.
    assert_eq!(acquisitions.load(Ordering::SeqCst), 4);
    for id in std::iter::once(&leader_id).chain(follower_ids.iter()) {
        assert_eq!(
            store.get(id).unwrap().unwrap().status,
            MediaStatus::Failed,
            "request {id}"
        );
    }

    // No circuit breaker: a later caller gets a fresh leadership attempt.
    let late_id = submit(&store, url);
    let acquisitions_before = acquisitions.load(Ordering::SeqCst);
    let late_acquisitions = Arc::clone(&acquisitions);
    coordinator
        .coordinate(&late_id, url, move || async move {
            late_acquisitions.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AcquireFailed)
        })
        .await;
    assert_eq!(acquisitions.load(Ordering::SeqCst), acquisitions_before + 1);
    assert_eq!(coordinator.in_flight(), 0);
}

#[tokio::test]
async fn test_new_leader_after_failure_can_succeed() {
    let store = make_store();
    let coordinator = DownloadCoordinator::new(store.clone());
    let url = "https://v.example/watch?v=flaky";

    let first_id = submit(&store, url);
    coordinator
        .coordinate(&first_id, url, move || async move {
            Err::<(), _>(AcquireFailed)
        })
        .await;
    assert_eq!(
        store.get(&first_id).unwrap().unwrap().status,
        MediaStatus::Failed
    );

    let second_id = submit(&store, url);
    let second_store = store.clone();
    let acquire_id = second_id.clone();
    coordinator
        .coordinate(&second_id, url, move || async move {
            second_store
                .update_result(&acquire_id, &ready_result("recovered"), MediaStatus::Ready)
                .unwrap();
            Ok::<(), AcquireFailed>(())
        })
        .await;
    assert_eq!(
        store.get(&second_id).unwrap().unwrap().status,
        MediaStatus::Ready
    );

    // The earlier failed request stays failed; it is a distinct record.
    assert_eq!(
        store.get(&first_id).unwrap().unwrap().status,
        MediaStatus::Failed
    );
}

#[tokio::test]
async fn test_persisted_ready_result_short_circuits_acquisition() {
    let store = make_store();
    let coordinator = DownloadCoordinator::new(store.clone());

    let first_id = submit(&store, "https://v.example/watch?v=abc");
    store
        .update_result(&first_id, &ready_result("cached"), MediaStatus::Ready)
        .unwrap();

    // Same video, tracking params differ: maps to the same canonical key.
    let second_id = submit(&store, "https://v.example/watch?v=abc&si=qr&utm_source=x");
    let acquisitions = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&acquisitions);
    coordinator
        .coordinate(
            &second_id,
            "https://v.example/watch?v=abc&si=qr&utm_source=x",
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), AcquireFailed>(())
            },
        )
        .await;

    assert_eq!(acquisitions.load(Ordering::SeqCst), 0, "must reuse, not acquire");
    let second = store.get(&second_id).unwrap().unwrap();
    assert_eq!(second.status, MediaStatus::Ready);
    assert_eq!(second.result.title.as_deref(), Some("cached"));
}
