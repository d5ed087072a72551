use solofile::server::reaper::{Reaper, ReaperStats, WorkerOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, oneshot};

async fn wait_for_reclaim(stats: &ReaperStats, expected: u64) {
    for _ in 0..200 {
        if stats.reclaimed() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "only {} of {} workers reclaimed",
        stats.reclaimed(),
        expected
    );
}

async fn explode() -> WorkerOutcome {
    panic!("worker blew up")
}

#[tokio::test]
async fn test_completed_workers_are_reclaimed() {
    let tracker = Reaper::start();
    let slots = Arc::new(Semaphore::new(8));
    let stats = tracker.stats();

    for _ in 0..5 {
        let slot = Arc::clone(&slots).acquire_owned().await.unwrap();
        tracker.spawn(slot, async { WorkerOutcome::Completed });
    }

    wait_for_reclaim(&stats, 5).await;
    assert_eq!(stats.spawned(), 5);
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.aborted(), 0);
    assert_eq!(slots.available_permits(), 8);
}

#[tokio::test]
async fn test_stats_summary_for_shutdown_log() {
    let tracker = Reaper::start();
    let slots = Arc::new(Semaphore::new(4));
    let stats = tracker.stats();

    tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), async {
        WorkerOutcome::Completed
    });
    tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), async {
        WorkerOutcome::Aborted
    });

    wait_for_reclaim(&stats, 2).await;
    assert_eq!(
        stats.to_string(),
        "spawned=2 reclaimed=2 aborted=1 panicked=0 live=0"
    );
}

#[tokio::test]
async fn test_worker_ids_are_unique() {
    let tracker = Reaper::start();
    let slots = Arc::new(Semaphore::new(4));

    let a = tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), async {
        WorkerOutcome::Completed
    });
    let b = tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), async {
        WorkerOutcome::Completed
    });

    assert_ne!(a, b);
}

#[tokio::test]
async fn test_aborted_workers_are_counted() {
    let tracker = Reaper::start();
    let slots = Arc::new(Semaphore::new(2));
    let stats = tracker.stats();

    tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), async {
        WorkerOutcome::Aborted
    });
    tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), async {
        WorkerOutcome::Completed
    });

    wait_for_reclaim(&stats, 2).await;
    assert_eq!(stats.aborted(), 1);
    assert_eq!(stats.live(), 0);
}

#[tokio::test]
async fn test_panicking_worker_is_isolated_and_reclaimed() {
    let tracker = Reaper::start();
    let slots = Arc::new(Semaphore::new(2));
    let stats = tracker.stats();

    let (done_tx, done_rx) = oneshot::channel();

    tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), explode());
    tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = done_tx.send(());
        WorkerOutcome::Completed
    });

    // The sibling still finishes its work.
    done_rx.await.unwrap();

    wait_for_reclaim(&stats, 2).await;
    assert_eq!(stats.panicked(), 1);
    assert_eq!(stats.live(), 0);
    assert_eq!(slots.available_permits(), 2);
}

#[tokio::test]
async fn test_slot_held_until_worker_finishes() {
    let tracker = Reaper::start();
    let slots = Arc::new(Semaphore::new(1));
    let stats = tracker.stats();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    tracker.spawn(Arc::clone(&slots).acquire_owned().await.unwrap(), async move {
        let _ = release_rx.await;
        WorkerOutcome::Completed
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(slots.available_permits(), 0);
    assert_eq!(stats.live(), 1);

    release_tx.send(()).unwrap();
    wait_for_reclaim(&stats, 1).await;
    assert_eq!(slots.available_permits(), 1);
}

#[tokio::test]
async fn test_many_short_workers_keep_pace() {
    let tracker = Reaper::start();
    let slots = Arc::new(Semaphore::new(16));
    let stats = tracker.stats();

    for i in 0..500u64 {
        let slot = Arc::clone(&slots).acquire_owned().await.unwrap();
        tracker.spawn(slot, async move {
            if i % 7 == 0 {
                tokio::task::yield_now().await;
            }
            WorkerOutcome::Completed
        });
    }

    wait_for_reclaim(&stats, 500).await;
    assert_eq!(stats.live(), 0);
    assert_eq!(slots.available_permits(), 16);
}
