mod support;

use std::sync::Arc;
use std::time::Duration;
use steelsight_core::model::Surface;
use steelsight_core::{
    CacheBackend, DriverInput, ImageLoader, PrefetchCacheStore, PrefetchContext, PrefetchDriver,
    PrefetchOrchestrator, RunOutcome, SkipReason,
};
use support::{MockBackend, MockLoader};
use tokio::sync::watch;
use tokio::time::timeout;

fn input(line: &str, view: &str, enabled: bool) -> DriverInput {
    DriverInput {
        line: line.to_string(),
        context: PrefetchContext {
            active_tab: true,
            enabled,
            tile_limit: 10,
            defect_limit: 10,
            view: view.to_string(),
            visible_records: vec![1],
        },
    }
}

fn driver() -> (PrefetchDriver, Arc<PrefetchCacheStore>) {
    let backend = Arc::new(
        MockBackend::new(1024, 0)
            .with_record(1, &[Surface::Top], 2048, 2048)
            .with_defects(1, &[4, 5]),
    );
    let store = PrefetchCacheStore::create(500);
    let orchestrator = Arc::new(PrefetchOrchestrator::new(
        store.clone(),
        backend as Arc<dyn CacheBackend>,
        Arc::new(MockLoader::new()) as Arc<dyn ImageLoader>,
    ));
    (PrefetchDriver::spawn(orchestrator), store)
}

async fn next_outcome(rx: &mut watch::Receiver<Option<RunOutcome>>) -> RunOutcome {
    timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("run should finish")
        .expect("driver alive");
    rx.borrow_and_update().clone().expect("outcome published")
}

#[tokio::test]
async fn update_triggers_a_run() {
    let (driver, store) = driver();
    let mut outcomes = driver.outcomes();

    driver.update(input("line-1", "2D", true));
    let outcome = next_outcome(&mut outcomes).await;
    store.wait_idle().await;

    assert!(matches!(outcome, RunOutcome::Completed(ref r) if r.tiles_enqueued == 4 && r.defects_enqueued == 2));
    assert_eq!(store.stats().await.image_count, 6);
    driver.shutdown().await;
}

#[tokio::test]
async fn line_change_clears_the_store() {
    let (driver, store) = driver();
    let mut outcomes = driver.outcomes();

    driver.update(input("line-1", "2D", true));
    next_outcome(&mut outcomes).await;
    store.wait_idle().await;
    assert_eq!(store.tile_count(), 4);

    // Disabled so the new context does not refill the cache
    driver.update(input("line-2", "2D", false));
    let outcome = next_outcome(&mut outcomes).await;
    assert_eq!(outcome, RunOutcome::Skipped(SkipReason::Disabled));

    let snap = store.snapshot().await;
    assert_eq!(snap.tile_keys, 0);
    assert_eq!(snap.defect_keys, 0);
    assert_eq!(snap.stats.image_count, 0);
    assert!(snap.records.is_empty());
    assert!(snap.log.is_empty());
    driver.shutdown().await;
}

#[tokio::test]
async fn view_change_clears_but_same_context_does_not() {
    let (driver, store) = driver();
    let mut outcomes = driver.outcomes();

    driver.update(input("line-1", "2D", true));
    next_outcome(&mut outcomes).await;
    store.wait_idle().await;

    driver.update(input("line-1", "2D", false));
    next_outcome(&mut outcomes).await;
    assert_eq!(store.tile_count(), 4);

    driver.update(input("line-1", "3D", false));
    next_outcome(&mut outcomes).await;
    assert_eq!(store.tile_count(), 0);
    driver.shutdown().await;
}

#[tokio::test]
async fn clear_local_cache_resets_store() {
    let (driver, store) = driver();
    let mut outcomes = driver.outcomes();

    driver.update(input("line-1", "2D", true));
    next_outcome(&mut outcomes).await;
    store.wait_idle().await;

    driver.clear_local_cache().await;
    assert_eq!(store.tile_count(), 0);
    assert_eq!(store.defect_count(), 0);
    assert!(store.ledger_summary().await.is_empty());
    driver.shutdown().await;
}

#[tokio::test]
async fn context_view_change_clears_the_store() {
    let (driver, store) = driver();
    let mut outcomes = driver.outcomes();

    driver.update(input("line-1", "2D", true));
    next_outcome(&mut outcomes).await;
    store.wait_idle().await;
    assert_eq!(store.tile_count(), 4);

    // Same line, only the context view moves; the new view refills its own grid
    driver.update(input("line-1", "3D", true));
    let outcome = next_outcome(&mut outcomes).await;
    store.wait_idle().await;

    assert!(matches!(outcome, RunOutcome::Completed(ref r) if r.tiles_enqueued == 4));
    assert_eq!(store.tile_count(), 4);
    assert_eq!(store.stats().await.image_count, 6);
    let snap = store.snapshot().await;
    assert_eq!(snap.records[0].tile_count, 4);
    driver.shutdown().await;
}
