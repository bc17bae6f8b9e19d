//! 端到端对账流程测试
//!
//! 用内存存储驱动完整引擎，覆盖预订时间线、超时自动结账、脏数据修复
//! 和 what-if 模式的只读性。

use std::sync::Arc;
use std::time::Duration;

use floor_engine::{
    BackgroundTasks, ChannelFeed, EngineConfig, EngineError, EngineMode, FeedCollection,
    FloorEngine, FloorUpdate, MemoryStore, TableStatus,
};
use shared::models::{DiningTable, LifecycleState, Reservation, VisitState};
use shared::util::now_millis;

const MIN: i64 = 60_000;

fn start_engine(store: &MemoryStore) -> (FloorEngine, BackgroundTasks) {
    let engine = FloorEngine::new(Arc::new(store.clone()), EngineConfig::default());
    let (_handle, feed) = ChannelFeed::new(8);
    let mut tasks = BackgroundTasks::new();
    engine.start_background_tasks(&mut tasks, feed);
    (engine, tasks)
}

async fn status_at(engine: &FloorEngine, table_id: i64, reference: i64) -> TableStatus {
    engine
        .project_tables(Some(reference))
        .await
        .unwrap()
        .into_iter()
        .find(|v| v.table.id == table_id)
        .unwrap()
        .status
}

#[tokio::test]
async fn test_no_show_timeline() {
    let store = MemoryStore::new();
    store.insert_table(DiningTable::new(1, "T1", "ground", 4));

    // 预订在 6 分钟前，从未签到
    let scheduled = now_millis() - 6 * MIN;
    let r = Reservation::new("Moreno", "600", 2, scheduled);
    let id = r.id;
    store.insert_reservation(r);
    store.assign(id, 1);

    let (engine, tasks) = start_engine(&store);

    // 时间线：T−15 → empty, T−8 → reserved, T−1 → ready
    assert_eq!(
        status_at(&engine, 1, scheduled - 15 * MIN).await,
        TableStatus::Empty
    );
    assert_eq!(
        status_at(&engine, 1, scheduled - 8 * MIN).await,
        TableStatus::Reserved
    );
    assert_eq!(
        status_at(&engine, 1, scheduled - MIN).await,
        TableStatus::Ready
    );

    // 现在已过点 6 分钟：一次对账把它取消
    let snapshot = engine.run_reconciliation().await.unwrap();
    assert_eq!(snapshot.no_show_ids, vec![id]);
    assert!(snapshot.auto_checkout_ids.is_empty());

    let cancelled = store.get_reservation(id).unwrap();
    assert_eq!(
        cancelled.state_pair(),
        (LifecycleState::Cancelled, VisitState::UnVisited)
    );
    assert_eq!(status_at(&engine, 1, now_millis()).await, TableStatus::Empty);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_overstay_timeline() {
    let store = MemoryStore::new();
    store.insert_table(DiningTable::new(1, "T1", "ground", 4));

    // 35 分钟前签到入座
    let scheduled = now_millis() - 35 * MIN;
    let mut r = Reservation::new("Garcia", "600", 4, scheduled);
    r.visit = VisitState::InProcess;
    let id = r.id;
    store.insert_reservation(r);
    store.assign(id, 1);

    let (engine, tasks) = start_engine(&store);

    // 用餐窗内是 occupied
    assert_eq!(
        status_at(&engine, 1, scheduled + 20 * MIN).await,
        TableStatus::Occupied
    );

    // 对账前：显示兜底为 empty，但数据未被修改
    let views = engine.project_tables(None).await.unwrap();
    assert_eq!(views[0].status, TableStatus::Empty);
    assert!(views[0].flag.is_some());
    assert!(store.get_reservation(id).unwrap().is_active());

    // 对账后：自动结账
    let snapshot = engine.run_reconciliation().await.unwrap();
    assert_eq!(snapshot.auto_checkout_ids, vec![id]);
    assert_eq!(
        store.get_reservation(id).unwrap().state_pair(),
        (LifecycleState::Completed, VisitState::Visited)
    );
    // 重投影后过期标记消失
    assert_eq!(snapshot.stale_flags, 0);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_pair_is_repaired_and_table_stays_empty() {
    let store = MemoryStore::new();
    store.insert_table(DiningTable::new(1, "T1", "ground", 4));

    // 存储中出现非法组合 (completed, in_process)
    let mut r = Reservation::new("Santos", "600", 2, now_millis());
    r.lifecycle = LifecycleState::Completed;
    r.visit = VisitState::InProcess;
    let id = r.id;
    store.insert_reservation(r);
    store.assign(id, 1);

    let (engine, tasks) = start_engine(&store);

    // 修复前后桌台都显示 empty (非活跃预订不参与投影)
    assert_eq!(status_at(&engine, 1, now_millis()).await, TableStatus::Empty);

    let snapshot = engine.run_reconciliation().await.unwrap();
    assert_eq!(snapshot.corrected_ids, vec![id]);
    assert_eq!(
        store.get_reservation(id).unwrap().state_pair(),
        (LifecycleState::Completed, VisitState::Visited)
    );
    assert_eq!(status_at(&engine, 1, now_millis()).await, TableStatus::Empty);

    // 最近摘要可查
    assert_eq!(engine.last_summary().unwrap().sequence, snapshot.sequence);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_custom_mode_never_writes() {
    let store = MemoryStore::new();
    store.insert_table(DiningTable::new(1, "T1", "ground", 4));

    // 一个早已过点的预订：live 对账会取消它，custom 模式绝不能
    let r = Reservation::new("Moreno", "600", 2, now_millis() - 60 * MIN);
    let id = r.id;
    store.insert_reservation(r);
    store.assign(id, 1);

    let (engine, tasks) = start_engine(&store);

    let what_if = now_millis() - 55 * MIN;
    engine
        .set_mode(EngineMode::Custom {
            reference_time: what_if,
        })
        .await
        .unwrap();
    assert!(engine.mode().is_custom());

    // 任意次投影都只是读取
    for offset in [0, 3 * MIN, 10 * MIN, 60 * MIN] {
        let views = engine.project_tables(Some(what_if + offset)).await.unwrap();
        assert_eq!(views.len(), 1);
    }
    let views = engine.project_tables(None).await.unwrap();
    assert_eq!(views[0].status, TableStatus::Ready);

    // 对账被拒绝，存储零写入
    assert!(matches!(
        engine.run_reconciliation().await,
        Err(EngineError::SimulationMode)
    ));
    assert_eq!(store.write_count(), 0);
    assert!(store.get_reservation(id).unwrap().is_active());

    // 回到 live 模式后正常推进
    engine.set_mode(EngineMode::Live).await.unwrap();
    let snapshot = engine.run_reconciliation().await.unwrap();
    assert_eq!(snapshot.no_show_ids, vec![id]);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_feed_event_triggers_projection_refresh() {
    let store = MemoryStore::new();
    store.insert_table(DiningTable::new(1, "T1", "ground", 4));

    let engine = FloorEngine::new(Arc::new(store.clone()), EngineConfig::default());
    let (handle, feed) = ChannelFeed::new(8);
    let mut tasks = BackgroundTasks::new();
    engine.start_background_tasks(&mut tasks, feed);

    let mut updates = engine.subscribe();
    handle.notify(FeedCollection::Reservations, "insert").await;

    let update = tokio::time::timeout(Duration::from_secs(2), updates.recv())
        .await
        .expect("no floor update within 2s")
        .unwrap();
    match update {
        FloorUpdate::Projection { views, .. } => assert_eq!(views.len(), 1),
        other => panic!("expected projection refresh, got {:?}", other),
    }
    // 轻量刷新不跑修正器/推进器
    assert_eq!(store.write_count(), 0);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_rejects_far_future_reference_time() {
    let store = MemoryStore::new();
    let (engine, tasks) = start_engine(&store);

    let far = now_millis() + 400 * 86_400_000;
    assert!(matches!(
        engine.project_tables(Some(far)).await,
        Err(EngineError::InvalidReferenceTime { .. })
    ));

    tasks.shutdown().await;
}
