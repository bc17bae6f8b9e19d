//! 演示入口
//!
//! 用内存存储和进程内变更订阅跑一个完整引擎：播种几张桌台和预订，
//! 启动后台任务，把楼面更新打到日志，Ctrl-C 优雅退出。

use std::sync::Arc;

use floor_engine::{
    BackgroundTasks, ChannelFeed, EngineConfig, FeedCollection, FloorEngine, FloorUpdate,
    MemoryStore, group_by_floor, init_logger,
};
use shared::models::{DiningTable, Reservation, VisitState};
use shared::util::now_millis;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logger();

    tracing::info!("Floor engine demo starting...");

    let config = EngineConfig::from_env();
    let store = Arc::new(seed_store());
    let (feed_handle, feed) = ChannelFeed::new(32);

    let engine = FloorEngine::new(store.clone(), config);
    let mut tasks = BackgroundTasks::new();
    engine.start_background_tasks(&mut tasks, feed);

    // 初始楼面
    let views = engine.project_tables(None).await?;
    for (floor, tables) in group_by_floor(views) {
        for view in tables {
            tracing::info!(
                floor = %floor,
                table = %view.table.name,
                status = ?view.status,
                customer = view.reservation.as_ref().map(|r| r.customer_name.as_str()),
                "Initial floor state"
            );
        }
    }

    // 订阅楼面更新
    let mut updates = engine.subscribe();
    let update_logger = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            match update {
                FloorUpdate::Projection { views, .. } => {
                    tracing::info!(tables = views.len(), "Floor projection refreshed");
                }
                FloorUpdate::Reconciled { snapshot } => {
                    let at = chrono::DateTime::from_timestamp_millis(snapshot.reference_time)
                        .map(|dt| dt.to_rfc3339())
                        .unwrap_or_default();
                    tracing::info!(
                        sequence = snapshot.sequence,
                        reference = %at,
                        corrections = snapshot.corrections(),
                        advances = snapshot.advances(),
                        changed = snapshot.status_changes.len(),
                        "Reconciliation snapshot received"
                    );
                    if !snapshot.status_changes.is_empty() {
                        let diff = serde_json::to_string(&snapshot.status_changes)
                            .unwrap_or_default();
                        tracing::info!(diff = %diff, "Table status changes");
                    }
                }
            }
        }
    });

    // 模拟一条来自订位流程的变更通知
    feed_handle
        .notify(FeedCollection::Reservations, "insert")
        .await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    update_logger.abort();
    tasks.shutdown().await;
    Ok(())
}

/// 播种演示数据：两层共 5 桌，一桌用餐中、一桌预订临近、一桌已过点
fn seed_store() -> MemoryStore {
    let store = MemoryStore::new();
    let now = now_millis();
    const MIN: i64 = 60_000;

    for (id, name, floor, capacity) in [
        (1, "T1", "ground", 4),
        (2, "T2", "ground", 4),
        (3, "T3", "ground", 6),
        (4, "P1", "terrace", 2),
        (5, "P2", "terrace", 8),
    ] {
        store.insert_table(DiningTable::new(id, name, floor, capacity));
    }

    // 用餐中
    let mut dining = Reservation::new("Garcia", "600111222", 4, now - 10 * MIN);
    dining.visit = VisitState::InProcess;
    let dining_id = dining.id;
    store.insert_reservation(dining);
    store.assign(dining_id, 1);

    // 8 分钟后到店
    let upcoming = Reservation::new("Moreno", "600333444", 2, now + 8 * MIN);
    let upcoming_id = upcoming.id;
    store.insert_reservation(upcoming);
    store.assign(upcoming_id, 4);

    // 已过点未到：下一次对账会被自动取消
    let late = Reservation::new("Santos", "600555666", 6, now - 7 * MIN);
    let late_id = late.id;
    store.insert_reservation(late);
    store.assign(late_id, 5);

    store
}
