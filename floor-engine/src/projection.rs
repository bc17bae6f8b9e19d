//! 楼面投影
//!
//! 把全部桌台与各自的活跃预订联接起来，逐桌套用状态推导，得到完整
//! 楼面视图。纯计算，O(桌台数 + 预订数 + 关联数)。

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use shared::models::{DiningTable, Reservation, TableAssignment};

use crate::core::ReservationPolicy;
use crate::status::{DeriveFlag, TableStatus, derive_status};

/// 单个桌台的投影视图
#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub table: DiningTable,
    pub status: TableStatus,
    /// 占用该桌台的活跃预订 (如有)
    pub reservation: Option<Reservation>,
    /// 推导时发现的数据异常
    pub flag: Option<DeriveFlag>,
}

impl TableView {
    pub fn reservation_id(&self) -> Option<i64> {
        self.reservation.as_ref().map(|r| r.id)
    }
}

/// 计算整个楼面的投影
///
/// 每个桌台至多有一个活跃预订（订位流程保证的不变量，这里不再校验；
/// 若上游破坏了它，取先索引到的那个，结果仍然确定）。没有任何活跃
/// 预订时得到全 `empty` 扫描。
pub fn project(
    tables: &[DiningTable],
    reservations: &[Reservation],
    assignments: &[TableAssignment],
    reference_ms: i64,
    policy: &ReservationPolicy,
) -> Vec<TableView> {
    // 活跃预订索引
    let active: HashMap<i64, &Reservation> = reservations
        .iter()
        .filter(|r| r.is_active())
        .map(|r| (r.id, r))
        .collect();

    // 桌台 → 活跃预订
    let mut by_table: HashMap<i64, &Reservation> = HashMap::with_capacity(assignments.len());
    for assignment in assignments {
        if let Some(reservation) = active.get(&assignment.reservation_id) {
            by_table.entry(assignment.table_id).or_insert(reservation);
        }
    }

    tables
        .iter()
        .map(|table| {
            let reservation = by_table.get(&table.id).copied();
            let derived = derive_status(reservation, reference_ms, policy);
            TableView {
                table: table.clone(),
                status: derived.status,
                reservation: reservation.cloned(),
                flag: derived.flag,
            }
        })
        .collect()
}

/// 按楼层分组 (楼面总览用)
pub fn group_by_floor(views: Vec<TableView>) -> BTreeMap<String, Vec<TableView>> {
    let mut floors: BTreeMap<String, Vec<TableView>> = BTreeMap::new();
    for view in views {
        floors.entry(view.table.floor.clone()).or_default().push(view);
    }
    floors
}
