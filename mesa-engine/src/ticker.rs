//! 计时刷新器
//!
//! Recomputes every table view (elapsed minutes, next reservation) on a fixed
//! interval and publishes it on a watch channel. Read-only: it never touches
//! the store. Also recomputes right away when a store change is observed.

use std::sync::Arc;
use std::time::Duration;

use shared::message::EntityKind;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::store::{EntityStore, Subscription};
use crate::tables::TableView;

/// Default refresh interval
pub const DEFAULT_TICK: Duration = Duration::from_secs(30);

/// Periodic table-view recomputation
pub struct ElapsedTicker {
    store: EntityStore,
    interval: Duration,
    tx: watch::Sender<Vec<TableView>>,
    shutdown: CancellationToken,
}

impl ElapsedTicker {
    pub fn new(store: EntityStore, interval: Duration, shutdown: CancellationToken) -> (Self, watch::Receiver<Vec<TableView>>) {
        let (tx, rx) = watch::channel(store.table_views());
        let ticker = Self {
            store,
            interval: if interval.is_zero() { DEFAULT_TICK } else { interval },
            tx,
            shutdown,
        };
        (ticker, rx)
    }

    /// 主循环：定时刷新 + 数据变更立即刷新
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Elapsed ticker started");

        let changed = Arc::new(Notify::new());
        let _subscriptions: Vec<Subscription> = [
            EntityKind::Table,
            EntityKind::Draft,
            EntityKind::KitchenTicket,
            EntityKind::Bill,
            EntityKind::Reservation,
        ]
        .into_iter()
        .map(|kind| {
            let changed = changed.clone();
            self.store.subscribe(kind, move |_| changed.notify_one())
        })
        .collect();

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.publish(),
                _ = changed.notified() => self.publish(),
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Elapsed ticker received shutdown signal");
                    return;
                }
            }
        }
    }

    fn publish(&self) {
        let views = self.store.table_views();
        // 无变化不通知
        self.tx.send_if_modified(|current| {
            if *current == views {
                false
            } else {
                *current = views;
                true
            }
        });
    }
}
