//! 审计后台 Worker
//!
//! - `DrainWorker`: 每隔固定周期尝试一次完整 drain，与 `log_event` 触发的
//!   drain 共用同一个 in-flight 标志，二者不会并发执行。
//! - `SyncWatcher`: 跟踪同步状态变化；配置尚未与远端对账时，在远端恢复后
//!   补做一次对账。
//!
//! 收到 shutdown 信号时退出。

use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::EventLog;
use crate::settings::ReconcilingStore;

/// 重试队列定时 drain
pub struct DrainWorker {
    log: EventLog,
    period: Duration,
    shutdown: CancellationToken,
}

impl DrainWorker {
    pub fn new(log: EventLog, period: Duration, shutdown: CancellationToken) -> Self {
        Self {
            log,
            period,
            shutdown,
        }
    }

    /// 运行 worker（直到 shutdown）
    pub async fn run(self) {
        tracing::info!(period_secs = self.period.as_secs(), "Audit drain worker started");

        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Audit drain worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if self.log.status().pending == 0 {
                        continue;
                    }
                    match self.log.drain().await {
                        Some(report) => tracing::debug!(
                            delivered = report.delivered,
                            remaining = report.remaining,
                            "Periodic drain finished"
                        ),
                        None => tracing::debug!("Drain already in flight, skipping tick"),
                    }
                }
            }
        }
    }
}

/// 同步状态监听
///
/// 每次状态变化记一条日志。配置未对账时，远端恢复（状态变为已同步）或每个
/// 重试周期都会再尝试一次对账，成功后不再重试。
pub struct SyncWatcher {
    log: EventLog,
    settings: ReconcilingStore,
    retry_period: Duration,
    shutdown: CancellationToken,
}

impl SyncWatcher {
    pub fn new(
        log: EventLog,
        settings: ReconcilingStore,
        retry_period: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            log,
            settings,
            retry_period,
            shutdown,
        }
    }

    /// 运行监听（直到 shutdown）
    pub async fn run(self) {
        let mut status = self.log.subscribe_status();
        let mut retry =
            tokio::time::interval_at(Instant::now() + self.retry_period, self.retry_period);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let s = *status.borrow_and_update();
                    tracing::info!(
                        synced = s.synced,
                        pending = s.pending,
                        dead_lettered = s.dead_lettered,
                        local_persisted = s.local_persisted,
                        "Sync status changed"
                    );
                    if s.synced {
                        self.retry_reconcile().await;
                    }
                }
                _ = retry.tick() => self.retry_reconcile().await,
            }
        }
    }

    async fn retry_reconcile(&self) {
        if self.settings.is_reconciled() {
            return;
        }
        let report = self.settings.reconcile().await;
        if report.remote_reachable {
            tracing::info!(
                adopted = report.adopted.len(),
                device_id = %self.settings.identity(),
                "Settings reconciled after remote recovered"
            );
        }
    }
}
