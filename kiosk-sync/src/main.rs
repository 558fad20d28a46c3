use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use kiosk_client::HttpClient;
use kiosk_sync::{
    BackgroundTasks, Backupper, DrainWorker, EventLog, RedbStore, ReconcilingStore, SettingKey,
    StationSource, SyncWatcher, TaskKind, print_banner, setup_environment,
};
use serde_json::json;
use shared::EventType;

const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 日志, 工作目录)
    let config = setup_environment().context("failed to prepare environment")?;
    print_banner();
    tracing::info!(work_dir = %config.work_dir, remote = %config.remote_base_url, "Kiosk sync starting");

    // 2. 本地存储
    let store = Arc::new(
        RedbStore::open(config.store_path())
            .context("failed to open local store")?
            .with_capacity(config.local_store_capacity),
    );

    // 3. 远端客户端（离线也照常启动）
    let client = Arc::new(HttpClient::new(&config.client_config()).context("invalid remote configuration")?);
    match client.health().await {
        Ok(()) => tracing::info!("Remote store reachable"),
        Err(e) => tracing::warn!(error = %e, "Remote store unreachable, running offline"),
    }

    // 4. 审计日志 + 配置
    let log = EventLog::open(store.clone(), client.clone(), config.event_log_config());
    let settings = ReconcilingStore::new(store.clone(), client.clone())
        .with_push_timeout(config.settings_timeout());
    let report = settings.reconcile().await;
    // 离线启动时为临时 ID，远端恢复后对账才会落盘
    let device_id = settings.identity();

    log.log_event(
        EventType::AppStarted,
        json!({
            "deviceId": device_id,
            "station": settings.get_text(SettingKey::StationName),
            "remoteReachable": report.remote_reachable,
            "pending": log.status().pending,
        }),
    );

    // 5. 后台任务
    let mut tasks = BackgroundTasks::new();
    let worker = DrainWorker::new(log.clone(), config.drain_interval(), tasks.shutdown_token());
    tasks.spawn("audit_drain", TaskKind::Periodic, worker.run());

    let watcher = SyncWatcher::new(
        log.clone(),
        settings.clone(),
        config.drain_interval(),
        tasks.shutdown_token(),
    );
    tasks.spawn("sync_watcher", TaskKind::Worker, watcher.run());

    if settings.get_bool(SettingKey::BackupEnabled) {
        let source = Arc::new(StationSource::new(log.clone(), settings.clone()));
        let backupper = Backupper::new(source, client.clone())
            .with_period(config.backup_interval())
            .with_timeout(config.settings_timeout());
        let shutdown = tasks.shutdown_token();
        tasks.spawn("snapshot_backup", TaskKind::Periodic, backupper.run(shutdown));
    } else {
        tracing::info!("Snapshot backup disabled by settings");
    }
    tracing::info!(count = tasks.len(), "Background tasks started");

    // 6. 等待退出信号，期间定期检查后台任务
    let mut health = tokio::time::interval(HEALTH_CHECK_PERIOD);
    health.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
            _ = health.tick() => {
                let stopped = tasks.check_health();
                if stopped > 0 {
                    tracing::warn!(stopped, total = tasks.len(), "Background tasks stopped early");
                }
            }
        }
    }

    // 7. 关闭：记录停止事件，最后尝试一次 drain
    tracing::info!("Shutdown signal received");
    if let Err(e) = log.log_event(EventType::AppStopped, json!({ "deviceId": device_id })).await {
        tracing::warn!(error = %e, "Stop event delivery task failed");
    }
    if let Some(drain) = log.drain().await {
        tracing::info!(delivered = drain.delivered, remaining = drain.remaining, "Final drain finished");
    }
    tasks.shutdown(config.shutdown_timeout()).await;

    tracing::info!("Kiosk sync stopped");
    Ok(())
}
