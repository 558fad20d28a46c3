//! Kiosk Sync - 包装工作站的本地优先持久化与同步层
//!
//! # 架构概述
//!
//! 所有操作先落本地存储，网络只做尽力而为的后台同步，操作员永远不会被网络阻塞。
//!
//! - **审计日志** (`audit`): 本地有界日志 + 有序重试队列 + 死信
//! - **配置** (`settings`): 本地为准，远端只补缺
//! - **快照备份** (`backup`): 定时 + 高价值变更触发的全量覆盖备份
//! - **扫码识别** (`scan`): 按字符间隔区分扫码枪与人工输入
//! - **工作流** (`workflow`): 称重贴标状态机
//!
//! # 模块结构
//!
//! ```text
//! kiosk-sync/src/
//! ├── core/          # 配置、后台任务
//! ├── store/         # 本地 KV 存储 (redb)
//! ├── remote/        # 远端存储 trait + HTTP 实现
//! ├── audit/         # 审计日志、重试队列、定时 drain
//! ├── settings/      # 两级配置存储
//! ├── backup/        # 快照备份
//! ├── scan/          # 扫码流解析
//! ├── workflow/      # 工作流状态机与会话
//! └── utils/         # 日志
//! ```

pub mod audit;
pub mod backup;
pub mod core;
pub mod remote;
pub mod scan;
pub mod settings;
pub mod store;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use audit::{DrainWorker, EventLog, EventLogConfig, SyncStatus, SyncWatcher};
pub use backup::{BackupHandle, BackupReason, Backupper, SnapshotSource, StationSource};
pub use crate::core::{BackgroundTasks, Config, TaskKind};
pub use remote::{AuditRemote, BackupRemote, RemoteError, SettingsRemote};
pub use scan::{ScanConfig, ScanGate, ScanParser};
pub use settings::{ReconcilingStore, SettingKey};
pub use store::{LocalStore, RedbStore, StoreError};
pub use workflow::{KioskSession, Sequencer, WorkflowAction, WorkflowState};

/// 设置运行环境：加载 .env、初始化日志、创建工作目录
pub fn setup_environment() -> std::io::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    utils::init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    std::fs::create_dir_all(&config.work_dir)?;

    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    __ __ _             __
   / //_/(_)___  _____/ /__
  / ,<  / / __ \/ ___/ //_/
 / /| |/ / /_/ (__  ) ,<
/_/ |_/_/\____/____/_/|_|   sync
    "#
    );
}
