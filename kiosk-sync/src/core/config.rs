use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kiosk_client::ClientConfig;

use crate::audit::EventLogConfig;

/// 同步守护进程配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/kiosk | 工作目录（本地存储、日志） |
/// | REMOTE_BASE_URL | http://localhost:3000 | 远端存储地址 |
/// | REMOTE_TOKEN | (无) | 远端 Bearer token |
/// | AUDIT_TIMEOUT_MS | 5000 | 单次审计上报超时(毫秒) |
/// | SETTINGS_TIMEOUT_MS | 5000 | 配置/备份推送超时(毫秒) |
/// | HEALTH_TIMEOUT_MS | 3000 | 健康检查超时(毫秒) |
/// | DRAIN_INTERVAL_SECS | 30 | 重试队列定时 drain 周期(秒) |
/// | BACKUP_INTERVAL_SECS | 15 | 快照备份周期(秒) |
/// | MAX_LOCAL_AUDIT | 5000 | 本地审计日志上限 |
/// | RETRY_QUEUE_CAP | 200 | 重试队列上限 |
/// | MAX_DELIVERY_ATTEMPTS | 5 | 队头被拒绝多少次后转入死信 |
/// | LOCAL_STORE_CAPACITY | 4194304 | 本地存储容量上限(字节) |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时(毫秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录，设置后按天滚动写文件 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/kiosk REMOTE_BASE_URL=https://store.example.com cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放本地数据库
    pub work_dir: String,
    /// 远端存储地址
    pub remote_base_url: String,
    pub remote_token: Option<String>,
    pub audit_timeout_ms: u64,
    pub settings_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub drain_interval_secs: u64,
    pub backup_interval_secs: u64,
    pub max_local_audit: usize,
    pub retry_queue_cap: usize,
    pub max_delivery_attempts: u32,
    /// 本地存储容量上限 (字节)
    pub local_store_capacity: usize,
    pub shutdown_timeout_ms: u64,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析的变量使用默认值
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置（测试时传入固定表）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            work_dir: text("WORK_DIR").unwrap_or_else(|| "/var/lib/kiosk".into()),
            remote_base_url: text("REMOTE_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into()),
            remote_token: text("REMOTE_TOKEN"),
            audit_timeout_ms: positive(parse_var(&lookup, "AUDIT_TIMEOUT_MS"), 5_000),
            settings_timeout_ms: positive(parse_var(&lookup, "SETTINGS_TIMEOUT_MS"), 5_000),
            health_timeout_ms: positive(parse_var(&lookup, "HEALTH_TIMEOUT_MS"), 3_000),
            drain_interval_secs: positive(parse_var(&lookup, "DRAIN_INTERVAL_SECS"), 30),
            backup_interval_secs: positive(parse_var(&lookup, "BACKUP_INTERVAL_SECS"), 15),
            max_local_audit: positive(parse_var(&lookup, "MAX_LOCAL_AUDIT"), 5_000),
            retry_queue_cap: positive(parse_var(&lookup, "RETRY_QUEUE_CAP"), 200),
            max_delivery_attempts: positive(parse_var(&lookup, "MAX_DELIVERY_ATTEMPTS"), 5),
            local_store_capacity: positive(
                parse_var(&lookup, "LOCAL_STORE_CAPACITY"),
                crate::store::DEFAULT_CAPACITY_BYTES,
            ),
            shutdown_timeout_ms: positive(parse_var(&lookup, "SHUTDOWN_TIMEOUT_MS"), 10_000),
            log_level: text("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: text("LOG_DIR"),
        }
    }

    /// 本地数据库文件路径
    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("kiosk.redb")
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }

    pub fn settings_timeout(&self) -> Duration {
        Duration::from_millis(self.settings_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn event_log_config(&self) -> EventLogConfig {
        EventLogConfig {
            max_local_entries: self.max_local_audit,
            retry_queue_cap: self.retry_queue_cap,
            max_delivery_attempts: self.max_delivery_attempts,
            delivery_timeout: Duration::from_millis(self.audit_timeout_ms),
            ..EventLogConfig::default()
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.remote_base_url)
            .with_timeout_ms(self.audit_timeout_ms.max(self.settings_timeout_ms));
        config.health_timeout_ms = self.health_timeout_ms;
        if let Some(token) = &self.remote_token {
            config = config.with_token(token);
        }
        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// 零值不是有效的上限或周期，回退到默认值
fn positive<T: PartialEq + Default>(value: Option<T>, default: T) -> T {
    value.filter(|v| *v != T::default()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
