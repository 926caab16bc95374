use mesa_client::ClientConfig;
use shared::order::MergePolicy;
use std::time::Duration;

/// 终端配置 - 每个 POS 终端的所有配置项
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | MESA_REMOTE_URL | http://localhost:54321 | 远程存储地址 |
/// | MESA_API_KEY | (无) | 远程存储 API key |
/// | MESA_TERMINAL_ID | terminal-1 | 终端标识 (写入厨房单) |
/// | MESA_REQUEST_TIMEOUT_SECS | 15 | 请求超时(秒) |
/// | MESA_POLL_INTERVAL_MS | 2000 | 变更轮询间隔(毫秒) |
/// | MESA_ELAPSED_TICK_SECS | 30 | 计时刷新间隔(秒) |
/// | MESA_MERGE_POLICY | merge_matching | 加菜合并策略 |
/// | MESA_TABLES | (空) | 桌台布局 `zone:name,zone:name` |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// MESA_TERMINAL_ID=barra MESA_TABLES="Sala:1,Sala:2,Terraza:T1" cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub remote_url: String,
    pub api_key: Option<String>,
    /// 终端标识
    pub terminal_id: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// 计时刷新间隔
    pub elapsed_tick_secs: u64,
    pub merge_policy: MergePolicy,
    /// 初始桌台布局
    pub tables: Vec<TableSeed>,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

/// One table of the configured floor layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSeed {
    pub zone: String,
    pub name: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            remote_url: std::env::var("MESA_REMOTE_URL")
                .unwrap_or_else(|_| "http://localhost:54321".into()),
            api_key: std::env::var("MESA_API_KEY").ok().filter(|k| !k.is_empty()),
            terminal_id: std::env::var("MESA_TERMINAL_ID").unwrap_or_else(|_| "terminal-1".into()),
            request_timeout_secs: std::env::var("MESA_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            poll_interval_ms: std::env::var("MESA_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
            elapsed_tick_secs: std::env::var("MESA_ELAPSED_TICK_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            merge_policy: std::env::var("MESA_MERGE_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            tables: std::env::var("MESA_TABLES")
                .map(|v| parse_table_layout(&v))
                .unwrap_or_default(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Remote client configuration derived from this config
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.remote_url)
            .with_timeout(self.request_timeout_secs)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms));
        match &self.api_key {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    pub fn elapsed_tick(&self) -> Duration {
        Duration::from_secs(self.elapsed_tick_secs.max(1))
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Parse `zone:name,zone:name`; entries without a zone land in "Sala"
pub fn parse_table_layout(spec: &str) -> Vec<TableSeed> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (zone, name) = match entry.split_once(':') {
                Some((zone, name)) => (zone.trim(), name.trim()),
                None => ("Sala", entry),
            };
            if name.is_empty() {
                tracing::warn!(entry, "Ignoring table entry without a name");
                return None;
            }
            Some(TableSeed {
                zone: if zone.is_empty() { "Sala" } else { zone }.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}
