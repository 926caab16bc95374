//! Mesa Engine - 餐厅终端生命周期引擎
//!
//! # 架构概述
//!
//! Client-resident entity store for one POS terminal: tables, draft orders,
//! kitchen tickets, bills, reservations and event budgets. Mutations apply
//! locally first and are committed to the shared remote store in the
//! background; changes made by other terminals arrive as change signals and
//! are merged back in.
//!
//! # 模块结构
//!
//! ```text
//! mesa-engine/src/
//! ├── core/          # 配置
//! ├── store/         # EntityStore, ledger, merge, observers
//! ├── tables/        # 桌台状态推导、关台
//! ├── orders/        # 草稿、厨房单、账单、金额计算
//! ├── reservations/  # 预订状态机
//! ├── events/        # 宴会预算、发票号、菜单
//! ├── printing/      # 打印协作者
//! ├── ticker.rs      # 计时刷新
//! └── utils/         # 日志
//! ```

pub mod core;
pub mod events;
pub mod orders;
pub mod printing;
pub mod reservations;
pub mod store;
pub mod tables;
pub mod ticker;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, TableSeed};
pub use printing::{EventDocument, LogPrinter, MemoryPrinter, PrintJob, PrintService};
pub use store::{
    Commit, EntityStore, ObserverRegistry, OpId, PendingOp, StoreError, StoreEvent, StoreOptions, StoreResult,
    Subscription, SyncError, SyncListener,
};
pub use tables::{TableClosure, TableView};
pub use ticker::ElapsedTicker;

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env` and start logging from the resulting configuration
pub fn setup_environment() -> Config {
    // .env is optional
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    config
}
