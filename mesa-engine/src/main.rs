use std::sync::Arc;

use anyhow::Context;
use mesa_client::{HttpInvoiceCounter, InvoiceCounter, RemoteStore};
use mesa_engine::{ElapsedTicker, EntityStore, StoreOptions, SyncListener, setup_environment};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 日志) + 配置
    let config = setup_environment();
    tracing::info!(
        terminal_id = %config.terminal_id,
        remote_url = %config.remote_url,
        environment = %config.environment,
        tables = config.tables.len(),
        "Mesa engine starting"
    );

    // 2. 远端存储
    let client_config = config.client_config();
    let http = client_config
        .build_http_store()
        .context("failed to build remote store client")?;
    let counter: Arc<dyn InvoiceCounter> =
        Arc::new(HttpInvoiceCounter::new(http.clone(), client_config.invoice_rpc.clone()));
    let remote: Arc<dyn RemoteStore> = Arc::new(http.clone());

    // 3. 实体缓存 + 初始加载
    let store = EntityStore::new(remote, counter, StoreOptions::from_config(&config));
    if let Err(e) = store.load_all().await {
        // keep running on the local cache; the listener retries on the next signal
        tracing::warn!(error = %e, "Initial load incomplete");
    }

    // 4. 后台任务
    let shutdown = CancellationToken::new();
    let watcher = http.spawn_watcher(shutdown.clone());
    let listener = tokio::spawn(SyncListener::new(store.clone(), shutdown.clone()).run());
    let (ticker, mut views) = ElapsedTicker::new(store.clone(), config.elapsed_tick(), shutdown.clone());
    let ticker = tokio::spawn(ticker.run());
    let reporter = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = views.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let occupied = views
                            .borrow()
                            .iter()
                            .filter(|v| v.status == shared::models::TableStatus::Occupied)
                            .count();
                        tracing::debug!(occupied, "Floor updated");
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    };

    // 5. 等待退出信号
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!(pending_ops = store.pending_ops().len(), "Shutdown requested");
    shutdown.cancel();

    let _ = tokio::join!(watcher, listener, ticker, reporter);
    tracing::info!("Mesa engine stopped");
    Ok(())
}
