pub mod config;
pub mod connection_manager;
pub mod database;
pub mod database_manager;
pub mod settlement_manager;

use surrealdb::Connection;
use tokio::join;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::error;

use crate::config::ServerConfig;
use crate::database::DatabaseConnection;
use crate::database_manager::{DatabaseHandle, DatabaseManager};
use crate::settlement_manager::SettlementManager;

/// Spawns the store and settlement actors and serves clients on `listener`.
///
/// Accept errors are logged and retried, so this only returns if one of the
/// tasks panics or the listener's address cannot be read.
pub async fn serve<C: Connection>(
    config: &ServerConfig,
    database: DatabaseConnection<C>,
    listener: TcpListener,
) -> anyhow::Result<()> {
    let (db_tx, db_rx) = mpsc::channel(config.queue_capacity);
    let mut db_manager = DatabaseManager::new(database, db_rx);

    let db_task = tokio::spawn(async move {
        db_manager.manage().await;
    });

    let database = DatabaseHandle::new(db_tx);
    let (settlement_tx, settlement_rx) = mpsc::channel(config.queue_capacity);
    let mut settlement_manager = SettlementManager::new(settlement_rx, database.clone());

    let settlement_task = tokio::spawn(async move {
        settlement_manager.manage().await;
    });

    let listen_server_task = tokio::spawn(async move {
        connection_manager::handle_listen_server(listener, database, settlement_tx).await
    });

    let (res1, res2, res3) = join!(db_task, settlement_task, listen_server_task);
    res1?;
    res2?;
    if let Err(error) = res3? {
        error!(%error, "listen server stopped");
        return Err(error);
    }
    Ok(())
}
