use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use server::config::ServerConfig;
use server::database::DatabaseConnection;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    if config.uses_memory_database() {
        info!("using in-memory market store");
        let database = DatabaseConnection::in_memory(&config.namespace, &config.database_name)
            .await
            .context("failed to start in-memory database")?;
        server::serve(&config, database, listener).await
    } else {
        info!(address = %config.database, "connecting to market store");
        let database = DatabaseConnection::remote(
            &config.database,
            &config.database_user,
            &config.database_password,
            &config.namespace,
            &config.database_name,
        )
        .await
        .with_context(|| format!("failed to connect to {}", config.database))?;
        server::serve(&config, database, listener).await
    }
}
