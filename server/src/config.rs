use clap::Parser;

/// Runtime settings, read from flags or the environment (a `.env` file is
/// loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(name = "propel-server")]
#[command(about = "Milestone market store and settlement server")]
pub struct ServerConfig {
    /// Address the WebSocket front listens on
    #[arg(long, env = "PROPEL_LISTEN_ADDR", default_value = "127.0.0.1:6379")]
    pub listen_addr: String,

    /// `memory` for the embedded store, otherwise a SurrealDB ws address
    #[arg(long, env = "PROPEL_DATABASE", default_value = "memory")]
    pub database: String,

    #[arg(long, env = "PROPEL_DB_NAMESPACE", default_value = "propel")]
    pub namespace: String,

    #[arg(long, env = "PROPEL_DB_NAME", default_value = "markets")]
    pub database_name: String,

    /// Root user for a remote database
    #[arg(long, env = "PROPEL_DB_USER", default_value = "root")]
    pub database_user: String,

    #[arg(long, env = "PROPEL_DB_PASSWORD", default_value = "root")]
    pub database_password: String,

    /// Capacity of each actor's work queue
    #[arg(long, env = "PROPEL_QUEUE_CAPACITY", default_value = "32")]
    pub queue_capacity: usize,

    /// Filter directives used when RUST_LOG is unset
    #[arg(long, env = "PROPEL_LOG", default_value = "info")]
    pub log_filter: String,
}

impl ServerConfig {
    pub fn uses_memory_database(&self) -> bool {
        self.database.eq_ignore_ascii_case("memory")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:6379".into(),
            database: "memory".into(),
            namespace: "propel".into(),
            database_name: "markets".into(),
            database_user: "root".into(),
            database_password: "root".into(),
            queue_capacity: 32,
            log_filter: "info".into(),
        }
    }
}
