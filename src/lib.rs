use db::{mysql::MySqlClient, postgres::PostgresClient, sqlite::SqliteClient, DbClient};
use errors::DbError;
use log::info;
use models::connections::{ConnectionConfig, DbType};
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod ai;
pub mod client;
pub mod db;
pub mod errors;
pub mod models;
pub mod plan;

/// Owns the active database connection. Work units clone the client out and
/// release the lock before running.
#[derive(Default)]
pub struct DbManager {
    connection: Arc<Mutex<Option<Arc<dyn DbClient + Send + Sync>>>>,
}

impl DbManager {
    pub fn new() -> Self {
        DbManager {
            connection: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn connect(&self, config: &ConnectionConfig) -> Result<(), DbError> {
        let client: Arc<dyn DbClient + Send + Sync> = match config.db_type {
            DbType::Postgres => Arc::new(
                PostgresClient::connect(&config.database_url, &config.schema).await?,
            ),
            DbType::MySql => Arc::new(MySqlClient::connect(&config.database_url).await?),
            DbType::Sqlite => Arc::new(SqliteClient::connect(&config.database_url).await?),
        };

        info!("Connected to {:?} database", config.db_type);
        self.set_client(client).await;
        Ok(())
    }

    pub async fn set_client(&self, client: Arc<dyn DbClient + Send + Sync>) {
        *self.connection.lock().await = Some(client);
    }

    pub async fn client(&self) -> Option<Arc<dyn DbClient + Send + Sync>> {
        self.connection.lock().await.clone()
    }

    pub async fn disconnect(&self) {
        self.connection.lock().await.take();
    }
}
