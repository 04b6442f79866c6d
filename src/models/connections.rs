use serde::{Deserialize, Serialize};

use crate::errors::DbError;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    MySql,
    Sqlite,
}

impl DbType {
    /// Parses an explicit backend name such as `postgres` or `sqlite`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(DbType::Postgres),
            "mysql" | "mariadb" => Some(DbType::MySql),
            "sqlite" | "sqlite3" => Some(DbType::Sqlite),
            _ => None,
        }
    }

    /// Infers the backend from a connection URL scheme.
    pub fn from_url(database_url: &str) -> Option<Self> {
        let scheme = database_url.split(':').next()?;
        match scheme {
            "postgres" | "postgresql" => Some(DbType::Postgres),
            "mysql" | "mariadb" => Some(DbType::MySql),
            "sqlite" => Some(DbType::Sqlite),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectionConfig {
    pub db_type: DbType,
    pub database_url: String,
    /// Catalog schema to introspect. Only PostgreSQL uses it.
    pub schema: String,
}

impl ConnectionConfig {
    pub fn new(database_url: impl Into<String>) -> Result<Self, DbError> {
        let database_url = database_url.into();
        let db_type = DbType::from_url(&database_url).ok_or_else(|| {
            DbError::Config(format!(
                "cannot infer database type from URL scheme of {database_url:?}"
            ))
        })?;

        Ok(Self {
            db_type,
            database_url,
            schema: "public".to_string(),
        })
    }
}
