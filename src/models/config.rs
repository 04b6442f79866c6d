use std::env;

use serde::{Deserialize, Serialize};

use crate::errors::DbError;

use super::connections::{ConnectionConfig, DbType};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub enum AiBackend {
    #[default]
    Placeholder,
    /// Pipe the prompt through an external command.
    Command(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AiConfig {
    pub backend: AiBackend,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub initial_table: Option<String>,
    pub ai: AiConfig,
}

impl AppConfig {
    /// Call `dotenv::dotenv()` first to pick up a local `.env` file.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| DbError::Config("DATABASE_URL must be set".to_string()))?;

        let mut connection = match lookup("QUERYPILOT_DB_TYPE") {
            Some(name) => {
                let db_type = DbType::from_name(&name).ok_or_else(|| {
                    DbError::Config(format!("unknown QUERYPILOT_DB_TYPE {name:?}"))
                })?;
                ConnectionConfig {
                    db_type,
                    database_url,
                    schema: "public".to_string(),
                }
            }
            None => ConnectionConfig::new(database_url)?,
        };
        if let Some(schema) = lookup("QUERYPILOT_SCHEMA") {
            connection.schema = schema;
        }

        let backend = match lookup("QUERYPILOT_AI").as_deref().map(str::trim) {
            None | Some("placeholder") => AiBackend::Placeholder,
            Some("command") => {
                let command = lookup("QUERYPILOT_AI_COMMAND").ok_or_else(|| {
                    DbError::Config(
                        "QUERYPILOT_AI=command requires QUERYPILOT_AI_COMMAND".to_string(),
                    )
                })?;
                AiBackend::Command(command)
            }
            Some(other) => {
                return Err(DbError::Config(format!(
                    "unknown QUERYPILOT_AI {other:?}, expected placeholder or command"
                )))
            }
        };

        Ok(Self {
            connection,
            initial_table: lookup("QUERYPILOT_TABLE"),
            ai: AiConfig { backend },
        })
    }
}
