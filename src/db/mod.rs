use crate::{
    errors::DbError,
    models::{
        results::QueryResult,
        schema::{ColumnInfo, ForeignKeyInfo, IndexInfo},
    },
};
use async_trait::async_trait;

pub mod mysql;
pub mod postgres;
pub mod schema;
pub mod sqlite;

#[async_trait]
pub trait DbClient {
    /// Runs a statement that returns no rows and reports the affected row count.
    async fn execute(&self, query: &str) -> Result<u64, DbError>;
    async fn query(&self, query: &str) -> Result<QueryResult, DbError>;
    async fn list_tables(&self) -> Result<Vec<String>, DbError>;
    /// Columns in ordinal order.
    async fn describe_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>, DbError>;
    /// Declared foreign key constraints only.
    async fn describe_foreign_keys(&self, table_name: &str)
        -> Result<Vec<ForeignKeyInfo>, DbError>;
    async fn table_exists(&self, table_name: &str) -> Result<bool, DbError>;
    async fn list_views(&self) -> Result<Vec<String>, DbError>;
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, DbError>;
    /// Plan for `query`. With `analyze` the statement is actually run.
    async fn explain(&self, query: &str, analyze: bool) -> Result<QueryResult, DbError>;
}
