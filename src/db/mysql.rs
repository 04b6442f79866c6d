use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPoolOptions, MySqlRow},
    Column, Decode, Executor, MySql, MySqlPool, Row, Type, TypeInfo,
};

use crate::{
    errors::DbError,
    models::{
        results::{QueryResult, NULL_TEXT},
        schema::{ColumnInfo, ForeignKeyInfo, IndexInfo},
    },
};

use super::DbClient;

// information_schema columns are cast to CHAR so they decode as text on
// servers that report them as binary strings.
const COLUMNS_QUERY: &str = r#"
    SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
           CAST(COLUMN_TYPE AS CHAR) AS data_type,
           CAST(IS_NULLABLE AS CHAR) AS is_nullable,
           CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
           CAST(COLUMN_KEY AS CHAR) AS column_key
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT CAST(CONSTRAINT_NAME AS CHAR) AS constraint_name,
           CAST(COLUMN_NAME AS CHAR) AS column_name,
           CAST(REFERENCED_TABLE_NAME AS CHAR) AS foreign_table,
           CAST(REFERENCED_COLUMN_NAME AS CHAR) AS foreign_column
    FROM information_schema.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = DATABASE()
      AND TABLE_NAME = ?
      AND REFERENCED_TABLE_NAME IS NOT NULL
    ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
"#;

pub struct MySqlClient {
    pub pool: MySqlPool,
}

impl MySqlClient {
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DbClient for MySqlClient {
    async fn execute(&self, query: &str) -> Result<u64, DbError> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;
        Ok(result.rows_affected())
    }

    async fn query(&self, query: &str) -> Result<QueryResult, DbError> {
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => self
                .pool
                .describe(query)
                .await?
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        };

        let data: Vec<Vec<String>> = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| cell_text(row, i)).collect())
            .collect();

        Ok(QueryResult::new(columns, data))
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name").map_err(DbError::Sqlx))
            .collect()
    }

    async fn describe_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>, DbError> {
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ColumnInfo, DbError> {
                Ok(ColumnInfo {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    is_nullable: row.try_get::<String, _>("is_nullable")? == "YES",
                    default: row.try_get("column_default")?,
                    is_primary_key: row.try_get::<String, _>("column_key")? == "PRI",
                })
            })
            .collect()
    }

    async fn describe_foreign_keys(
        &self,
        table_name: &str,
    ) -> Result<Vec<ForeignKeyInfo>, DbError> {
        let rows = sqlx::query(FOREIGN_KEYS_QUERY)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ForeignKeyInfo, DbError> {
                Ok(ForeignKeyInfo {
                    constraint_name: row.try_get("constraint_name")?,
                    column: row.try_get("column_name")?,
                    foreign_table: row.try_get("foreign_table")?,
                    foreign_column: row.try_get("foreign_column")?,
                })
            })
            .collect()
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool, DbError> {
        let query = r#"
            SELECT COUNT(*)
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        "#;
        let count = sqlx::query_scalar::<_, i64>(query)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn list_views(&self) -> Result<Vec<String>, DbError> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'VIEW'
            ORDER BY TABLE_NAME
        "#;
        let views = sqlx::query_scalar::<_, String>(query)
            .fetch_all(&self.pool)
            .await?;
        Ok(views)
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, DbError> {
        // STATISTICS has one row per indexed column.
        let query = r#"
            SELECT DISTINCT CAST(INDEX_NAME AS CHAR) AS index_name,
                   CAST(TABLE_NAME AS CHAR) AS table_name
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = DATABASE()
            ORDER BY index_name, table_name
        "#;
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<IndexInfo, DbError> {
                Ok(IndexInfo {
                    name: row.try_get("index_name")?,
                    table_name: row.try_get("table_name")?,
                })
            })
            .collect()
    }

    async fn explain(&self, query: &str, analyze: bool) -> Result<QueryResult, DbError> {
        let prefix = if analyze { "EXPLAIN ANALYZE" } else { "EXPLAIN" };
        let sql = format!("{} {}", prefix, query);

        // Sent over the text protocol; EXPLAIN cannot always be prepared.
        let rows = sqlx::raw_sql(&sql).fetch_all(&self.pool).await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let data: Vec<Vec<String>> = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| cell_text(row, i)).collect())
            .collect();

        Ok(QueryResult::new(columns, data))
    }
}

fn cell_text(row: &MySqlRow, index: usize) -> String {
    decode_text::<String>(row, index)
        .or_else(|| decode_text::<rust_decimal::Decimal>(row, index))
        .or_else(|| decode_text::<i64>(row, index))
        .or_else(|| decode_text::<u64>(row, index))
        .or_else(|| decode_text::<f64>(row, index))
        .or_else(|| decode_text::<bool>(row, index))
        .or_else(|| decode_text::<chrono::NaiveDateTime>(row, index))
        .or_else(|| decode_text::<chrono::NaiveDate>(row, index))
        .or_else(|| decode_text::<chrono::NaiveTime>(row, index))
        .or_else(|| decode_text::<serde_json::Value>(row, index))
        .unwrap_or_else(|| {
            let type_name = row.columns()[index].type_info().name();
            format!("<{}>", type_name.to_lowercase())
        })
}

fn decode_text<T>(row: &MySqlRow, index: usize) -> Option<String>
where
    T: for<'r> Decode<'r, MySql> + Type<MySql> + ToString,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(value)) => Some(value.to_string()),
        Ok(None) => Some(NULL_TEXT.to_string()),
        Err(_) => None,
    }
}
