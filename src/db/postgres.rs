use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Column, Decode, Executor, PgPool, Postgres, Row, Type, TypeInfo,
};

use crate::{
    errors::DbError,
    models::{
        results::{QueryResult, NULL_TEXT},
        schema::{ColumnInfo, ForeignKeyInfo, IndexInfo},
    },
};

use super::DbClient;

const COLUMNS_QUERY: &str = r#"
    SELECT c.column_name::text AS column_name,
           c.data_type::text AS data_type,
           c.is_nullable::text AS is_nullable,
           c.column_default::text AS column_default,
           EXISTS (
               SELECT 1
               FROM information_schema.table_constraints tc
               JOIN information_schema.key_column_usage kcu
                 ON kcu.constraint_name = tc.constraint_name
                AND kcu.table_schema = tc.table_schema
                AND kcu.table_name = tc.table_name
               WHERE tc.constraint_type = 'PRIMARY KEY'
                 AND tc.table_schema = c.table_schema
                 AND tc.table_name = c.table_name
                 AND kcu.column_name = c.column_name
           ) AS is_primary_key
    FROM information_schema.columns c
    WHERE c.table_schema = $1 AND c.table_name = $2
    ORDER BY c.ordinal_position
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT tc.constraint_name::text AS constraint_name,
           kcu.column_name::text AS column_name,
           ccu.table_name::text AS foreign_table,
           ccu.column_name::text AS foreign_column
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_name = tc.constraint_name
     AND kcu.table_schema = tc.table_schema
    JOIN information_schema.constraint_column_usage ccu
      ON ccu.constraint_name = tc.constraint_name
     AND ccu.constraint_schema = tc.table_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
      AND tc.table_schema = $1
      AND tc.table_name = $2
    ORDER BY tc.constraint_name, kcu.ordinal_position
"#;

pub struct PostgresClient {
    pub pool: PgPool,
    /// Catalog schema used for introspection.
    pub schema: String,
}

impl PostgresClient {
    pub async fn connect(database_url: &str, schema: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }
}

#[async_trait]
impl DbClient for PostgresClient {
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
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;
        let rows = sqlx::query(query)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name").map_err(DbError::Sqlx))
            .collect()
    }

    async fn describe_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>, DbError> {
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(&self.schema)
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
                    is_primary_key: row.try_get("is_primary_key")?,
                })
            })
            .collect()
    }

    async fn describe_foreign_keys(
        &self,
        table_name: &str,
    ) -> Result<Vec<ForeignKeyInfo>, DbError> {
        let rows = sqlx::query(FOREIGN_KEYS_QUERY)
            .bind(&self.schema)
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
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
        "#;
        let exists = sqlx::query_scalar::<_, bool>(query)
            .bind(&self.schema)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn list_views(&self) -> Result<Vec<String>, DbError> {
        let query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'VIEW'
            ORDER BY table_name
        "#;
        let views = sqlx::query_scalar::<_, String>(query)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;
        Ok(views)
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, DbError> {
        let query = r#"
            SELECT indexname::text AS index_name, tablename::text AS table_name
            FROM pg_indexes
            WHERE schemaname = $1
            ORDER BY indexname
        "#;
        let rows = sqlx::query(query)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

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
        self.query(&format!("{} {}", prefix, query)).await
    }
}

fn cell_text(row: &PgRow, index: usize) -> String {
    let type_name = row.columns()[index].type_info().name().to_string();
    let text = match type_name.as_str() {
        "BOOL" => decode_text::<bool>(row, index),
        "INT2" => decode_text::<i16>(row, index),
        "INT4" => decode_text::<i32>(row, index),
        "INT8" => decode_text::<i64>(row, index),
        "FLOAT4" => decode_text::<f32>(row, index),
        "FLOAT8" => decode_text::<f64>(row, index),
        "NUMERIC" => decode_text::<rust_decimal::Decimal>(row, index),
        "UUID" => decode_text::<uuid::Uuid>(row, index),
        "DATE" => decode_text::<chrono::NaiveDate>(row, index),
        "TIME" => decode_text::<chrono::NaiveTime>(row, index),
        "TIMESTAMP" => decode_text::<chrono::NaiveDateTime>(row, index),
        "TIMESTAMPTZ" => decode_text::<chrono::DateTime<chrono::Utc>>(row, index),
        "JSON" | "JSONB" => decode_text::<serde_json::Value>(row, index),
        _ => decode_text::<String>(row, index),
    };
    // Types without a text decoding (BYTEA, arrays, NaN numerics) show their name.
    text.unwrap_or_else(|| format!("<{}>", type_name.to_lowercase()))
}

fn decode_text<T>(row: &PgRow, index: usize) -> Option<String>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres> + ToString,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(value)) => Some(value.to_string()),
        Ok(None) => Some(NULL_TEXT.to_string()),
        Err(_) => None,
    }
}
