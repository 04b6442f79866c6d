use async_trait::async_trait;
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteRow},
    Column, Decode, Executor, Row, Sqlite, SqlitePool, Type, TypeInfo,
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
    SELECT name, type AS data_type, "notnull" AS not_null, dflt_value, pk
    FROM pragma_table_info(?1)
    ORDER BY cid
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT id, "from" AS column_name, "table" AS foreign_table, "to" AS foreign_column
    FROM pragma_foreign_key_list(?1)
    ORDER BY id, seq
"#;

pub struct SqliteClient {
    pub pool: SqlitePool,
}

impl SqliteClient {
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        // Every connection to `:memory:` opens a separate database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn primary_key_column(&self, table_name: &str) -> Result<Option<String>, DbError> {
        let columns = self.describe_columns(table_name).await?;
        Ok(columns
            .into_iter()
            .find(|c| c.is_primary_key)
            .map(|c| c.name))
    }
}

#[async_trait]
impl DbClient for SqliteClient {
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
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(DbError::Sqlx))
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
                    name: row.try_get("name")?,
                    data_type: row.try_get("data_type")?,
                    is_nullable: row.try_get::<i64, _>("not_null")? == 0,
                    default: row.try_get("dflt_value")?,
                    // `pk` is the column's position in the key, zero when not part of it.
                    is_primary_key: row.try_get::<i64, _>("pk")? > 0,
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

        let mut foreign_keys = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let foreign_table: String = row.try_get("foreign_table")?;
            // `REFERENCES t` without a column list targets the primary key.
            let foreign_column = match row.try_get::<Option<String>, _>("foreign_column")? {
                Some(column) => column,
                None => self
                    .primary_key_column(&foreign_table)
                    .await?
                    .unwrap_or_else(|| "rowid".to_string()),
            };

            foreign_keys.push(ForeignKeyInfo {
                // SQLite does not expose constraint names.
                constraint_name: format!("fk_{}_{}", table_name, id),
                column: row.try_get("column_name")?,
                foreign_table,
                foreign_column,
            });
        }

        Ok(foreign_keys)
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool, DbError> {
        let query = "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";
        let count = sqlx::query_scalar::<_, i64>(query)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn list_views(&self) -> Result<Vec<String>, DbError> {
        let query = "SELECT name FROM sqlite_master WHERE type = 'view' ORDER BY name";
        let views = sqlx::query_scalar::<_, String>(query)
            .fetch_all(&self.pool)
            .await?;
        Ok(views)
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, DbError> {
        let query = r#"
            SELECT name, tbl_name
            FROM sqlite_master
            WHERE type = 'index'
            ORDER BY name
        "#;
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<IndexInfo, DbError> {
                Ok(IndexInfo {
                    name: row.try_get("name")?,
                    table_name: row.try_get("tbl_name")?,
                })
            })
            .collect()
    }

    async fn explain(&self, query: &str, analyze: bool) -> Result<QueryResult, DbError> {
        if analyze {
            return Err(DbError::Unsupported("EXPLAIN ANALYZE"));
        }
        self.query(&format!("EXPLAIN QUERY PLAN {}", query)).await
    }
}

fn cell_text(row: &SqliteRow, index: usize) -> String {
    decode_text::<String>(row, index)
        .or_else(|| decode_text::<i64>(row, index))
        .or_else(|| decode_text::<f64>(row, index))
        .or_else(|| decode_text::<bool>(row, index))
        .or_else(|| decode_text::<chrono::NaiveDateTime>(row, index))
        .unwrap_or_else(|| {
            let type_name = row.columns()[index].type_info().name();
            format!("<{}>", type_name.to_lowercase())
        })
}

fn decode_text<T>(row: &SqliteRow, index: usize) -> Option<String>
where
    T: for<'r> Decode<'r, Sqlite> + Type<Sqlite> + ToString,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(value)) => Some(value.to_string()),
        Ok(None) => Some(NULL_TEXT.to_string()),
        Err(_) => None,
    }
}
