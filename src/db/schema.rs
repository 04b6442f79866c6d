use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use log::{debug, warn};

use crate::{
    errors::DbError,
    models::schema::{ColumnInfo, ForeignKeyInfo, TableSchema},
};

use super::DbClient;

pub struct SchemaResolver<'a> {
    client: &'a (dyn DbClient + Send + Sync),
}

impl<'a> SchemaResolver<'a> {
    pub fn new(client: &'a (dyn DbClient + Send + Sync)) -> Self {
        Self { client }
    }

    /// When the catalog declares no foreign keys, `<x>_id` columns pointing at
    /// an existing table `<x>` are reported as implicit keys instead.
    pub async fn fetch_schema(&self, table_name: &str) -> Result<TableSchema, DbError> {
        let columns = self.client.describe_columns(table_name).await?;
        let mut foreign_keys = self.client.describe_foreign_keys(table_name).await?;

        if foreign_keys.is_empty() {
            foreign_keys = self.detect_implicit_foreign_keys(&columns).await;
        }

        Ok(TableSchema {
            table_name: table_name.to_string(),
            columns,
            foreign_keys,
        })
    }

    pub async fn detect_implicit_foreign_keys(&self, columns: &[ColumnInfo]) -> Vec<ForeignKeyInfo> {
        let mut foreign_keys = Vec::new();

        for column in columns.iter().filter(|c| !c.is_primary_key) {
            let Some(target) = column.name.strip_suffix("_id") else {
                continue;
            };
            if target.is_empty() {
                continue;
            }

            match self.client.table_exists(target).await {
                Ok(true) => foreign_keys.push(ForeignKeyInfo::implicit(&column.name, target)),
                Ok(false) => {}
                Err(e) => debug!("Skipping implicit key {}: {}", column.name, e),
            }
        }

        foreign_keys
    }

    /// Tables that cannot be described are left out of the result.
    pub async fn fetch_related_schemas(&self, main: &TableSchema) -> BTreeMap<String, TableSchema> {
        let targets: BTreeSet<&str> = main
            .foreign_keys
            .iter()
            .map(|fk| fk.foreign_table.as_str())
            .collect();

        let lookups = targets.into_iter().map(|table| async move {
            (table, self.fetch_schema(table).await)
        });

        let mut related = BTreeMap::new();
        for (table, result) in join_all(lookups).await {
            match result {
                Ok(schema) => {
                    related.insert(table.to_string(), schema);
                }
                Err(e) => warn!("Skipping related table {}: {}", table, e),
            }
        }
        related
    }
}
