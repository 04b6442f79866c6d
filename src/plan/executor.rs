use log::{info, warn};

use crate::{
    db::DbClient,
    errors::SessionError,
    models::results::{PaginationState, QueryResult},
};

use super::coordinator::PreparedQuery;

/// One page of plan output together with its position in the full result.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub result: QueryResult,
    pub pagination: PaginationState,
}

/// Runs the data query, then the count query built from the same plan.
pub async fn run_prepared(
    client: &(dyn DbClient + Send + Sync),
    query: &PreparedQuery,
) -> Result<PageResult, SessionError> {
    let result = client
        .query(&query.sql)
        .await
        .map_err(|source| SessionError::Execution {
            sql: query.sql.clone(),
            source,
        })?;

    let total = match &query.count_sql {
        Some(count_sql) => fetch_total(client, count_sql).await,
        None => None,
    };

    let pagination = PaginationState {
        page: query.plan.page,
        limit: query.plan.limit,
        total,
        rows_on_page: result.row_count,
    };
    info!("Fetched {} rows, {}", result.row_count, pagination.status());

    Ok(PageResult { result, pagination })
}

/// Executes mutation SQL the operator has confirmed.
pub async fn run_confirmed(
    client: &(dyn DbClient + Send + Sync),
    sql: &str,
) -> Result<u64, SessionError> {
    let affected = client
        .execute(sql)
        .await
        .map_err(|source| SessionError::Execution {
            sql: sql.to_string(),
            source,
        })?;
    info!("Confirmed statement affected {} rows", affected);
    Ok(affected)
}

async fn fetch_total(client: &(dyn DbClient + Send + Sync), count_sql: &str) -> Option<i64> {
    match client.query(count_sql).await {
        Ok(result) => {
            let total = result.scalar().and_then(|value| value.trim().parse().ok());
            if total.is_none() {
                warn!("Count query returned no number: {:?}", result.rows);
            }
            total
        }
        Err(e) => {
            warn!("Count query failed: {}", e);
            None
        }
    }
}
