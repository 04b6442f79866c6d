//! Turns a [`Plan`] into SQL text. Nothing here touches the database.

use crate::{
    errors::PlanError,
    models::plan::{Action, Plan},
};

pub fn compile(plan: &Plan) -> Result<String, PlanError> {
    if plan.need_other_tables {
        return Err(PlanError::NeedOtherTables);
    }

    match &plan.action {
        Action::Select => compile_select(plan),
        Action::Update => compile_update(plan),
        Action::Delete => compile_delete(plan),
        Action::Insert => compile_insert(plan),
        Action::Other(name) => Err(PlanError::UnsupportedAction(name.clone())),
    }
}

/// `SELECT count(*)` over the same FROM, JOIN and WHERE clauses as the
/// select query. `None` when the plan names no tables.
pub fn compile_count(plan: &Plan) -> Option<String> {
    let from = from_clause(plan)?;
    Some(format!("SELECT count(*) FROM {}{}", from, where_clause(plan)))
}

/// The anchor table followed by one JOIN line per additional table.
///
/// A table is joined on the first condition that mentions `<table>.`, and
/// cross joined when no condition does.
pub fn from_clause(plan: &Plan) -> Option<String> {
    let (anchor, others) = plan.tables.split_first()?;

    let mut from = anchor.clone();
    for table in others {
        let qualifier = format!("{}.", table);
        match plan.joins.iter().find(|j| j.contains(&qualifier)) {
            Some(condition) => from.push_str(&format!("\nJOIN {} ON {}", table, condition)),
            None => from.push_str(&format!("\nCROSS JOIN {}", table)),
        }
    }
    Some(from)
}

/// Newline-prefixed WHERE clause, empty when there are no filters.
pub fn where_clause(plan: &Plan) -> String {
    if plan.filters.is_empty() {
        return String::new();
    }
    format!("\nWHERE {}", plan.filters.join("\n  AND "))
}

fn compile_select(plan: &Plan) -> Result<String, PlanError> {
    let from = from_clause(plan).ok_or(PlanError::MissingTables("select"))?;

    let columns = if plan.select.iter().all(|c| c.trim().is_empty()) {
        "*".to_string()
    } else {
        plan.select.join(", ")
    };

    let mut sql = format!("SELECT {}\nFROM {}{}", columns, from, where_clause(plan));

    if let Some(sort) = plan.sort.as_ref().filter(|s| !s.column.trim().is_empty()) {
        sql.push_str(&format!("\nORDER BY {} {}", sort.column, sort.direction()));
    }

    sql.push_str(&format!("\nLIMIT {}", plan.limit));
    if plan.page > 1 {
        let offset = (plan.page - 1)
            .checked_mul(plan.limit)
            .ok_or(PlanError::PageOutOfRange {
                page: plan.page,
                limit: plan.limit,
            })?;
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    Ok(sql)
}

fn compile_update(plan: &Plan) -> Result<String, PlanError> {
    let table = plan.anchor_table().ok_or(PlanError::MissingTables("update"))?;
    if plan.update_set.is_empty() {
        return Err(PlanError::EmptyUpdateSet);
    }

    let assignments: Vec<String> = plan
        .update_set
        .iter()
        .map(|(column, value)| format!("{} = {}", column, value))
        .collect();

    Ok(format!(
        "UPDATE {}\nSET {}{}",
        table,
        assignments.join(", "),
        where_clause(plan)
    ))
}

fn compile_delete(plan: &Plan) -> Result<String, PlanError> {
    let table = plan.anchor_table().ok_or(PlanError::MissingTables("delete"))?;
    Ok(format!("DELETE FROM {}{}", table, where_clause(plan)))
}

fn compile_insert(plan: &Plan) -> Result<String, PlanError> {
    let table = plan.anchor_table().ok_or(PlanError::MissingTables("insert"))?;
    if plan.insert_columns.is_empty() || plan.insert_values.is_empty() {
        return Err(PlanError::EmptyInsert);
    }

    let rows: Vec<String> = plan
        .insert_values
        .iter()
        .map(|row| format!("({})", row.join(", ")))
        .collect();

    Ok(format!(
        "INSERT INTO {} ({})\nVALUES {}",
        table,
        plan.insert_columns.join(", "),
        rows.join(",\n       ")
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::plan::PlanSort;

    fn plan_from(value: serde_json::Value) -> Plan {
        let mut plan: Plan = serde_json::from_value(value).unwrap();
        plan.apply_defaults();
        plan
    }

    fn company_plan() -> Plan {
        plan_from(json!({
            "tables": ["company", "country"],
            "joins": ["company.country_id = country.id"],
            "filters": ["country.name = 'China'"],
            "limit": 10,
            "page": 1,
            "sort": { "column": "company.name", "order": "asc" }
        }))
    }

    /// Everything between FROM and the first ORDER BY / LIMIT line.
    fn shared_clauses(sql: &str) -> &str {
        let start = sql.find("FROM ").unwrap();
        let rest = &sql[start..];
        let end = ["\nORDER BY", "\nLIMIT"]
            .iter()
            .filter_map(|marker| rest.find(marker))
            .min()
            .unwrap_or(rest.len());
        &rest[..end]
    }

    #[test]
    fn test_company_country_select() {
        let sql = compile(&company_plan()).unwrap();
        assert_eq!(
            sql,
            "SELECT *\n\
             FROM company\n\
             JOIN country ON company.country_id = country.id\n\
             WHERE country.name = 'China'\n\
             ORDER BY company.name ASC\n\
             LIMIT 10"
        );
        assert_eq!(sql.matches("JOIN").count(), 1);
        assert!(!sql.contains("OFFSET"));
    }

    #[test]
    fn test_next_page_changes_only_offset() {
        let mut plan = company_plan();
        let first = compile(&plan).unwrap();
        plan.page += 1;
        let second = compile(&plan).unwrap();

        assert!(second.ends_with("LIMIT 10 OFFSET 10"));
        assert_eq!(second.replace(" OFFSET 10", ""), first);
    }

    #[test]
    fn test_offset_from_page() {
        let mut plan = plan_from(json!({ "tables": ["t"], "page": 3 }));
        assert!(compile(&plan).unwrap().ends_with("LIMIT 20 OFFSET 40"));

        plan.page = 1;
        assert!(compile(&plan).unwrap().ends_with("LIMIT 20"));
    }

    #[test]
    fn test_huge_page_is_rejected() {
        let plan = plan_from(json!({ "tables": ["t"], "limit": 20, "page": 1_000_000_000_000_000_000i64 }));
        assert!(matches!(
            compile(&plan),
            Err(PlanError::PageOutOfRange { limit: 20, .. })
        ));

        let plan = plan_from(json!({ "tables": ["t"], "limit": 1, "page": i64::MAX }));
        assert!(compile(&plan)
            .unwrap()
            .ends_with(&format!("LIMIT 1 OFFSET {}", i64::MAX - 1)));
    }

    #[test]
    fn test_join_or_cross_join() {
        let mut plan = plan_from(json!({
            "tables": ["a", "b"],
            "joins": ["a.b_id = b.id"]
        }));
        let from = from_clause(&plan).unwrap();
        assert_eq!(from, "a\nJOIN b ON a.b_id = b.id");

        plan.joins = vec!["a.c_id = c.id".to_string()];
        assert_eq!(from_clause(&plan).unwrap(), "a\nCROSS JOIN b");
    }

    #[test]
    fn test_every_declared_table_appears() {
        let plan = plan_from(json!({
            "tables": ["orders", "customer", "product", "region"],
            "joins": ["orders.product_id = product.id", "orders.customer_id = customer.id"]
        }));
        let from = from_clause(&plan).unwrap();
        assert_eq!(
            from,
            "orders\n\
             JOIN customer ON orders.customer_id = customer.id\n\
             JOIN product ON orders.product_id = product.id\n\
             CROSS JOIN region"
        );
    }

    #[test]
    fn test_count_mirrors_select() {
        let plans = [
            company_plan(),
            plan_from(json!({ "tables": ["a", "b", "c"], "joins": ["a.id = c.a_id"], "page": 4 })),
            plan_from(json!({ "tables": ["solo"], "filters": ["x > 1", "y < 2"] })),
        ];

        for plan in &plans {
            let select = compile(plan).unwrap();
            let count = compile_count(plan).unwrap();
            assert!(count.starts_with("SELECT count(*) FROM "));
            assert_eq!(shared_clauses(&select), shared_clauses(&count));
            assert!(!count.contains("LIMIT"));
            assert!(!count.contains("ORDER BY"));
        }
    }

    #[test]
    fn test_count_without_tables() {
        assert_eq!(compile_count(&Plan::default()), None);
    }

    #[test]
    fn test_select_columns_and_sort() {
        let mut plan = plan_from(json!({
            "tables": ["company"],
            "select": ["company.id", "company.name"],
            "sort": { "column": "company.id", "order": "desc" }
        }));
        let sql = compile(&plan).unwrap();
        assert!(sql.starts_with("SELECT company.id, company.name\nFROM company"));
        assert!(sql.contains("\nORDER BY company.id DESC\n"));

        plan.sort = Some(PlanSort {
            column: " ".to_string(),
            order: "desc".to_string(),
        });
        plan.select = vec![String::new()];
        let sql = compile(&plan).unwrap();
        assert!(sql.starts_with("SELECT *"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_multiple_filters_are_and_combined() {
        let plan = plan_from(json!({ "tables": ["t"], "filters": ["a = 1", "b = 2"] }));
        assert!(compile(&plan)
            .unwrap()
            .contains("\nWHERE a = 1\n  AND b = 2\n"));
    }

    #[test]
    fn test_update() {
        let plan: Plan = serde_json::from_str(
            r#"{"tables":["users"],"action":"update",
                "update_set":{"status":"'inactive'","score":0},
                "filters":["users.id = 7"]}"#,
        )
        .unwrap();
        assert_eq!(
            compile(&plan).unwrap(),
            "UPDATE users\nSET status = 'inactive', score = 0\nWHERE users.id = 7"
        );
    }

    #[test]
    fn test_update_requires_tables_and_values() {
        let plan = plan_from(json!({ "action": "update", "update_set": { "a": "1" } }));
        assert!(matches!(compile(&plan), Err(PlanError::MissingTables("update"))));

        let plan = plan_from(json!({ "tables": ["t"], "action": "update" }));
        assert!(matches!(compile(&plan), Err(PlanError::EmptyUpdateSet)));
    }

    #[test]
    fn test_delete() {
        let plan = plan_from(json!({
            "tables": ["users"],
            "action": "delete",
            "filters": ["users.last_login < '2020-01-01'"]
        }));
        assert_eq!(
            compile(&plan).unwrap(),
            "DELETE FROM users\nWHERE users.last_login < '2020-01-01'"
        );

        let plan = plan_from(json!({ "action": "delete" }));
        assert!(matches!(compile(&plan), Err(PlanError::MissingTables("delete"))));
    }

    #[test]
    fn test_insert() {
        let plan = plan_from(json!({
            "tables": ["users"],
            "action": "insert",
            "insert_columns": ["name", "age"],
            "insert_values": [["'Alice'", "30"], ["'Bob'", "25"]]
        }));
        assert_eq!(
            compile(&plan).unwrap(),
            "INSERT INTO users (name, age)\nVALUES ('Alice', 30),\n       ('Bob', 25)"
        );
    }

    #[test]
    fn test_insert_requires_columns_and_values() {
        let plan = plan_from(json!({
            "tables": ["users"],
            "action": "insert",
            "insert_columns": ["name"]
        }));
        assert!(matches!(compile(&plan), Err(PlanError::EmptyInsert)));

        let plan = plan_from(json!({
            "action": "insert",
            "insert_columns": ["name"],
            "insert_values": [["'x'"]]
        }));
        assert!(matches!(compile(&plan), Err(PlanError::MissingTables("insert"))));
    }

    #[test]
    fn test_unknown_action_and_escape_flag() {
        let plan = plan_from(json!({ "tables": ["t"], "action": "ddl" }));
        assert!(matches!(
            compile(&plan),
            Err(PlanError::UnsupportedAction(name)) if name == "ddl"
        ));

        let plan = plan_from(json!({ "tables": ["t"], "need_other_tables": true }));
        assert!(matches!(compile(&plan), Err(PlanError::NeedOtherTables)));
    }

    #[test]
    fn test_select_without_tables() {
        let plan = plan_from(json!({ "select": ["1"] }));
        assert!(matches!(compile(&plan), Err(PlanError::MissingTables("select"))));
    }
}
