const QUERY_PLAN_INSTRUCTIONS: &str = r#"You translate questions about a relational database into a JSON query plan.
Never write SQL. Reply with exactly one JSON object inside a ```json fenced block.

Plan fields:
- "tables": tables involved, the current table first
- "joins": join conditions such as "company.country_id = country.id"; each must name the joined table with its "table." prefix
- "filters": WHERE conditions, combined with AND, e.g. "country.name = 'China'"
- "select": columns to return, qualified with their table; omit for all columns
- "limit": rows per page (default 20)
- "page": 1-based page number
- "sort": {"column": "table.column", "order": "asc" | "desc"}
- "action": "select", "update", "delete" or "insert"
- "update_set": {"column": "value"} for updates
- "insert_columns" and "insert_values" for inserts, one array per row
- "description": one short sentence describing the query
- "need_other_tables": true when the question cannot be answered from the current table and its related tables

Rules:
- Only use the tables and columns listed in the schema.
- Quote string literals with single quotes inside filters and values.
- Join only along the foreign keys shown in the schema.
- Keep the page, limit and sort from the data view state unless the question changes them."#;

/// The full prompt sent to the text generator for a plan request.
pub fn query_plan_prompt(schema_context: &str, data_view_state: &str, question: &str) -> String {
    format!(
        "{}\n\nSchema:\n{}\n\nData view state:\n{}\n\nUser question: {}",
        QUERY_PLAN_INSTRUCTIONS, schema_context, data_view_state, question
    )
}
