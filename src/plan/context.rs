use std::collections::BTreeMap;

use crate::models::schema::{ColumnInfo, TableSchema};

/// Describes `current` and the tables it references for the AI prompt.
pub fn format_schema_context(
    current: &TableSchema,
    related: &BTreeMap<String, TableSchema>,
) -> String {
    let mut out = format!("## Current Table: {}\n\n", current.table_name);

    out.push_str("### Columns\n");
    for column in &current.columns {
        out.push_str(&column_line(column, true));
    }

    if !current.foreign_keys.is_empty() {
        out.push_str("\n### Foreign Keys\n");
        for fk in &current.foreign_keys {
            out.push_str(&format!(
                "- {}.{} → {}.{} (constraint: {})\n",
                current.table_name, fk.column, fk.foreign_table, fk.foreign_column, fk.constraint_name
            ));
        }
    }

    if !related.is_empty() {
        out.push_str("\n## Related Tables (via Foreign Keys)\n");
        for (name, schema) in related {
            out.push_str(&format!("\n### {}\nColumns:\n", name));
            for column in &schema.columns {
                out.push_str(&column_line(column, false));
            }
        }
    }

    out
}

fn column_line(column: &ColumnInfo, with_default: bool) -> String {
    let nullable = if column.is_nullable { "NULL" } else { "NOT NULL" };
    let pk = if column.is_primary_key { " [PK]" } else { "" };
    let default = match &column.default {
        Some(expr) if with_default && !expr.is_empty() => format!(" DEFAULT {}", expr),
        _ => String::new(),
    };
    format!(
        "- {} {} {}{}{}\n",
        column.name, column.data_type, nullable, pk, default
    )
}
