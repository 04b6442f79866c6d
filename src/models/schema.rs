use serde::{Deserialize, Serialize};

/// Constraint name recorded for relationships inferred from column names.
pub const IMPLICIT_CONSTRAINT: &str = "(implicit)";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub is_primary_key: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub table_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

impl ForeignKeyInfo {
    /// An `<x>_id → <x>.id` relationship with no backing constraint.
    pub fn implicit(column: impl Into<String>, foreign_table: impl Into<String>) -> Self {
        Self {
            constraint_name: IMPLICIT_CONSTRAINT.to_string(),
            column: column.into(),
            foreign_table: foreign_table.into(),
            foreign_column: "id".to_string(),
        }
    }

    pub fn is_implicit(&self) -> bool {
        self.constraint_name == IMPLICIT_CONSTRAINT
    }
}
