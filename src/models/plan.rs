//! The JSON query plan produced by the AI collaborator.

use std::fmt;

use serde::{
    de::{self, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::Value;

pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Shown instead of a summary when the plan gave up on the available tables.
pub const NEED_OTHER_TABLES_MESSAGE: &str =
    "Cannot satisfy this query with the current table and its related tables.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Select,
    Update,
    Delete,
    Insert,
    /// Anything else the collaborator asked for. Rejected at compile time.
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Select => "select",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Insert => "insert",
            Action::Other(name) => name,
        }
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "select" => Action::Select,
            "update" => Action::Update,
            "delete" => Action::Delete,
            "insert" => Action::Insert,
            _ => Action::Other(value.trim().to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().map(Action::from).unwrap_or_default())
    }
}

impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSort {
    #[serde(deserialize_with = "nullable")]
    pub column: String,
    /// `asc` or `desc`; anything else sorts ascending.
    #[serde(deserialize_with = "nullable")]
    pub order: String,
}

impl PlanSort {
    pub fn direction(&self) -> &'static str {
        if self.order.trim().eq_ignore_ascii_case("desc") {
            "DESC"
        } else {
            "ASC"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Plan {
    #[serde(deserialize_with = "nullable")]
    pub tables: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub joins: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub filters: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub select: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub limit: i64,
    #[serde(deserialize_with = "nullable")]
    pub page: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<PlanSort>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "is_false")]
    pub need_other_tables: bool,
    pub action: Action,
    /// Column/value assignments in the order the collaborator wrote them.
    #[serde(
        deserialize_with = "ordered_assignments",
        serialize_with = "serialize_assignments",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub update_set: Vec<(String, String)>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub insert_columns: Vec<String>,
    #[serde(
        deserialize_with = "fragment_rows",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub insert_values: Vec<Vec<String>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Plan {
    /// Restores the `limit > 0` and `page >= 1` invariants.
    pub fn apply_defaults(&mut self) {
        if self.limit <= 0 {
            self.limit = DEFAULT_PAGE_SIZE;
        }
        if self.page <= 0 {
            self.page = 1;
        }
    }

    pub fn anchor_table(&self) -> Option<&str> {
        self.tables.first().map(String::as_str)
    }

    /// Only plain SELECT plans may run without operator confirmation.
    pub fn is_read_only(&self) -> bool {
        self.action == Action::Select
    }

    pub fn summary(&self) -> String {
        if self.need_other_tables {
            return NEED_OTHER_TABLES_MESSAGE.to_string();
        }
        if !self.description.trim().is_empty() {
            return self.description.clone();
        }

        let mut summary = format!(
            "{} on {}",
            self.action.as_str().to_uppercase(),
            self.tables.join(", ")
        );
        if !self.filters.is_empty() {
            summary.push_str(" where ");
            summary.push_str(&self.filters.join(" and "));
        }
        if let Some(sort) = &self.sort {
            summary.push_str(&format!(
                " order by {} {}",
                sort.column,
                sort.direction().to_lowercase()
            ));
        }
        if self.limit > 0 {
            summary.push_str(&format!(" (limit {}, page {})", self.limit, self.page));
        }
        summary
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Treats an explicit JSON `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A scalar SQL value as written by the collaborator. Numbers and booleans
/// are kept verbatim, `null` becomes `NULL`.
struct Fragment(String);

impl<'de> Deserialize<'de> for Fragment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(Fragment(text)),
            Value::Number(number) => Ok(Fragment(number.to_string())),
            Value::Bool(flag) => Ok(Fragment(flag.to_string())),
            Value::Null => Ok(Fragment("NULL".to_string())),
            other => Err(de::Error::custom(format!(
                "expected a SQL value, found {other}"
            ))),
        }
    }
}

fn ordered_assignments<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct AssignmentsVisitor;

    impl<'de> Visitor<'de> for AssignmentsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object mapping columns to values")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((column, Fragment(value))) = map.next_entry::<String, Fragment>()? {
                pairs.push((column, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_any(AssignmentsVisitor)
}

#[allow(clippy::ptr_arg)]
fn serialize_assignments<S>(pairs: &Vec<(String, String)>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(pairs.iter().map(|(column, value)| (column, value)))
}

fn fragment_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Option::<Vec<Vec<Fragment>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(|Fragment(value)| value).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn plan_from(value: serde_json::Value) -> Plan {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_fields_use_zero_values() {
        let plan = plan_from(json!({ "tables": ["t"] }));
        assert_eq!(plan.tables, vec!["t"]);
        assert!(plan.joins.is_empty());
        assert_eq!(plan.limit, 0);
        assert_eq!(plan.action, Action::Select);
        assert_eq!(plan.sort, None);
    }

    #[test]
    fn test_null_fields_are_tolerated() {
        let plan = plan_from(json!({
            "tables": ["t"],
            "joins": null,
            "filters": null,
            "limit": null,
            "action": null,
            "update_set": null,
            "insert_values": null
        }));
        assert!(plan.joins.is_empty());
        assert!(plan.filters.is_empty());
        assert!(plan.update_set.is_empty());
        assert!(plan.insert_values.is_empty());
        assert_eq!(plan.action, Action::Select);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(Action::from("UPDATE"), Action::Update);
        assert_eq!(Action::from(" delete "), Action::Delete);
        assert_eq!(Action::from(""), Action::Select);
        assert_eq!(Action::from("ddl"), Action::Other("ddl".to_string()));

        let plan = plan_from(json!({ "tables": ["t"], "action": "drop" }));
        assert_eq!(plan.action, Action::Other("drop".to_string()));
    }

    #[test]
    fn test_update_set_keeps_document_order() {
        let raw = r#"{"tables":["users"],"action":"update",
            "update_set":{"status":"'active'","score":10,"verified":true,"note":null,"age":3}}"#;
        let plan: Plan = serde_json::from_str(raw).unwrap();
        assert_eq!(
            plan.update_set,
            vec![
                ("status".to_string(), "'active'".to_string()),
                ("score".to_string(), "10".to_string()),
                ("verified".to_string(), "true".to_string()),
                ("note".to_string(), "NULL".to_string()),
                ("age".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_insert_values_accept_scalars() {
        let plan = plan_from(json!({
            "tables": ["users"],
            "action": "insert",
            "insert_columns": ["name", "age"],
            "insert_values": [["'Alice'", 30], ["'Bob'", null]]
        }));
        assert_eq!(
            plan.insert_values,
            vec![
                vec!["'Alice'".to_string(), "30".to_string()],
                vec!["'Bob'".to_string(), "NULL".to_string()],
            ]
        );
    }

    #[test]
    fn test_nested_update_value_is_rejected() {
        let result = serde_json::from_value::<Plan>(json!({
            "tables": ["users"],
            "update_set": { "tags": ["a"] }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_is_read_only() {
        let mut plan = Plan::default();
        assert!(plan.is_read_only());
        for action in ["update", "delete", "insert"] {
            plan.action = Action::from(action);
            assert!(!plan.is_read_only(), "{action} must need review");
        }
        plan.action = Action::from("select");
        assert!(plan.is_read_only());
    }

    #[test]
    fn test_summary() {
        let mut plan = plan_from(json!({
            "tables": ["company", "country"],
            "filters": ["country.name = 'China'", "company.size > 10"],
            "sort": { "column": "company.name", "order": "DESC" },
            "limit": 10,
            "page": 2
        }));
        assert_eq!(
            plan.summary(),
            "SELECT on company, country where country.name = 'China' and company.size > 10 \
             order by company.name desc (limit 10, page 2)"
        );

        plan.description = "Chinese companies by name".to_string();
        assert_eq!(plan.summary(), "Chinese companies by name");

        plan.need_other_tables = true;
        assert_eq!(plan.summary(), NEED_OTHER_TABLES_MESSAGE);
    }

    #[test]
    fn test_sort_direction() {
        let sort = |order: &str| PlanSort {
            column: "c".to_string(),
            order: order.to_string(),
        };
        assert_eq!(sort("desc").direction(), "DESC");
        assert_eq!(sort("DESC ").direction(), "DESC");
        assert_eq!(sort("asc").direction(), "ASC");
        assert_eq!(sort("").direction(), "ASC");
        assert_eq!(sort("random").direction(), "ASC");
    }

    #[test]
    fn test_serialize_skips_empty_mutation_fields() {
        let plan = plan_from(json!({ "tables": ["t"], "limit": 5, "page": 1 }));
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["action"], "select");
        assert!(value.get("update_set").is_none());
        assert!(value.get("need_other_tables").is_none());
    }
}
