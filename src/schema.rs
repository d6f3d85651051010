//! Schema snapshot used to ground SQL generation
//!
//! A snapshot is introspected once at startup and then shared read-only
//! between every pipeline run. `to_prompt` renders the text fragment that is
//! embedded in the SQL generation prompt.

use serde::Serialize;
use std::fmt::Write;

/// Column metadata as reported by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Foreign key; column lists are positionally paired
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeySchema {
    pub constrained_columns: Vec<String>,
    pub referred_table: String,
    pub referred_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub foreign_keys: Vec<ForeignKeySchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }
}

/// All base tables of the connected database, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSchema>,
}

impl SchemaSnapshot {
    pub fn new(mut tables: Vec<TableSchema>) -> Self {
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Render the snapshot as the `DATABASE SCHEMA:` block of the SQL prompt
    ///
    /// ```text
    /// DATABASE SCHEMA:
    /// - orders: id (INTEGER), user_id (INTEGER)
    ///   Foreign keys: (user_id) -> users(id)
    /// ```
    pub fn to_prompt(&self) -> String {
        let mut text = String::from("DATABASE SCHEMA:\n");

        for table in &self.tables {
            let columns = table
                .columns
                .iter()
                .map(|c| format!("{} ({})", c.name, c.data_type))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(text, "- {}: {}", table.name, columns);

            if !table.foreign_keys.is_empty() {
                let keys = table
                    .foreign_keys
                    .iter()
                    .map(|fk| {
                        format!(
                            "({}) -> {}({})",
                            fk.constrained_columns.join(", "),
                            fk.referred_table,
                            fk.referred_columns.join(", ")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(text, "  Foreign keys: {keys}");
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            default: None,
        }
    }

    fn sample() -> SchemaSnapshot {
        let mut users = TableSchema::new("users");
        users.columns = vec![column("id", "INTEGER"), column("email", "TEXT")];

        let mut orders = TableSchema::new("orders");
        orders.columns = vec![
            column("id", "INTEGER"),
            column("user_id", "INTEGER"),
            column("total", "REAL"),
        ];
        orders.foreign_keys = vec![ForeignKeySchema {
            constrained_columns: vec!["user_id".to_string()],
            referred_table: "users".to_string(),
            referred_columns: vec!["id".to_string()],
        }];

        SchemaSnapshot::new(vec![users, orders])
    }

    #[test]
    fn test_tables_sorted_by_name() {
        let snapshot = sample();
        let names: Vec<&str> = snapshot.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "users"]);
    }

    #[test]
    fn test_prompt_rendering() {
        let expected = "DATABASE SCHEMA:\n\
            - orders: id (INTEGER), user_id (INTEGER), total (REAL)\n  \
            Foreign keys: (user_id) -> users(id)\n\
            - users: id (INTEGER), email (TEXT)\n";
        assert_eq!(sample().to_prompt(), expected);
    }

    #[test]
    fn test_composite_foreign_key() {
        let mut line_items = TableSchema::new("line_items");
        line_items.columns = vec![column("order_id", "INT"), column("line_no", "INT")];
        line_items.foreign_keys = vec![ForeignKeySchema {
            constrained_columns: vec!["order_id".to_string(), "line_no".to_string()],
            referred_table: "order_lines".to_string(),
            referred_columns: vec!["order_id".to_string(), "position".to_string()],
        }];

        let text = SchemaSnapshot::new(vec![line_items]).to_prompt();
        assert!(text.contains("(order_id, line_no) -> order_lines(order_id, position)"));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = SchemaSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.to_prompt(), "DATABASE SCHEMA:\n");
    }
}
