//! SQLite implementation of the database abstraction layer
use crate::database::{
    CellValue, ConnectionInfo, DatabaseClient, DatabaseConfig, DatabaseError, Record,
    with_query_timeout,
};
use crate::schema::{ColumnSchema, ForeignKeySchema, SchemaSnapshot, TableSchema};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub struct SqliteClient {
    pool: SqlitePool,
    connection_info: ConnectionInfo,
    query_timeout: Duration,
}

impl SqliteClient {
    pub async fn new(
        connection_info: ConnectionInfo,
        config: &DatabaseConfig,
    ) -> Result<Self, DatabaseError> {
        debug!("[SqliteClient::new] Creating SQLite client");

        let file_path = connection_info.file_path.as_ref().ok_or_else(|| {
            DatabaseError::ConnectionError(
                "No file path provided for SQLite connection".to_string(),
            )
        })?;

        let read_only = connection_info
            .options
            .get("mode")
            .is_some_and(|mode| mode == "ro");

        let options = SqliteConnectOptions::new()
            .filename(file_path)
            .read_only(read_only)
            .foreign_keys(true);

        // Every connection to :memory: opens its own database, so keep exactly one alive
        let pool_options = if connection_info.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .idle_timeout(Duration::from_secs(600))
        };

        debug!("[SqliteClient::new] Connecting to: {}", file_path);

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool,
            connection_info,
            query_timeout: config.query_timeout(),
        })
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnSchema>, DatabaseError> {
        let query = format!("PRAGMA table_info({})", quote_identifier(table));
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::MetadataError(e.to_string()))?;

        let columns = rows
            .iter()
            .map(|row| {
                let not_null: i64 = row.try_get("notnull").unwrap_or(0);
                ColumnSchema {
                    name: row.get::<String, _>("name"),
                    data_type: row.try_get::<String, _>("type").unwrap_or_default(),
                    nullable: not_null == 0,
                    default: row.try_get::<Option<String>, _>("dflt_value").ok().flatten(),
                }
            })
            .collect();

        Ok(columns)
    }

    async fn table_foreign_keys(
        &self,
        table: &str,
    ) -> Result<Vec<ForeignKeySchema>, DatabaseError> {
        let query = format!("PRAGMA foreign_key_list({})", quote_identifier(table));
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::MetadataError(e.to_string()))?;

        // One row per column pair; rows sharing an id belong to the same constraint
        let mut grouped: BTreeMap<i64, ForeignKeySchema> = BTreeMap::new();
        for row in &rows {
            let id: i64 = row.get("id");
            let entry = grouped.entry(id).or_insert_with(|| ForeignKeySchema {
                constrained_columns: Vec::new(),
                referred_table: row.get::<String, _>("table"),
                referred_columns: Vec::new(),
            });
            entry.constrained_columns.push(row.get::<String, _>("from"));
            if let Some(to) = row.try_get::<Option<String>, _>("to").ok().flatten() {
                entry.referred_columns.push(to);
            }
        }

        Ok(grouped.into_values().collect())
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn execute_query(&self, sql: &str) -> Result<Vec<Record>, DatabaseError> {
        debug!("[SqliteClient::execute_query] Executing: {}", sql);

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;
        let rows = with_query_timeout(self.query_timeout, sqlx::query(sql).fetch_all(&mut *conn))
            .await?;
        drop(conn);

        let records = rows.iter().map(sqlite_row_to_record).collect::<Vec<_>>();
        debug!(
            "[SqliteClient::execute_query] Materialized {} rows",
            records.len()
        );
        Ok(records)
    }

    async fn introspect(&self) -> Result<SchemaSnapshot, DatabaseError> {
        debug!("[SqliteClient::introspect] Reading sqlite_master");

        let rows = sqlx::query(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::MetadataError(e.to_string()))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get("name");
            let mut table = TableSchema::new(name.clone());
            table.columns = self.table_columns(&name).await?;
            table.foreign_keys = self.table_foreign_keys(&name).await?;
            tables.push(table);
        }

        debug!("[SqliteClient::introspect] Found {} tables", tables.len());
        Ok(SchemaSnapshot::new(tables))
    }

    fn get_connection_info(&self) -> &ConnectionInfo {
        &self.connection_info
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sqlite_row_to_record(row: &SqliteRow) -> Record {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        record.push(column.name(), decode_sqlite_value(row, i));
    }
    record
}

fn decode_sqlite_value(row: &SqliteRow, column_index: usize) -> CellValue {
    use sqlx::TypeInfo;
    use sqlx::ValueRef;

    // SQLite is dynamically typed: check NULL first, then try storage classes in order
    if let Ok(value_ref) = row.try_get_raw(column_index) {
        if value_ref.is_null() {
            return CellValue::Null;
        }
    }

    if let Ok(val) = row.try_get::<i64, _>(column_index) {
        return CellValue::Int(val);
    }

    if let Ok(val) = row.try_get::<f64, _>(column_index) {
        return CellValue::Float(val);
    }

    if let Ok(val) = row.try_get::<String, _>(column_index) {
        return CellValue::Text(val);
    }

    if let Ok(val) = row.try_get::<Vec<u8>, _>(column_index) {
        return CellValue::Bytes(val);
    }

    CellValue::Unsupported(row.column(column_index).type_info().name().to_string())
}
