//! MySQL/MariaDB implementation of the database abstraction layer
use crate::database::{
    CellValue, ConnectionInfo, DatabaseClient, DatabaseConfig, DatabaseError, Record,
    printable_text, with_query_timeout,
};
use crate::schema::{ColumnSchema, ForeignKeySchema, SchemaSnapshot, TableSchema};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::types::Decimal;
use sqlx::{Column, Row};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub struct MySqlClient {
    pool: MySqlPool,
    connection_info: ConnectionInfo,
    query_timeout: Duration,
}

impl MySqlClient {
    pub async fn new(
        connection_info: ConnectionInfo,
        config: &DatabaseConfig,
    ) -> Result<Self, DatabaseError> {
        debug!("[MySqlClient::new] Creating MySQL client");

        let host = connection_info.host.as_deref().unwrap_or("localhost");
        let port = connection_info
            .port
            .or(connection_info.default_port())
            .unwrap_or(3306);
        let username = connection_info.username.as_deref().unwrap_or("root");

        let mut connect_options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(username);

        if let Some(ref password) = connection_info.password {
            connect_options = connect_options.password(password);
        }
        if let Some(ref database) = connection_info.database {
            connect_options = connect_options.database(database);
        }
        if let Some(mode) = connection_info
            .options
            .get("ssl-mode")
            .or(connection_info.options.get("ssl_mode"))
        {
            connect_options = connect_options.ssl_mode(parse_ssl_mode(mode));
        }

        debug!(
            "[MySqlClient::new] Connecting to: {}",
            crate::password_sanitizer::sanitize_connection_url(&connection_info.to_url())
        );

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool,
            connection_info,
            query_timeout: config.query_timeout(),
        })
    }

    async fn foreign_keys(&self) -> Result<BTreeMap<String, Vec<ForeignKeySchema>>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(TABLE_NAME AS CHAR) AS table_name,
                CAST(CONSTRAINT_NAME AS CHAR) AS constraint_name,
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(REFERENCED_TABLE_NAME AS CHAR) AS referred_table,
                CAST(REFERENCED_COLUMN_NAME AS CHAR) AS referred_column
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = DATABASE()
              AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY TABLE_NAME, CONSTRAINT_NAME, ORDINAL_POSITION
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::MetadataError(e.to_string()))?;

        // Rows of one constraint are contiguous thanks to the ORDER BY
        let mut by_table: BTreeMap<String, Vec<ForeignKeySchema>> = BTreeMap::new();
        let mut current: Option<(String, String)> = None;
        for row in &rows {
            let table_name: String = row.get("table_name");
            let constraint: String = row.get("constraint_name");
            let key = (table_name.clone(), constraint);

            let keys = by_table.entry(table_name).or_default();
            if current.as_ref() != Some(&key) || keys.is_empty() {
                keys.push(ForeignKeySchema {
                    constrained_columns: Vec::new(),
                    referred_table: row.get::<String, _>("referred_table"),
                    referred_columns: Vec::new(),
                });
                current = Some(key);
            }
            if let Some(fk) = keys.last_mut() {
                fk.constrained_columns.push(row.get::<String, _>("column_name"));
                fk.referred_columns.push(row.get::<String, _>("referred_column"));
            }
        }
        Ok(by_table)
    }
}

fn parse_ssl_mode(mode: &str) -> MySqlSslMode {
    match mode.to_ascii_lowercase().as_str() {
        "disabled" => MySqlSslMode::Disabled,
        "required" => MySqlSslMode::Required,
        "verify_ca" | "verify-ca" => MySqlSslMode::VerifyCa,
        "verify_identity" | "verify-identity" => MySqlSslMode::VerifyIdentity,
        _ => MySqlSslMode::Preferred,
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn execute_query(&self, sql: &str) -> Result<Vec<Record>, DatabaseError> {
        debug!("[MySqlClient::execute_query] Executing: {}", sql);

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;
        let rows = with_query_timeout(self.query_timeout, sqlx::query(sql).fetch_all(&mut *conn))
            .await?;
        drop(conn);

        let records = rows.iter().map(mysql_row_to_record).collect::<Vec<_>>();
        debug!(
            "[MySqlClient::execute_query] Query completed with {} rows",
            records.len()
        );
        Ok(records)
    }

    async fn introspect(&self) -> Result<SchemaSnapshot, DatabaseError> {
        debug!("[MySqlClient::introspect] Reading INFORMATION_SCHEMA");

        // CAST keeps sqlx from handing back VARBINARY for the metadata columns
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(c.TABLE_NAME AS CHAR) AS table_name,
                CAST(c.COLUMN_NAME AS CHAR) AS column_name,
                CAST(c.COLUMN_TYPE AS CHAR) AS data_type,
                CAST(c.IS_NULLABLE AS CHAR) AS is_nullable,
                CAST(c.COLUMN_DEFAULT AS CHAR) AS column_default
            FROM INFORMATION_SCHEMA.COLUMNS c
            JOIN INFORMATION_SCHEMA.TABLES t
              ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
            WHERE c.TABLE_SCHEMA = DATABASE()
              AND t.TABLE_TYPE = 'BASE TABLE'
            ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::MetadataError(e.to_string()))?;

        let mut tables: BTreeMap<String, TableSchema> = BTreeMap::new();
        for row in &rows {
            let table_name: String = row.get("table_name");
            tables
                .entry(table_name.clone())
                .or_insert_with(|| TableSchema::new(table_name))
                .columns
                .push(ColumnSchema {
                    name: row.get::<String, _>("column_name"),
                    data_type: row.get::<String, _>("data_type"),
                    nullable: row.get::<String, _>("is_nullable") == "YES",
                    default: row.get::<Option<String>, _>("column_default"),
                });
        }

        for (table_name, keys) in self.foreign_keys().await? {
            if let Some(table) = tables.get_mut(&table_name) {
                table.foreign_keys = keys;
            }
        }

        debug!("[MySqlClient::introspect] Found {} tables", tables.len());
        Ok(SchemaSnapshot::new(tables.into_values().collect()))
    }

    fn get_connection_info(&self) -> &ConnectionInfo {
        &self.connection_info
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn mysql_row_to_record(row: &MySqlRow) -> Record {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        record.push(column.name(), decode_mysql_value(row, i));
    }
    record
}

fn decode_mysql_value(row: &MySqlRow, column_index: usize) -> CellValue {
    use sqlx::TypeInfo;
    use sqlx::ValueRef;

    if let Ok(value_ref) = row.try_get_raw(column_index) {
        if value_ref.is_null() {
            return CellValue::Null;
        }
    }

    let type_name = row.column(column_index).type_info().name().to_string();
    match type_name.as_str() {
        "BOOLEAN" => {
            if let Ok(val) = row.try_get::<bool, _>(column_index) {
                return CellValue::Bool(val);
            }
        }
        "BIGINT UNSIGNED" => {
            // Values above i64::MAX stay exact as text
            if let Ok(val) = row.try_get::<u64, _>(column_index) {
                return i64::try_from(val)
                    .map(CellValue::Int)
                    .unwrap_or_else(|_| CellValue::Text(val.to_string()));
            }
        }
        _ => {}
    }

    if let Ok(val) = row.try_get::<i64, _>(column_index) {
        return CellValue::Int(val);
    }

    if let Ok(val) = row.try_get::<u32, _>(column_index) {
        return CellValue::Int(val.into());
    }

    if let Ok(val) = row.try_get::<f64, _>(column_index) {
        return CellValue::Float(val);
    }

    if let Ok(val) = row.try_get::<f32, _>(column_index) {
        return CellValue::Float(val.into());
    }

    if let Ok(val) = row.try_get::<Decimal, _>(column_index) {
        return CellValue::Text(val.to_string());
    }

    if let Ok(val) = row.try_get::<String, _>(column_index) {
        return CellValue::Text(val);
    }

    if let Ok(val) = row.try_get::<chrono::NaiveDateTime, _>(column_index) {
        return CellValue::Text(val.format("%Y-%m-%d %H:%M:%S").to_string());
    }

    if let Ok(val) = row.try_get::<chrono::NaiveDate, _>(column_index) {
        return CellValue::Text(val.to_string());
    }

    if let Ok(val) = row.try_get::<chrono::NaiveTime, _>(column_index) {
        return CellValue::Text(val.to_string());
    }

    if let Ok(val) = row.try_get::<serde_json::Value, _>(column_index) {
        return CellValue::Text(val.to_string());
    }

    // SET, BIT, GEOMETRY and text columns flagged binary all arrive as plain bytes
    match row.try_get_unchecked::<Vec<u8>, _>(column_index) {
        Ok(bytes) => printable_text(&bytes)
            .map(CellValue::Text)
            .unwrap_or(CellValue::Bytes(bytes)),
        Err(e) => {
            debug!(
                "[MySqlClient] No decoder for column {} of type {}: {}",
                column_index, type_name, e
            );
            CellValue::Unsupported(type_name)
        }
    }
}
