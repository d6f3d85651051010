//! PostgreSQL implementation of the database abstraction layer
use crate::database::{
    CellValue, ConnectionInfo, DatabaseClient, DatabaseConfig, DatabaseError, Record,
    printable_text, with_query_timeout,
};
use crate::schema::{ColumnSchema, ForeignKeySchema, SchemaSnapshot, TableSchema};
use async_trait::async_trait;
use sqlx::postgres::types::{PgInterval, PgMoney};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode, PgValueFormat};
use sqlx::{Column, Row};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

pub struct PostgreSQLClient {
    pool: PgPool,
    connection_info: ConnectionInfo,
    query_timeout: Duration,
}

impl PostgreSQLClient {
    pub async fn new(
        connection_info: ConnectionInfo,
        config: &DatabaseConfig,
    ) -> Result<Self, DatabaseError> {
        let mut connect_options = PgConnectOptions::new();

        if let Some(ref host) = connection_info.host {
            connect_options = connect_options.host(host);
        }

        if let Some(port) = connection_info.port {
            connect_options = connect_options.port(port);
        } else if let Some(default_port) = connection_info.default_port() {
            connect_options = connect_options.port(default_port);
        }

        if let Some(ref username) = connection_info.username {
            connect_options = connect_options.username(username);
        }

        if let Some(ref password) = connection_info.password {
            connect_options = connect_options.password(password);
        }

        let database_name = connection_info
            .database
            .clone()
            .unwrap_or_else(|| "postgres".to_string());
        connect_options = connect_options.database(&database_name);

        if let Some(sslmode) = connection_info.options.get("sslmode") {
            connect_options = connect_options.ssl_mode(parse_ssl_mode(sslmode));
        }

        debug!(
            "[PostgreSQLClient::new] Connecting to database '{}'",
            database_name
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(15))
            .idle_timeout(Duration::from_secs(300))
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
        // conkey/confkey are positionally paired; unnest them together to keep the pairing
        let rows = sqlx::query(
            r#"
            SELECT
                src.relname AS table_name,
                con.conname AS constraint_name,
                dst.relname AS referred_table,
                array_agg(sa.attname::text ORDER BY k.ord) AS constrained_columns,
                array_agg(da.attname::text ORDER BY k.ord) AS referred_columns
            FROM pg_constraint con
            JOIN pg_class src ON src.oid = con.conrelid
            JOIN pg_class dst ON dst.oid = con.confrelid
            JOIN pg_namespace n ON n.oid = src.relnamespace
            CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(src_attnum, dst_attnum, ord)
            JOIN pg_attribute sa ON sa.attrelid = con.conrelid AND sa.attnum = k.src_attnum
            JOIN pg_attribute da ON da.attrelid = con.confrelid AND da.attnum = k.dst_attnum
            WHERE con.contype = 'f'
              AND n.nspname = current_schema()
            GROUP BY src.relname, con.conname, dst.relname
            ORDER BY src.relname, con.conname
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::MetadataError(e.to_string()))?;

        let mut by_table: BTreeMap<String, Vec<ForeignKeySchema>> = BTreeMap::new();
        for row in &rows {
            by_table
                .entry(row.get::<String, _>("table_name"))
                .or_default()
                .push(ForeignKeySchema {
                    constrained_columns: row.get::<Vec<String>, _>("constrained_columns"),
                    referred_table: row.get::<String, _>("referred_table"),
                    referred_columns: row.get::<Vec<String>, _>("referred_columns"),
                });
        }
        Ok(by_table)
    }
}

fn parse_ssl_mode(sslmode: &str) -> PgSslMode {
    match sslmode {
        "disable" => PgSslMode::Disable,
        "allow" => PgSslMode::Allow,
        "prefer" => PgSslMode::Prefer,
        "require" => PgSslMode::Require,
        "verify-ca" => PgSslMode::VerifyCa,
        "verify-full" => PgSslMode::VerifyFull,
        _ => PgSslMode::Prefer,
    }
}

#[async_trait]
impl DatabaseClient for PostgreSQLClient {
    async fn execute_query(&self, sql: &str) -> Result<Vec<Record>, DatabaseError> {
        debug!("[PostgreSQLClient::execute_query] Executing: {}", sql);

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;
        let rows = with_query_timeout(self.query_timeout, sqlx::query(sql).fetch_all(&mut *conn))
            .await?;
        drop(conn);

        let records = rows.iter().map(pg_row_to_record).collect::<Vec<_>>();
        debug!(
            "[PostgreSQLClient::execute_query] Query completed with {} rows",
            records.len()
        );
        Ok(records)
    }

    async fn introspect(&self) -> Result<SchemaSnapshot, DatabaseError> {
        debug!("[PostgreSQLClient::introspect] Reading information_schema");

        let rows = sqlx::query(
            r#"
            SELECT
                c.table_name::text AS table_name,
                c.column_name::text AS column_name,
                c.data_type::text AS data_type,
                c.is_nullable = 'YES' AS nullable,
                c.column_default::text AS column_default
            FROM information_schema.columns c
            JOIN information_schema.tables t
              ON t.table_schema = c.table_schema AND t.table_name = c.table_name
            WHERE c.table_schema = current_schema()
              AND t.table_type = 'BASE TABLE'
            ORDER BY c.table_name, c.ordinal_position
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
                    nullable: row.get::<bool, _>("nullable"),
                    default: row.get::<Option<String>, _>("column_default"),
                });
        }

        for (table_name, keys) in self.foreign_keys().await? {
            if let Some(table) = tables.get_mut(&table_name) {
                table.foreign_keys = keys;
            }
        }

        debug!(
            "[PostgreSQLClient::introspect] Found {} tables",
            tables.len()
        );
        Ok(SchemaSnapshot::new(tables.into_values().collect()))
    }

    fn get_connection_info(&self) -> &ConnectionInfo {
        &self.connection_info
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn pg_row_to_record(row: &PgRow) -> Record {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        record.push(column.name(), decode_postgresql_value(row, i));
    }
    record
}

fn decode_postgresql_value(row: &PgRow, column_index: usize) -> CellValue {
    use sqlx::TypeInfo;
    use sqlx::ValueRef;

    if let Ok(value_ref) = row.try_get_raw(column_index) {
        if value_ref.is_null() {
            return CellValue::Null;
        }
    }

    let type_name = row.column(column_index).type_info().name().to_string();
    let decoded = match type_name.as_str() {
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            row.try_get::<String, _>(column_index).map(CellValue::Text)
        }
        "INT2" => row
            .try_get::<i16, _>(column_index)
            .map(|v| CellValue::Int(v.into())),
        "INT4" => row
            .try_get::<i32, _>(column_index)
            .map(|v| CellValue::Int(v.into())),
        "INT8" => row.try_get::<i64, _>(column_index).map(CellValue::Int),
        "OID" => row
            .try_get::<sqlx::postgres::types::Oid, _>(column_index)
            .map(|v| CellValue::Int(v.0.into())),
        "FLOAT4" => row
            .try_get::<f32, _>(column_index)
            .map(|v| CellValue::Float(v.into())),
        "FLOAT8" => row.try_get::<f64, _>(column_index).map(CellValue::Float),
        // Keep full precision for NUMERIC
        "NUMERIC" => row
            .try_get::<sqlx::types::Decimal, _>(column_index)
            .map(|v| CellValue::Text(v.to_string())),
        "BOOL" => row.try_get::<bool, _>(column_index).map(CellValue::Bool),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(column_index)
            .map(|v| CellValue::Text(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(column_index)
            .map(|v| CellValue::Text(v.to_string())),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(column_index)
            .map(|v| CellValue::Text(v.to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(column_index)
            .map(|v| CellValue::Text(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(column_index)
            .map(|v| CellValue::Text(v.to_string())),
        "UUID" => row
            .try_get::<sqlx::types::Uuid, _>(column_index)
            .map(|v| CellValue::Text(v.to_string())),
        "BYTEA" => row.try_get::<Vec<u8>, _>(column_index).map(CellValue::Bytes),
        "INTERVAL" => row
            .try_get::<PgInterval, _>(column_index)
            .map(|v| CellValue::Text(format_interval(v.months, v.days, v.microseconds))),
        "MONEY" => row
            .try_get::<PgMoney, _>(column_index)
            .map(|v| CellValue::Text(v.to_decimal(2).to_string())),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" => row
            .try_get::<Vec<String>, _>(column_index)
            .map(|v| CellValue::Text(format_array(v))),
        "INT2[]" => row
            .try_get::<Vec<i16>, _>(column_index)
            .map(|v| CellValue::Text(format_array(v))),
        "INT4[]" => row
            .try_get::<Vec<i32>, _>(column_index)
            .map(|v| CellValue::Text(format_array(v))),
        "INT8[]" => row
            .try_get::<Vec<i64>, _>(column_index)
            .map(|v| CellValue::Text(format_array(v))),
        "FLOAT8[]" => row
            .try_get::<Vec<f64>, _>(column_index)
            .map(|v| CellValue::Text(format_array(v))),
        "BOOL[]" => row
            .try_get::<Vec<bool>, _>(column_index)
            .map(|v| CellValue::Text(format_array(v))),
        _ => row.try_get::<String, _>(column_index).map(CellValue::Text),
    };

    decoded.unwrap_or_else(|e| {
        // Enums, domains and other text-shaped values still carry a readable wire form
        if let Some(text) = raw_text(row, column_index, &type_name) {
            return CellValue::Text(text);
        }
        debug!(
            "[PostgreSQLClient] No decoder for column {} of type {}: {}",
            column_index, type_name, e
        );
        CellValue::Unsupported(type_name)
    })
}

fn raw_text(row: &PgRow, column_index: usize, type_name: &str) -> Option<String> {
    let value = row.try_get_raw(column_index).ok()?;
    if value.format() == PgValueFormat::Text {
        return value.as_str().ok().map(str::to_string);
    }

    let bytes = value.as_bytes().ok()?;
    match type_name {
        "INET" | "CIDR" => format_inet(bytes),
        _ => printable_text(bytes),
    }
}

/// Render an interval the way psql does by default, e.g. `1 year 2 mons 3 days 04:05:06`
fn format_interval(months: i32, days: i32, microseconds: i64) -> String {
    fn unit(n: i32, singular: &str, plural: &str) -> String {
        format!("{n} {}", if n == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    if months / 12 != 0 {
        parts.push(unit(months / 12, "year", "years"));
    }
    if months % 12 != 0 {
        parts.push(unit(months % 12, "mon", "mons"));
    }
    if days != 0 {
        parts.push(unit(days, "day", "days"));
    }

    if microseconds != 0 || parts.is_empty() {
        let sign = if microseconds < 0 { "-" } else { "" };
        let total = microseconds.unsigned_abs();
        let seconds = total / 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        let fraction = total % 1_000_000;
        if fraction != 0 {
            time.push_str(format!(".{fraction:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

/// Decode the binary wire form of INET/CIDR: family, prefix bits, cidr flag,
/// address length, then the address bytes
fn format_inet(bytes: &[u8]) -> Option<String> {
    let [family, bits, is_cidr, _len, address @ ..] = bytes else {
        return None;
    };

    let (ip, max_bits) = match (*family, address.len()) {
        (2, 4) => (IpAddr::from(<[u8; 4]>::try_from(address).ok()?), 32),
        (3, 16) => (IpAddr::from(<[u8; 16]>::try_from(address).ok()?), 128),
        _ => return None,
    };

    if *is_cidr == 0 && *bits == max_bits {
        Some(ip.to_string())
    } else {
        Some(format!("{ip}/{bits}"))
    }
}

fn format_array<T: std::fmt::Display>(items: Vec<T>) -> String {
    let items: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("{{{}}}", items.join(","))
}
