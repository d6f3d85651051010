//! The database collaborator: URL parsing, scoped query execution and
//! schema introspection over PostgreSQL, SQLite and MySQL/MariaDB
use crate::schema::SchemaSnapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Backends a question can be answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
    MySQL,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Per-backend constants
pub trait DatabaseTypeExt {
    /// Port used when the URL names none
    fn default_port(&self) -> Option<u16>;

    /// Dialect name shown to the model and the user
    fn display_name(&self) -> &'static str;

    /// SQLite databases live in a file, not behind a host
    fn is_file_based(&self) -> bool;

    /// Canonical scheme used by `ConnectionInfo::to_url`
    fn url_scheme(&self) -> &'static str;
}

impl DatabaseTypeExt for DatabaseType {
    fn default_port(&self) -> Option<u16> {
        match self {
            DatabaseType::PostgreSQL => Some(5432),
            DatabaseType::MySQL => Some(3306),
            DatabaseType::SQLite => None,
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            DatabaseType::PostgreSQL => "PostgreSQL",
            DatabaseType::MySQL => "MySQL",
            DatabaseType::SQLite => "SQLite",
        }
    }

    fn is_file_based(&self) -> bool {
        matches!(self, DatabaseType::SQLite)
    }

    fn url_scheme(&self) -> &'static str {
        match self {
            DatabaseType::PostgreSQL => "postgres",
            DatabaseType::MySQL => "mysql",
            DatabaseType::SQLite => "sqlite",
        }
    }
}

impl DatabaseType {
    pub fn from_scheme(scheme: &str) -> Result<Self, DatabaseError> {
        match scheme {
            "postgresql" | "postgres" => Ok(DatabaseType::PostgreSQL),
            "sqlite" => Ok(DatabaseType::SQLite),
            "mysql" | "mariadb" => Ok(DatabaseType::MySQL),
            scheme => Err(DatabaseError::UnsupportedScheme(scheme.to_string())),
        }
    }
}

/// Everything needed to open a pool, parsed from a connection URL
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub database_type: DatabaseType,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub file_path: Option<String>,        // For SQLite
    pub options: HashMap<String, String>, // Query parameters
}

/// Pool and timeout settings shared by every client
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (can also use DB_CONNECTION_STRING env var)
    pub url: Option<String>,
    /// Per-statement timeout in seconds
    pub query_timeout_seconds: u64,
    /// Upper bound on pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            query_timeout_seconds: 30,
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }
}

/// A single value decoded from a result row
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// A value whose SQL type has no decoder; carries the type name
    Unsupported(String),
}

impl CellValue {
    /// Text of a value standing alone in a sentence: NULL reads as `None` and
    /// floats keep their fractional part (`5.0`)
    pub fn to_answer(&self) -> String {
        match self {
            CellValue::Null => "None".to_string(),
            CellValue::Float(v) => format!("{v:?}"),
            other => other.to_string(),
        }
    }

    /// Representation used when the formatter cannot render a result set
    pub fn to_raw(&self) -> String {
        match self {
            CellValue::Text(s) => format!("{s:?}"),
            CellValue::Unsupported(type_name) => format!("<{type_name}>"),
            other => other.to_answer(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Bytes(bytes) => write!(f, "\\x{}", hex::encode(bytes)),
            CellValue::Unsupported(type_name) => write!(f, "<unsupported {type_name}>"),
        }
    }
}

/// One result row: column names mapped to values, in select-list order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, column: impl Into<String>, value: CellValue) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: CellValue) {
        self.fields.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name:?}: {}", value.to_raw())?;
        }
        write!(f, "}}")
    }
}

/// Database abstraction errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unsupported database URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Metadata error: {0}")]
    MetadataError(String),

    #[error("Query timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

/// Open a pooled client for the backend named by `connection_info`
pub async fn create_database_client(
    connection_info: ConnectionInfo,
    config: &DatabaseConfig,
) -> Result<Box<dyn DatabaseClient>, DatabaseError> {
    match connection_info.database_type {
        DatabaseType::PostgreSQL => {
            let client =
                crate::database_postgresql::PostgreSQLClient::new(connection_info, config).await?;
            Ok(Box::new(client))
        }
        DatabaseType::SQLite => {
            let client = crate::database_sqlite::SqliteClient::new(connection_info, config).await?;
            Ok(Box::new(client))
        }
        DatabaseType::MySQL => {
            let client = crate::database_mysql::MySqlClient::new(connection_info, config).await?;
            Ok(Box::new(client))
        }
    }
}

/// Text form of a value's wire bytes when they are UTF-8 without control
/// characters; anything else is left to the caller as binary
pub(crate) fn printable_text(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    if text.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return None;
    }
    Some(text.to_string())
}

/// Run a fetch under the configured statement timeout
pub(crate) async fn with_query_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, DatabaseError>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DatabaseError::QueryError(e.to_string())),
        Err(_) => Err(DatabaseError::Timeout {
            timeout_secs: timeout.as_secs(),
        }),
    }
}

fn decode_component(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw)
        .decode_utf8_lossy()
        .into_owned()
}

impl ConnectionInfo {
    /// Parse `postgres://`, `mysql://` or `sqlite:` URLs
    pub fn parse_url(url_str: &str) -> Result<Self, DatabaseError> {
        debug!(
            "Parsing connection URL {}",
            crate::password_sanitizer::sanitize_connection_url(url_str)
        );

        let url = Url::parse(url_str)
            .map_err(|e| DatabaseError::InvalidUrl(format!("Failed to parse URL: {e}")))?;

        let database_type = DatabaseType::from_scheme(url.scheme())?;

        let mut connection_info = ConnectionInfo {
            database_type,
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            file_path: None,
            options: HashMap::new(),
        };

        if database_type.is_file_based() {
            // sqlite:///abs/path.db, sqlite://relative.db, sqlite::memory:
            let rest = url_str
                .strip_prefix("sqlite://")
                .or_else(|| url_str.strip_prefix("sqlite:"))
                .unwrap_or_default();
            let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

            if path.is_empty() {
                return Err(DatabaseError::InvalidUrl(
                    "SQLite URL is missing a file path".to_string(),
                ));
            }

            connection_info.file_path = Some(path.to_string());
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                connection_info
                    .options
                    .insert(key.to_string(), value.to_string());
            }
            return Ok(connection_info);
        }

        connection_info.host = url.host_str().map(|h| h.to_string());
        connection_info.port = url.port();
        connection_info.username = if url.username().is_empty() {
            None
        } else {
            Some(decode_component(url.username()))
        };
        connection_info.password = url.password().map(decode_component);

        // First path segment, percent-decoded
        if let Some(mut segments) = url.path_segments() {
            if let Some(db_name) = segments.next() {
                if !db_name.is_empty() {
                    let decoded_db_name = percent_encoding::percent_decode_str(db_name)
                        .decode_utf8()
                        .map_err(|e| {
                            DatabaseError::InvalidUrl(format!(
                                "Database name '{}' is not valid UTF-8: {}",
                                db_name, e
                            ))
                        })?
                        .to_string();
                    connection_info.database = Some(decoded_db_name);
                }
            }
        }

        for (key, value) in url.query_pairs() {
            connection_info
                .options
                .insert(key.to_string(), value.to_string());
        }

        debug!(
            "Connection URL resolved to a {} database",
            database_type
        );
        Ok(connection_info)
    }

    /// Port used when the URL names none
    pub fn default_port(&self) -> Option<u16> {
        self.database_type.default_port()
    }

    /// Whether the connection targets a throwaway in-memory SQLite database
    pub fn is_in_memory(&self) -> bool {
        self.file_path.as_deref() == Some(":memory:")
    }

    /// Build a connection URL without the password, for display and logs
    pub fn to_url(&self) -> String {
        if self.database_type.is_file_based() {
            let file_path = self.file_path.as_deref().unwrap_or_default();
            if self.is_in_memory() {
                return format!("{}::memory:", self.database_type.url_scheme());
            }
            return format!("{}://{}", self.database_type.url_scheme(), file_path);
        }

        let mut url = format!("{}://", self.database_type.url_scheme());
        if let Some(ref username) = self.username {
            url.push_str(username);
            url.push('@');
        }
        if let Some(ref host) = self.host {
            url.push_str(host);
            if let Some(port) = self.port {
                url.push(':');
                url.push_str(&port.to_string());
            }
        }
        if let Some(ref database) = self.database {
            url.push('/');
            url.push_str(database);
        }
        url
    }
}

/// Trait for executing generated queries and describing the database to the model
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Execute a statement on a freshly acquired connection and materialize every row
    async fn execute_query(&self, sql: &str) -> Result<Vec<Record>, DatabaseError>;

    /// Read tables, columns and foreign keys of the current database/schema
    async fn introspect(&self) -> Result<SchemaSnapshot, DatabaseError>;

    /// Connection details this client was opened with
    fn get_connection_info(&self) -> &ConnectionInfo;

    /// Database flavour, used to name the SQL dialect in prompts
    fn database_type(&self) -> DatabaseType {
        self.get_connection_info().database_type
    }

    /// Close the pool
    async fn close(&self);
}
