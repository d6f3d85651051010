pub mod agent;
pub mod cli;
pub mod cli_core;
pub mod commands;
pub mod config;
pub mod database;
pub mod database_mysql; // MySQL implementation
pub mod database_postgresql; // PostgreSQL implementation
pub mod database_sqlite; // SQLite implementation
pub mod format;
pub mod logging;
pub mod password_sanitizer;
pub mod prompt;
pub mod schema;
pub mod server;
