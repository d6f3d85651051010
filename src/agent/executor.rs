//! Runs generated SQL against the database collaborator
//!
//! No validation happens here: whatever the model produced is executed as-is.
//! The only guard is the prompt instruction to emit a single SELECT.

use crate::agent::error::{AgentError, AgentResult};
use crate::database::{DatabaseClient, Record};
use tracing::debug;

pub async fn execute(database: &dyn DatabaseClient, sql: &str) -> AgentResult<Vec<Record>> {
    let records = database
        .execute_query(sql)
        .await
        .map_err(AgentError::execution)?;
    debug!("Query returned {} rows", records.len());
    Ok(records)
}
