//! State threaded through one pipeline run

use crate::agent::error::AgentError;
use crate::agent::history::ChatHistory;
use crate::agent::intent::Intent;
use crate::database::Record;
use std::sync::Arc;
use strum::Display;

/// Pipeline stages. The graph is fixed:
///
/// ```text
/// CheckIntent ─┬─ greeting ───────> HandleGreeting ─> Done
///              ├─ other / failure ─> HandleOther ────> Done
///              └─ database_query ─> GenerateSql ─> ExecuteSql ─> ProcessResults ─> Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    CheckIntent,
    HandleGreeting,
    HandleOther,
    GenerateSql,
    ExecuteSql,
    ProcessResults,
    Done,
}

/// Everything one run reads and writes. Owned by a single run.
#[derive(Debug)]
pub struct PipelineState {
    pub user_input: String,
    pub intent: Option<Intent>,
    pub sql_query: String,
    pub query_result: Vec<Record>,
    /// Once set, SQL execution and result formatting are skipped
    pub error: Option<AgentError>,
    pub response: String,
    pub show_query: bool,
    pub chat_history: ChatHistory,
    pub schema_info: Arc<str>,
}

impl PipelineState {
    pub fn new(
        user_input: impl Into<String>,
        show_query: bool,
        chat_history: ChatHistory,
        schema_info: Arc<str>,
    ) -> Self {
        Self {
            user_input: user_input.into(),
            intent: None,
            sql_query: String::new(),
            query_result: Vec::new(),
            error: None,
            response: String::new(),
            show_query,
            chat_history,
            schema_info,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}
