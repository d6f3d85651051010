//! The intent-routed query pipeline
//!
//! A run walks the [`Stage`] graph once. Each step returns a `Result`; the
//! driver folds failures into [`PipelineState::error`] so a run always ends
//! with a response instead of an error.

use crate::agent::client::ModelGateway;
use crate::agent::config::ChatConfig;
use crate::agent::history::ChatHistory;
use crate::agent::intent::{self, Intent};
use crate::agent::state::{PipelineState, Stage};
use crate::agent::{executor, responder, results, sql};
use crate::database::{DatabaseClient, DatabaseTypeExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input of one pipeline run
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub question: String,
    pub show_query: bool,
    pub history: ChatHistory,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            show_query: true,
            history: ChatHistory::default(),
        }
    }

    pub fn show_query(mut self, show_query: bool) -> Self {
        self.show_query = show_query;
        self
    }

    pub fn history(mut self, history: ChatHistory) -> Self {
        self.history = history;
        self
    }
}

/// Shared, read-only collaborators of every run
#[derive(Clone)]
pub struct Pipeline {
    gateway: Arc<dyn ModelGateway>,
    database: Arc<dyn DatabaseClient>,
    schema_prompt: Arc<str>,
    settings: ChatConfig,
}

impl Pipeline {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        database: Arc<dyn DatabaseClient>,
        schema_prompt: impl Into<Arc<str>>,
        settings: ChatConfig,
    ) -> Self {
        Self {
            gateway,
            database,
            schema_prompt: schema_prompt.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &ChatConfig {
        &self.settings
    }

    pub fn schema_prompt(&self) -> &str {
        &self.schema_prompt
    }

    pub fn database(&self) -> &Arc<dyn DatabaseClient> {
        &self.database
    }

    /// Answer one question. Never fails: step errors end up in `state.error`
    /// and `state.response` carries what the user should see.
    pub async fn run(&self, request: ChatRequest) -> PipelineState {
        let ChatRequest {
            question,
            show_query,
            history,
        } = request;

        let history = ChatHistory::from_turns(history.into_turns(), self.settings.history_limit);
        let mut state = PipelineState::new(question, show_query, history, self.schema_prompt.clone());

        info!(
            "Pipeline run started ({} history turns)",
            state.chat_history.len()
        );

        let mut stage = Stage::CheckIntent;
        while stage != Stage::Done {
            debug!("Entering stage {}", stage);
            stage = match stage {
                Stage::CheckIntent => self.check_intent(&mut state).await,
                Stage::HandleGreeting => Self::handle_greeting(&mut state),
                Stage::HandleOther => self.handle_other(&mut state).await,
                Stage::GenerateSql => self.generate_sql(&mut state).await,
                Stage::ExecuteSql => self.execute_sql(&mut state).await,
                Stage::ProcessResults => Self::process_results(&mut state),
                Stage::Done => Stage::Done,
            };
        }

        info!(
            "Pipeline run finished (intent: {}, error: {})",
            state
                .intent
                .map(|i| i.to_string())
                .unwrap_or_else(|| "none".to_string()),
            state.has_error()
        );
        state
    }

    async fn check_intent(&self, state: &mut PipelineState) -> Stage {
        let intent = match intent::classify(self.gateway.as_ref(), &state.user_input).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("{}", e);
                state.error = Some(e);
                Intent::Other
            }
        };
        state.intent = Some(intent);

        match intent {
            Intent::Greeting => Stage::HandleGreeting,
            Intent::DatabaseQuery => Stage::GenerateSql,
            Intent::Other => Stage::HandleOther,
        }
    }

    fn handle_greeting(state: &mut PipelineState) -> Stage {
        state.response = responder::greet().to_string();
        Stage::Done
    }

    async fn handle_other(&self, state: &mut PipelineState) -> Stage {
        match responder::converse(self.gateway.as_ref(), &state.user_input).await {
            Ok(reply) => state.response = reply,
            Err(e) => {
                warn!("Conversational reply failed: {}", e);
                state.response = results::apology(&e);
                state.error = Some(e);
            }
        }
        Stage::Done
    }

    async fn generate_sql(&self, state: &mut PipelineState) -> Stage {
        let recent = state
            .chat_history
            .recent(self.settings.prompt_history_turns);
        let dialect = self.database.database_type().display_name();

        match sql::generate(
            self.gateway.as_ref(),
            &state.user_input,
            recent,
            &state.schema_info,
            dialect,
        )
        .await
        {
            Ok(query) => state.sql_query = query,
            Err(e) => {
                warn!("{}", e);
                state.error = Some(e);
            }
        }
        Stage::ExecuteSql
    }

    async fn execute_sql(&self, state: &mut PipelineState) -> Stage {
        if state.has_error() {
            debug!("Skipping execution after an earlier failure");
            return Stage::ProcessResults;
        }

        match executor::execute(self.database.as_ref(), &state.sql_query).await {
            Ok(records) => state.query_result = records,
            Err(e) => {
                warn!("{}", e);
                state.error = Some(e);
            }
        }
        Stage::ProcessResults
    }

    fn process_results(state: &mut PipelineState) -> Stage {
        if let Some(ref e) = state.error {
            state.response = results::apology(e);
            return Stage::Done;
        }

        match results::compose_answer(&state.sql_query, &state.query_result, state.show_query) {
            Ok(answer) => {
                // Only answers backed by rows become conversation context
                if state.query_result.is_empty() {
                    debug!("Empty result, history left unchanged");
                } else {
                    state
                        .chat_history
                        .record_exchange(&state.user_input, &answer);
                }
                state.response = answer;
            }
            Err(e) => {
                warn!("Falling back to raw results: {}", e);
                state.response = results::raw_fallback(&state.query_result);
                state.error = Some(e.into());
            }
        }
        Stage::Done
    }
}
