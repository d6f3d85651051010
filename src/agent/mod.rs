//! Conversational database agent
//!
//! Turns a natural-language question into an answer by routing it through a
//! small fixed pipeline:
//!
//! - classify the intent (greeting, database query, anything else)
//! - greetings get a canned reply, other input a model-generated one
//! - database queries go through generate SQL, execute, then format the rows
//!
//! Step failures never escape [`Pipeline::run`]; they are recorded in the
//! returned [`PipelineState`] next to an apology the user can read.
//!
//! # Usage
//!
//! ```rust,ignore
//! use askdb::agent::{ChatRequest, Pipeline, create_model_gateway};
//!
//! let gateway = create_model_gateway(&config.model)?;
//! let pipeline = Pipeline::new(gateway.into(), database, schema.to_prompt(), config.chat);
//! let state = pipeline.run(ChatRequest::new("how many users signed up today?")).await;
//! println!("{}", state.response);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod intent;
pub mod pipeline;
pub mod prompt;
pub mod responder;
pub mod results;
pub mod session;
pub mod sql;
pub mod state;

pub use client::{ModelGateway, create_model_gateway};
pub use config::{ChatConfig, ModelConfig, ModelProviderType};
pub use error::{AgentError, AgentResult};
pub use history::{ChatHistory, Role, Turn};
pub use intent::Intent;
pub use pipeline::{ChatRequest, Pipeline};
pub use session::SessionStore;
pub use state::{PipelineState, Stage};

/// Test doubles for the model gateway and the database
#[cfg(test)]
pub(crate) mod testing {
    use super::{AgentError, AgentResult, ModelGateway};
    use crate::database::{ConnectionInfo, DatabaseClient, DatabaseError, Record};
    use crate::schema::SchemaSnapshot;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned completions in order and records every prompt
    pub struct ScriptedGateway {
        replies: Mutex<VecDeque<AgentResult<String>>>,
        prompts: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl ScriptedGateway {
        pub fn new(replies: Vec<AgentResult<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }

        /// Sleep before every completion, like a slow provider
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn complete(&self, prompt: &str) -> AgentResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Provider("script exhausted".to_string())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Returns fixed rows (or a fixed error) and records executed statements
    pub struct StaticDatabase {
        rows: Vec<Record>,
        failure: Option<String>,
        executed: Mutex<Vec<String>>,
        connection_info: ConnectionInfo,
    }

    impl StaticDatabase {
        pub fn with_rows(rows: Vec<Record>) -> Self {
            Self {
                rows,
                failure: None,
                executed: Mutex::new(Vec::new()),
                connection_info: ConnectionInfo::parse_url("sqlite::memory:").unwrap(),
            }
        }

        /// Every execution fails with `DatabaseError::QueryError(message)`
        pub fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::with_rows(Vec::new())
            }
        }

        pub fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabaseClient for StaticDatabase {
        async fn execute_query(&self, sql: &str) -> Result<Vec<Record>, DatabaseError> {
            self.executed.lock().unwrap().push(sql.to_string());
            match self.failure {
                Some(ref message) => Err(DatabaseError::QueryError(message.clone())),
                None => Ok(self.rows.clone()),
            }
        }

        async fn introspect(&self) -> Result<SchemaSnapshot, DatabaseError> {
            Ok(SchemaSnapshot::default())
        }

        fn get_connection_info(&self) -> &ConnectionInfo {
            &self.connection_info
        }

        async fn close(&self) {}
    }
}
