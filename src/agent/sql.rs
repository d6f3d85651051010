//! SQL generation from natural language

use crate::agent::client::ModelGateway;
use crate::agent::error::{AgentError, AgentResult};
use crate::agent::history::Turn;
use crate::agent::prompt::PromptGenerator;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```(?:postgresql|postgres|mysql|sqlite|sql)?").expect("fence pattern is valid")
});

/// Remove markdown fence markers (language-tagged openers and closers) and trim
pub fn strip_code_fences(completion: &str) -> String {
    CODE_FENCE.replace_all(completion, "").trim().to_string()
}

/// Ask the model for a single SELECT statement answering `user_input`
pub async fn generate(
    gateway: &dyn ModelGateway,
    user_input: &str,
    recent_turns: &[Turn],
    schema_prompt: &str,
    dialect: &str,
) -> AgentResult<String> {
    let prompt = PromptGenerator::sql_prompt(user_input, recent_turns, schema_prompt, dialect);
    debug!(
        "SQL prompt built with {} history turns, {} chars",
        recent_turns.len(),
        prompt.len()
    );

    let completion = gateway
        .complete(&prompt)
        .await
        .map_err(AgentError::generation)?;

    let sql = strip_code_fences(&completion);
    if sql.is_empty() {
        return Err(AgentError::Generation(
            "the model returned an empty query".to_string(),
        ));
    }

    debug!("Generated SQL: {}", sql);
    Ok(sql)
}
