//! Replies for greetings and non-data input

use crate::agent::client::ModelGateway;
use crate::agent::error::AgentResult;
use crate::agent::prompt::PromptGenerator;

pub const GREETING_REPLY: &str = "Hey there! How can I help you with your data today?";

/// Canned greeting; never calls the model
pub fn greet() -> &'static str {
    GREETING_REPLY
}

/// Model-generated reply for input that is not a data request
pub async fn converse(gateway: &dyn ModelGateway, user_input: &str) -> AgentResult<String> {
    let prompt = PromptGenerator::conversational_prompt(user_input);
    let reply = gateway.complete(&prompt).await?;
    Ok(reply.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::error::AgentError;
    use crate::agent::testing::ScriptedGateway;

    #[tokio::test]
    async fn test_converse_trims_reply() {
        let gateway = ScriptedGateway::new(vec![Ok("  Ready when you are!\n".to_string())]);
        let reply = converse(&gateway, "okay").await.unwrap();

        assert_eq!(reply, "Ready when you are!");
        assert!(gateway.prompts()[0].contains("The user's input is \"okay\""));
    }

    #[tokio::test]
    async fn test_converse_propagates_gateway_error() {
        let gateway = ScriptedGateway::new(vec![Err(AgentError::Timeout { timeout_secs: 60 })]);
        assert!(matches!(
            converse(&gateway, "thanks").await,
            Err(AgentError::Timeout { timeout_secs: 60 })
        ));
    }
}
