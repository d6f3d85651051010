//! Intent classification

use crate::agent::client::ModelGateway;
use crate::agent::error::{AgentError, AgentResult};
use crate::agent::prompt::PromptGenerator;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

/// What the user is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    Greeting,
    DatabaseQuery,
    Other,
}

impl Intent {
    /// Interpret a raw model completion. Anything but an exact label means `Other`.
    pub fn from_completion(completion: &str) -> Self {
        completion
            .trim()
            .to_lowercase()
            .parse()
            .unwrap_or(Intent::Other)
    }
}

/// Ask the model which category the input belongs to
pub async fn classify(gateway: &dyn ModelGateway, user_input: &str) -> AgentResult<Intent> {
    let prompt = PromptGenerator::intent_prompt(user_input);
    let completion = gateway
        .complete(&prompt)
        .await
        .map_err(|e| AgentError::Classification(Box::new(e)))?;

    let intent = Intent::from_completion(&completion);
    debug!("Classified input as {} (raw: {:?})", intent, completion.trim());
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedGateway;
    use rstest::rstest;

    #[rstest]
    #[case("greeting", Intent::Greeting)]
    #[case("  Database_Query\n", Intent::DatabaseQuery)]
    #[case("OTHER", Intent::Other)]
    #[case("database query", Intent::Other)]
    #[case("'greeting'", Intent::Other)]
    #[case("", Intent::Other)]
    #[case("The category is greeting", Intent::Other)]
    fn test_from_completion(#[case] raw: &str, #[case] expected: Intent) {
        assert_eq!(Intent::from_completion(raw), expected);
    }

    #[test]
    fn test_display_matches_labels() {
        assert_eq!(Intent::DatabaseQuery.to_string(), "database_query");
        assert_eq!(Intent::Greeting.to_string(), "greeting");
    }

    #[tokio::test]
    async fn test_classify_uses_intent_prompt() {
        let gateway = ScriptedGateway::new(vec![Ok("database_query".to_string())]);
        let intent = classify(&gateway, "top 5 products").await.unwrap();

        assert_eq!(intent, Intent::DatabaseQuery);
        let prompts = gateway.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("User Input: \"top 5 products\""));
    }

    #[tokio::test]
    async fn test_classify_failure_is_classification_error() {
        let gateway = ScriptedGateway::new(vec![Err(AgentError::Network("down".to_string()))]);
        let err = classify(&gateway, "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Classification(_)));
        assert!(err.to_string().starts_with("Error classifying intent:"));
    }
}
