//! Prompt templates for the three model calls of the pipeline

use crate::agent::history::{Role, Turn};
use std::fmt::Write;

/// Prompt generator for the pipeline's model calls
pub struct PromptGenerator;

impl PromptGenerator {
    /// Classification prompt; the model must answer with a single category word
    pub fn intent_prompt(user_input: &str) -> String {
        format!(
            r#"Classify the user's input into one of the following categories:
- 'greeting': A friendly greeting or simple small talk (e.g., 'hi', 'hello', 'how are you?').
- 'database_query': A request for information from the database (e.g., 'what are the top 5 products?', 'show me all users').
- 'other': Any input that does not fit the above categories.

User Input: "{user_input}"

Provide only the category name as a single word in your response."#
        )
    }

    /// Prompt for replies to input that is neither a greeting nor a data request
    pub fn conversational_prompt(user_input: &str) -> String {
        format!(
            r#"The user's input is "{user_input}". This is not a request for data from the database.
Your task is to generate a polite, conversational response.

If the user's input is a direct question about my capabilities (e.g., "what can you do?", "what is your purpose?"), provide a detailed explanation of my database agent role.

For all other inputs, generate a short, helpful, and polite response that acknowledges the user without repeating my purpose.

Examples:
- User: "thanks" -> Assistant: "You're welcome! Is there anything else I can help with?"
- User: "what's the weather" -> Assistant: "I cannot provide that information."
- User: "what can you do?" -> Assistant: "I'm an AI database agent. I can answer your questions by converting your natural language into SQL queries and retrieving the data from the database."
- User: "okay" -> Assistant: "Ready when you are!"
- User: "so i need help" -> Assistant: "Okay, I'm ready to help with your database queries."

Response:"#
        )
    }

    /// Role-labelled transcript of recent turns, empty when there are none
    pub fn history_context(turns: &[Turn]) -> String {
        if turns.is_empty() {
            return String::new();
        }

        let mut context = String::from("PREVIOUS CONVERSATION:\n");
        for turn in turns {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let _ = writeln!(context, "{}: {}", speaker, turn.content);
        }
        context
    }

    /// SQL generation prompt: history, request, schema and generation rules
    pub fn sql_prompt(
        user_input: &str,
        recent_turns: &[Turn],
        schema_prompt: &str,
        dialect: &str,
    ) -> String {
        let history_context = Self::history_context(recent_turns);

        format!(
            r#"You are an expert SQL programmer. Based on the user's natural language request, generate a valid, efficient {dialect} query.

{history_context}
USER REQUEST: "{user_input}"

{schema_prompt}
IMPORTANT:
1. Generate only a SELECT query - no other SQL statements
2. Return only the SQL query without any explanations or markdown formatting
3. Use proper JOIN syntax to connect related tables
4. Use the `DISTINCT` keyword if the result should contain unique rows, like a list of unique students or unique products.
5. Include appropriate WHERE clauses to filter results
6. Use meaningful column aliases when needed
7. Consider the conversation history when interpreting the current request

Now generate the SQL query for the user request above."#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_prompt() {
        let prompt = PromptGenerator::intent_prompt("show me all users");
        assert!(prompt.contains("'greeting'"));
        assert!(prompt.contains("'database_query'"));
        assert!(prompt.contains("'other'"));
        assert!(prompt.contains("User Input: \"show me all users\""));
    }

    #[test]
    fn test_conversational_prompt_has_examples() {
        let prompt = PromptGenerator::conversational_prompt("thanks");
        assert!(prompt.starts_with("The user's input is \"thanks\"."));
        assert!(prompt.contains("Ready when you are!"));
        assert!(prompt.ends_with("Response:"));
    }

    #[test]
    fn test_sql_prompt_without_history() {
        let prompt = PromptGenerator::sql_prompt(
            "how many users?",
            &[],
            "DATABASE SCHEMA:\n- users: id (INTEGER)\n",
            "SQLite",
        );
        assert!(prompt.contains("efficient SQLite query"));
        assert!(!prompt.contains("PREVIOUS CONVERSATION"));
        assert!(prompt.contains("USER REQUEST: \"how many users?\""));
        assert!(prompt.contains("- users: id (INTEGER)"));
        assert!(prompt.contains("7. Consider the conversation history"));
    }

    #[test]
    fn test_sql_prompt_with_history() {
        let turns = vec![
            Turn::user("list users in NZ"),
            Turn::assistant("I found 2 records"),
        ];
        let prompt = PromptGenerator::sql_prompt("and their orders?", &turns, "", "MySQL");
        assert!(prompt.contains(
            "PREVIOUS CONVERSATION:\nUser: list users in NZ\nAssistant: I found 2 records\n"
        ));
        let history_at = prompt.find("PREVIOUS CONVERSATION").unwrap();
        let request_at = prompt.find("USER REQUEST").unwrap();
        assert!(history_at < request_at);
    }
}
