//! OpenAI-backed question source
//!
//! Each batch is one JSON-mode chat completion. The model is asked for an
//! object `{"questions": [{prompt, options, answer, explanation}]}`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tutorhub_shared::models::assessment::NewQuestion;
use tutorhub_shared::providers::openai::ChatMessage;
use tutorhub_shared::providers::{OpenAiClient, ProviderError};

use crate::generator::{BatchRequest, QuestionSource};

const SYSTEM_PROMPT: &str = "You write assessment questions for tutoring sessions. \
Reply with a JSON object of the form {\"questions\": [{\"prompt\": string, \"options\": [string], \
\"answer\": string, \"explanation\": string}]}. Use four options for multiple choice questions and \
an empty options list for open questions. The answer must match one option exactly when options are given.";

pub struct OpenAiQuestionSource {
    client: OpenAiClient,
}

impl OpenAiQuestionSource {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

/// Chat messages for one batch
pub fn build_messages(request: &BatchRequest) -> Vec<ChatMessage> {
    let mut prompt = format!(
        "Write {} new questions.\nSubject: {}\nTopic: {}\nLevel: {}",
        request.count, request.subject, request.topic, request.level
    );

    if !request.avoid.is_empty() {
        prompt.push_str("\nDo not repeat any of these questions:");
        for existing in &request.avoid {
            prompt.push_str("\n- ");
            prompt.push_str(existing);
        }
    }

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

#[derive(Debug, Deserialize)]
struct QuestionsEnvelope {
    questions: Vec<NewQuestion>,
}

/// Reads the `questions` array of a chat reply
pub fn parse_questions(content: Value) -> Result<Vec<NewQuestion>, ProviderError> {
    let envelope: QuestionsEnvelope = serde_json::from_value(content).map_err(|e| ProviderError::InvalidResponse {
        provider: "openai",
        message: format!("unexpected questions payload: {}", e),
    })?;

    Ok(envelope.questions)
}

#[async_trait]
impl QuestionSource for OpenAiQuestionSource {
    async fn generate(&self, request: &BatchRequest) -> Result<Vec<NewQuestion>, ProviderError> {
        let content = self.client.chat_json(&build_messages(request)).await?;
        parse_questions(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(avoid: Vec<String>) -> BatchRequest {
        BatchRequest {
            subject: "Math".into(),
            topic: "Fractions".into(),
            level: "Grade 5".into(),
            count: 3,
            avoid,
        }
    }

    #[test]
    fn test_build_messages() {
        let messages = build_messages(&request(vec![]));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.starts_with("Write 3 new questions."));
        assert!(messages[1].content.contains("Topic: Fractions"));
        assert!(!messages[1].content.contains("Do not repeat"));
    }

    #[test]
    fn test_build_messages_lists_existing_prompts() {
        let messages = build_messages(&request(vec!["What is 1/2 + 1/4?".into()]));
        assert!(messages[1].content.contains("Do not repeat"));
        assert!(messages[1].content.contains("- What is 1/2 + 1/4?"));
    }

    #[test]
    fn test_parse_questions() {
        let content = json!({
            "questions": [
                {
                    "prompt": "What is 1/2 + 1/4?",
                    "options": ["1/4", "3/4", "2/6", "1"],
                    "answer": "3/4",
                    "explanation": "Convert to quarters."
                },
                { "prompt": "Simplify 4/8.", "answer": "1/2" }
            ]
        });

        let questions = parse_questions(content).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options.len(), 4);
        assert!(questions[1].explanation.is_none());
    }

    #[test]
    fn test_parse_questions_rejects_other_shapes() {
        assert!(parse_questions(json!({ "items": [] })).is_err());
        assert!(parse_questions(json!({ "questions": [{ "answer": "4" }] })).is_err());
    }
}
