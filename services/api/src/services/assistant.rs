use std::sync::Arc;

use civisure_auth::Identity;
use civisure_common::{AppError, AssistantConfig, ChatRole};
use civisure_database::{ChatConversation, ConversationTurn, DbPool};

use crate::completion::{CompletionClient, CompletionMessage, CompletionRequest};
use crate::models::{AssistantReply, ChatMessageRequest};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

pub const SYSTEM_PROMPT: &str = "\
You are a helpful legal assistant for CiviSure, a public safety platform. Your role is to:

1. Provide general information about human rights and legal procedures
2. Guide users on how to file complaints and cases
3. Explain legal terminology in simple terms
4. Offer information about legal aid and resources
5. Help users understand their rights in various situations

Important guidelines:
- Always clarify that you provide general information, not legal advice
- Encourage users to consult with licensed attorneys for specific legal matters
- Be empathetic and supportive, especially for victims of crime
- Provide accurate, helpful information based on general legal principles
- If asked about specific cases, remind users to seek professional legal counsel
- Focus on human rights, criminal law basics, and legal procedures

Be concise, clear, and helpful. Use simple language that everyone can understand.";

pub const SUGGESTIONS: [&str; 10] = [
    "What are my basic human rights?",
    "How do I file an FIR (First Information Report)?",
    "What should I do if I'm a victim of theft?",
    "What is the process for filing a complaint against police misconduct?",
    "How can I get legal aid if I can't afford a lawyer?",
    "What are my rights during police questioning?",
    "How do I report domestic violence?",
    "What is the difference between bailable and non-bailable offenses?",
    "What are consumer rights and how do I file a complaint?",
    "How can I check the status of my case?",
];

/// Prior turns (optionally only the trailing `window`) followed by the new user message.
pub fn build_messages(
    history: Vec<ConversationTurn>,
    message: &str,
    window: Option<usize>,
) -> Vec<CompletionMessage> {
    let skip = window.map_or(0, |w| history.len().saturating_sub(w));

    history
        .into_iter()
        .skip(skip)
        .map(|turn| CompletionMessage {
            role: turn.role,
            content: turn.content,
        })
        .chain(std::iter::once(CompletionMessage {
            role: ChatRole::User,
            content: message.to_string(),
        }))
        .collect()
}

#[derive(Clone)]
pub struct AssistantService {
    db: DbPool,
    client: Option<Arc<dyn CompletionClient>>,
    history_window: Option<usize>,
}

impl AssistantService {
    pub fn new(db: DbPool, client: Option<Arc<dyn CompletionClient>>, config: &AssistantConfig) -> Self {
        Self {
            db,
            client,
            history_window: config.history_window,
        }
    }

    pub async fn send_message(
        &self,
        caller: &Identity,
        request: ChatMessageRequest,
    ) -> Result<AssistantReply, AppError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("Message is required".to_string()));
        }

        let client = self.client.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable(
                "Chatbot service is not configured. Please set ANTHROPIC_API_KEY in environment variables."
                    .to_string(),
            )
        })?;

        let messages = build_messages(request.conversation_history, message, self.history_window);
        tracing::debug!("Forwarding {} messages for user {}", messages.len(), caller.user_id);

        let response = client
            .complete(CompletionRequest {
                system: SYSTEM_PROMPT.to_string(),
                messages,
            })
            .await?;

        let conversation_id: i64 = sqlx::query_scalar(
            "INSERT INTO chat_conversations (user_id, message, response) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(caller.user_id)
        .bind(message)
        .bind(&response)
        .fetch_one(&self.db)
        .await?;

        Ok(AssistantReply {
            response,
            conversation_id,
        })
    }

    pub async fn history(&self, caller: &Identity, limit: Option<i64>) -> Result<Vec<ChatConversation>, AppError> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_HISTORY_LIMIT);

        Ok(sqlx::query_as::<_, ChatConversation>(
            r#"
            SELECT id, message, response, created_at
            FROM chat_conversations
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(caller.user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn clear(&self, caller: &Identity) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM chat_conversations WHERE user_id = ?")
            .bind(caller.user_id)
            .execute(&self.db)
            .await?;

        tracing::info!("Cleared {} chat exchanges for user {}", result.rows_affected(), caller.user_id);
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: ChatRole, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.to_string(),
        }
    }

    fn history() -> Vec<ConversationTurn> {
        vec![
            turn(ChatRole::User, "one"),
            turn(ChatRole::Assistant, "two"),
            turn(ChatRole::User, "three"),
            turn(ChatRole::Assistant, "four"),
        ]
    }

    #[test]
    fn whole_history_is_forwarded_by_default() {
        let messages = build_messages(history(), "five", None);

        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three", "four", "five"]);
        assert_eq!(messages.last().unwrap().role, ChatRole::User);
    }

    #[test]
    fn window_keeps_trailing_turns() {
        let messages = build_messages(history(), "five", Some(2));

        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["three", "four", "five"]);
    }

    #[test]
    fn window_larger_than_history_keeps_everything() {
        assert_eq!(build_messages(history(), "x", Some(50)).len(), 5);
        assert_eq!(build_messages(Vec::new(), "x", Some(0)).len(), 1);
    }

    #[test]
    fn prompt_disclaims_legal_advice() {
        assert!(SYSTEM_PROMPT.contains("not legal advice"));
        assert_eq!(SUGGESTIONS.len(), 10);
    }
}
