use std::sync::Arc;

use tracing::instrument;

use taxthink_core::chat::{ChatMessage, ChatProvider, ChatRequest};
use taxthink_core::errors::GenerationError;
use taxthink_core::reply::StructuredReply;
use taxthink_core::types::{Currency, Jurisdiction};

use crate::profiles;

const TEMPERATURE: f32 = 0.7;
const MAX_REPLY_TOKENS: u32 = 2000;
/// At most this many stored turns are forwarded to the generator.
const HISTORY_WINDOW: usize = 10;

pub const WELCOME_THINKING_MODE: &str = "Welcome & Setup";

/// Turns a user message plus short conversation history into a structured
/// assistant reply. Stateless per call; history is supplied by the caller.
pub struct ConversationService {
    provider: Arc<dyn ChatProvider>,
}

impl ConversationService {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Generate the assistant turn for a user message.
    ///
    /// Provider failures and unparseable replies surface as
    /// `GenerationError`; no retries happen at this layer.
    #[instrument(skip_all, fields(provider = self.provider.name(), turns = history.len()))]
    pub async fn generate_response(
        &self,
        jurisdiction: Jurisdiction,
        currency: Currency,
        user_message: &str,
        history: &[ChatMessage],
    ) -> Result<StructuredReply, GenerationError> {
        let tail = history.len().saturating_sub(HISTORY_WINDOW);

        let mut messages = Vec::with_capacity(history.len() - tail + 2);
        messages.push(ChatMessage::system(profiles::system_prompt(jurisdiction, currency)));
        messages.extend_from_slice(&history[tail..]);
        messages.push(ChatMessage::user(user_message));

        let raw = self
            .provider
            .complete(&ChatRequest {
                messages,
                temperature: TEMPERATURE,
                max_tokens: MAX_REPLY_TOKENS,
                json_output: true,
            })
            .await?;

        StructuredReply::from_model_json(&raw)
            .map_err(|e| GenerationError::MalformedReply(e.to_string()))
    }

    /// Deterministic greeting for a freshly created session. Local only; the
    /// generator is not consulted.
    pub fn welcome_message(
        &self,
        jurisdiction: Jurisdiction,
        currency: Currency,
    ) -> StructuredReply {
        let profile = profiles::profile(jurisdiction);
        let name = jurisdiction.display_name();

        let content = format!(
            "Welcome! I'm your AI thinking companion for tax-related matters. \
             I'm currently configured for **{name}** tax jurisdiction with \
             **{code}** currency.\n\n\
             I can help you think through various tax scenarios including:\n\
             - Personal tax planning and optimization\n\
             - Business expense deductions and structuring\n\
             - Compliance requirements and deadlines\n\
             - {examples}\n\n\
             What tax situation would you like to think through today? I'll ask \
             contextual questions to help structure your thinking process.",
            code = currency.code(),
            examples = profile.welcome_examples,
        );

        StructuredReply {
            content,
            thinking_mode: WELCOME_THINKING_MODE.to_string(),
            categories: vec!["setup".to_string()],
            action_items: vec!["Describe your tax situation or ask a specific question".to_string()],
            key_insights: vec![format!("Configured for {name} tax context")],
            next_questions: vec!["What specific tax area would you like to explore?".to_string()],
        }
    }
}
