use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use taxthink_core::chat::{ChatProvider, ChatRequest};
use taxthink_core::errors::GenerationError;

/// Provider that replays pre-programmed replies in sequence and records the
/// requests it was handed, for deterministic tests without API calls.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: a single canned JSON reply.
    pub fn replying(raw: &str) -> Self {
        Self::new(vec![Ok(raw.to_string())])
    }

    /// Convenience: a single canned failure.
    pub fn failing(error: GenerationError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// The most recent request, if any call was made.
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        self.requests.lock().push(request.clone());
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(GenerationError::InvalidRequest(
                "MockProvider: no response configured for this call".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxthink_core::chat::ChatMessage;

    fn request(content: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user(content)],
            temperature: 0.7,
            max_tokens: 2000,
            json_output: true,
        }
    }

    #[tokio::test]
    async fn replays_responses_in_order() {
        let mock = MockProvider::new(vec![Ok("first".into()), Ok("second".into())]);
        assert_eq!(mock.complete(&request("a")).await.unwrap(), "first");
        assert_eq!(mock.complete(&request("b")).await.unwrap(), "second");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_responses_error() {
        let mock = MockProvider::replying("only one");
        let _ = mock.complete(&request("a")).await;
        let err = mock.complete(&request("b")).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn canned_failure_surfaces() {
        let mock = MockProvider::failing(GenerationError::ProviderOverloaded);
        let err = mock.complete(&request("a")).await.unwrap_err();
        assert!(matches!(err, GenerationError::ProviderOverloaded));
    }

    #[tokio::test]
    async fn records_requests() {
        let mock = MockProvider::replying("{}");
        mock.complete(&request("What can I deduct?")).await.unwrap();
        let last = mock.last_request().unwrap();
        assert_eq!(last.messages[0].content, "What can I deduct?");
        assert!(last.json_output);
    }

    #[test]
    fn provider_properties() {
        let mock = MockProvider::new(vec![]);
        assert_eq!(mock.name(), "mock");
        assert_eq!(mock.model(), "mock-model");
    }
}
