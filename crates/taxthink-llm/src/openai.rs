use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use taxthink_core::chat::{ChatMessage, ChatProvider, ChatRequest};
use taxthink_core::errors::GenerationError;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
// The generation dependency can hang; every request carries this ceiling.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    api_url: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: SecretString, model: Option<&str>, api_url: Option<&str>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            api_url: api_url.unwrap_or(API_URL).to_string(),
        }
    }

    fn build_body<'a>(&'a self, request: &'a ChatRequest) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_output
                .then_some(ResponseFormat { format_type: "json_object" }),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(REQUEST_TIMEOUT)
                } else {
                    GenerationError::NetworkError(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status, body));
        }

        let completion: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::MalformedReply(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerationError::EmptyReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxthink_core::chat::ChatMessage;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(SecretString::from("test-key"), None, None)
    }

    fn request(json_output: bool) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: 0.7,
            max_tokens: 2000,
            json_output,
        }
    }

    #[test]
    fn provider_properties() {
        let p = provider();
        assert_eq!(p.name(), "openai");
        assert_eq!(p.model(), "gpt-4o");
        assert_eq!(p.api_url, API_URL);
    }

    #[test]
    fn model_and_url_overrides() {
        let p = OpenAiProvider::new(
            SecretString::from("test-key"),
            Some("gpt-4o-mini"),
            Some("http://127.0.0.1:1/v1/chat/completions"),
        );
        assert_eq!(p.model(), "gpt-4o-mini");
        assert_eq!(p.api_url, "http://127.0.0.1:1/v1/chat/completions");
    }

    #[test]
    fn body_includes_json_response_format() {
        let p = provider();
        let req = request(true);
        let body = serde_json::to_value(p.build_body(&req)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6, "got {temperature}");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn body_omits_response_format_for_plain_text() {
        let p = provider();
        let req = request(false);
        let body = serde_json::to_value(p.build_body(&req)).unwrap();
        assert!(body.get("response_format").is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        // Port 1 on loopback refuses connections immediately.
        let p = OpenAiProvider::new(
            SecretString::from("test-key"),
            None,
            Some("http://127.0.0.1:1/v1/chat/completions"),
        );
        let err = p.complete(&request(true)).await.unwrap_err();
        assert!(
            matches!(err, GenerationError::NetworkError(_) | GenerationError::Timeout(_)),
            "got: {err:?}"
        );
    }

    #[test]
    fn timeout_constants() {
        assert_eq!(CONNECT_TIMEOUT, Duration::from_secs(30));
        assert_eq!(REQUEST_TIMEOUT, Duration::from_secs(120));
    }
}
