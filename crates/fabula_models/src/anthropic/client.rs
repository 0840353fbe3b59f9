use super::{AnthropicMessage, AnthropicRequest, AnthropicResponse};
use fabula_core::{GenerateRequest, GenerateResponse, Role};
use fabula_error::{FabulaResult, ModelError, ModelErrorKind};
use fabula_interface::FabulaDriver;
use reqwest::Client;
use tracing::{debug, error, instrument};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Environment variable holding the API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Anthropic API client.
///
/// System-tagged turns in a [`GenerateRequest`] are folded into the
/// top-level `system` parameter, since the Messages API only accepts user
/// and assistant turns in the conversation.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_url: String,
}

impl AnthropicClient {
    /// Creates a new Anthropic client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `model` - Model identifier (e.g., "claude-3-opus-20240229")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        debug!("Creating new Anthropic client");
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Creates a client reading the key from `ANTHROPIC_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ModelError> {
        let api_key = std::env::var(ANTHROPIC_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ModelError::new(ModelErrorKind::MissingApiKey(
                    ANTHROPIC_API_KEY_ENV.to_string(),
                ))
            })?;
        Ok(Self::new(api_key, model))
    }

    /// Default token limit used when a request does not set one.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Point the client at a different endpoint (proxies, gateways).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Sends a request to the Anthropic API.
    #[instrument(skip(self, request), fields(model = %request.model()))]
    pub async fn generate_anthropic(
        &self,
        request: &AnthropicRequest,
    ) -> Result<AnthropicResponse, ModelError> {
        debug!("Sending request to Anthropic API");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to send request to Anthropic API");
                ModelError::new(ModelErrorKind::Http(format!("Request failed: {}", e)))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Anthropic API returned error");
            return Err(ModelError::new(ModelErrorKind::Api {
                status: status.as_u16(),
                message: body,
            }));
        }

        let anthropic_response: AnthropicResponse = response.json().await.map_err(|e| {
            error!(error = ?e, "Failed to parse Anthropic response");
            ModelError::new(ModelErrorKind::Parse(format!(
                "Failed to parse response: {}",
                e
            )))
        })?;

        debug!(response_id = %anthropic_response.id(), "Received response from Anthropic");
        Ok(anthropic_response)
    }

    /// Converts a generic request to the Anthropic wire shape.
    fn convert_request(&self, request: &GenerateRequest) -> Result<AnthropicRequest, ModelError> {
        let mut system_parts: Vec<&str> = Vec::new();
        if !request.system().trim().is_empty() {
            system_parts.push(request.system());
        }

        let mut messages = Vec::with_capacity(request.messages().len());
        for msg in request.messages() {
            let role = match msg.role() {
                Role::System => {
                    system_parts.push(msg.content());
                    continue;
                }
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let message = AnthropicMessage::builder()
                .role(role)
                .content(msg.content().clone())
                .build()
                .map_err(|e| ModelError::new(ModelErrorKind::Builder(e.to_string())))?;
            messages.push(message);
        }

        if messages.is_empty() {
            return Err(ModelError::new(ModelErrorKind::Builder(
                "Request must contain at least one user or assistant turn".to_string(),
            )));
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        AnthropicRequest::builder()
            .model(request.model().clone().unwrap_or_else(|| self.model.clone()))
            .max_tokens(request.max_tokens().unwrap_or(self.max_tokens))
            .messages(messages)
            .system(system)
            .temperature(*request.temperature())
            .build()
            .map_err(|e| ModelError::new(ModelErrorKind::Builder(e.to_string())))
    }

    /// Joins the text blocks of a response.
    fn convert_response(response: AnthropicResponse) -> Result<GenerateResponse, ModelError> {
        let text: String = response
            .content()
            .iter()
            .filter_map(|block| block.text().as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ModelError::new(ModelErrorKind::EmptyResponse));
        }

        let generated = GenerateResponse::new(text);
        Ok(match response.stop_reason() {
            Some(reason) => generated.with_stop_reason(reason.clone()),
            None => generated,
        })
    }
}

#[async_trait::async_trait]
impl FabulaDriver for AnthropicClient {
    #[instrument(skip(self, request), fields(model = %self.model, turns = request.messages().len()))]
    async fn generate(&self, request: &GenerateRequest) -> FabulaResult<GenerateResponse> {
        debug!("Generating response with Anthropic");

        let anthropic_request = self.convert_request(request)?;
        let anthropic_response = self.generate_anthropic(&anthropic_request).await?;
        let response = Self::convert_response(anthropic_response)?;

        Ok(response)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabula_core::Message;

    fn client() -> AnthropicClient {
        AnthropicClient::new("test-key", "claude-3-opus-20240229")
    }

    #[test]
    fn system_turns_fold_into_system_parameter() {
        let request = GenerateRequest::builder()
            .system("You are Agent B. Write the story.")
            .messages(vec![
                Message::user("It should purr [CONTINUATION]"),
                Message::system("Parameter Info: Comfort"),
            ])
            .build()
            .unwrap();

        let converted = client().convert_request(&request).unwrap();

        assert_eq!(converted.messages().len(), 1);
        assert_eq!(converted.messages()[0].role(), "user");
        assert_eq!(
            converted.system().as_deref(),
            Some("You are Agent B. Write the story.\n\nParameter Info: Comfort")
        );
        assert_eq!(*converted.max_tokens(), DEFAULT_MAX_TOKENS);
        assert_eq!(converted.model(), "claude-3-opus-20240229");
    }

    #[test]
    fn request_overrides_model_and_token_limit() {
        let request = GenerateRequest::builder()
            .messages(vec![Message::user("hello")])
            .model("claude-3-haiku-20240307")
            .max_tokens(64u32)
            .temperature(0.5f32)
            .build()
            .unwrap();

        let converted = client().convert_request(&request).unwrap();

        assert_eq!(converted.model(), "claude-3-haiku-20240307");
        assert_eq!(*converted.max_tokens(), 64);
        assert_eq!(*converted.temperature(), Some(0.5));
        assert!(converted.system().is_none());
    }

    #[test]
    fn request_without_conversation_turns_is_rejected() {
        let request = GenerateRequest::builder()
            .system("instructions only")
            .messages(vec![Message::system("context only")])
            .build()
            .unwrap();

        let err = client().convert_request(&request).unwrap_err();
        assert!(matches!(err.kind, ModelErrorKind::Builder(_)));
    }

    #[test]
    fn response_text_blocks_are_joined() {
        let response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-opus-20240229",
            "stop_reason": "end_turn",
            "content": [
                {"type": "text", "text": "STORY: The robot "},
                {"type": "text", "text": "hummed."}
            ]
        }))
        .unwrap();

        let converted = AnthropicClient::convert_response(response).unwrap();
        assert_eq!(converted.text(), "STORY: The robot hummed.");
        assert_eq!(converted.stop_reason().as_deref(), Some("end_turn"));
    }

    #[test]
    fn blank_response_is_an_error() {
        let response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_2",
            "model": "claude-3-opus-20240229",
            "content": [{"type": "text", "text": "   "}]
        }))
        .unwrap();

        let err = AnthropicClient::convert_response(response).unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::EmptyResponse);
    }
}
