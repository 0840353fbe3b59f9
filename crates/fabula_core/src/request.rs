//! Request and response types for text generation.

use crate::Message;
use serde::{Deserialize, Serialize};

/// A single text-generation request.
///
/// `system` carries the role instructions; `messages` is the ordered list
/// of prior turns.
///
/// # Examples
///
/// ```
/// use fabula_core::{GenerateRequest, Message};
///
/// let request = GenerateRequest::builder()
///     .system("You are Agent A.")
///     .messages(vec![Message::user("It should hug gently")])
///     .max_tokens(1000u32)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.messages().len(), 1);
/// assert_eq!(*request.max_tokens(), Some(1000));
/// assert!(request.model().is_none());
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Default,
    derive_builder::Builder,
    derive_getters::Getters,
)]
#[builder(setter(into), default)]
pub struct GenerateRequest {
    /// Instructions for the model
    system: String,
    /// The conversation messages to send
    messages: Vec<Message>,
    /// Maximum number of tokens to generate
    #[builder(setter(into, strip_option))]
    max_tokens: Option<u32>,
    /// Sampling temperature (0.0 to 1.0)
    #[builder(setter(into, strip_option))]
    temperature: Option<f32>,
    /// Model identifier to use
    #[builder(setter(into, strip_option))]
    model: Option<String>,
}

impl GenerateRequest {
    /// Start building a request.
    pub fn builder() -> GenerateRequestBuilder {
        GenerateRequestBuilder::default()
    }
}

/// The text returned by a backend for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct GenerateResponse {
    /// Generated text
    text: String,
    /// Backend-reported reason generation stopped, if any
    stop_reason: Option<String>,
}

impl GenerateResponse {
    /// Create a response from generated text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stop_reason: None,
        }
    }

    /// Attach the backend's stop reason.
    pub fn with_stop_reason(mut self, reason: impl Into<String>) -> Self {
        self.stop_reason = Some(reason.into());
        self
    }

    /// Consume the response, returning the text.
    pub fn into_text(self) -> String {
        self.text
    }
}
