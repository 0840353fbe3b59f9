//! Live Anthropic API checks. Run with `--features anthropic,api`.

#![cfg(feature = "anthropic")]

use fabula_core::{GenerateRequest, Message};
use fabula_interface::FabulaDriver;
use fabula_models::AnthropicClient;

#[tokio::test]
#[cfg_attr(not(feature = "api"), ignore)]
async fn tagged_reply_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let client = AnthropicClient::from_env("claude-3-haiku-20240307")?.with_max_tokens(100);
    let request = GenerateRequest::builder()
        .system("You are Agent A. Reply with one line that starts with 'PARAMETER:'.")
        .messages(vec![Message::user("It should hum softly when I am sad [NEW STORY]")])
        .build()?;

    let response = client.generate(&request).await?;

    assert!(response.text().contains("PARAMETER:"));
    assert_eq!(client.provider_name(), "anthropic");
    Ok(())
}

#[test]
fn missing_key_is_reported() {
    // Only meaningful when the key is absent from the environment.
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        let err = AnthropicClient::from_env("claude-3-haiku-20240307").unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
