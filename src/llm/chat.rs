use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::models::ChatMessage;

/// Request one chat completion and return the assistant's text.
/// `model` overrides `config.chat_model` so role profiles can pick a model.
pub async fn complete_chat(
    client: &reqwest::Client,
    config: &LlmConfig,
    model: &str,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    match config.provider.as_str() {
        "openai" => complete_openai(client, config, model, messages).await,
        "ollama" => complete_ollama(client, config, model, messages).await,
        other => anyhow::bail!("Unsupported LLM provider for chat: {other}"),
    }
}

// ─── OpenAI-compatible (Groq, OpenAI, vLLM, ...) ─────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

async fn complete_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    model: &str,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model,
        messages,
        temperature: config.temperature,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call chat completion API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Chat completion API returned {status}: {body}");
    }

    let body = resp
        .text()
        .await
        .context("Failed to read chat completion response")?;
    parse_openai_response(&body)
}

fn parse_openai_response(body: &str) -> Result<String> {
    let parsed: OpenAiChatResponse =
        serde_json::from_str(body).context("Failed to parse chat completion response")?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .context("Chat completion response contained no choices")
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

async fn complete_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    model: &str,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));

    let req = OllamaChatRequest {
        model,
        messages,
        stream: false,
        options: OllamaOptions {
            temperature: config.temperature,
        },
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body = resp.text().await.context("Failed to read Ollama response")?;
    parse_ollama_response(&body)
}

fn parse_ollama_response(body: &str) -> Result<String> {
    let parsed: OllamaChatResponse =
        serde_json::from_str(body).context("Failed to parse Ollama chat response")?;
    Ok(parsed.message.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Bonjour"},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_openai_response(body).unwrap(), "Bonjour");
    }

    #[test]
    fn test_parse_openai_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_openai_response(body).unwrap(), "");
    }

    #[test]
    fn test_parse_openai_no_choices() {
        let err = parse_openai_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn test_parse_openai_malformed() {
        assert!(parse_openai_response("{broken").is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        let body = r#"{"model":"llama3","message":{"role":"assistant","content":"Salut"},"done":true}"#;
        assert_eq!(parse_ollama_response(body).unwrap(), "Salut");
    }

    #[test]
    fn test_openai_request_shape() {
        let req = OpenAiChatRequest {
            model: "llama3-8b-8192",
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: 0.5,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "llama3-8b-8192");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.5);
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let client = reqwest::Client::new();
        let config = LlmConfig {
            provider: "bard".to_string(),
            ..LlmConfig::default()
        };
        let err = complete_chat(&client, &config, "m", Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported LLM provider"));
    }
}
