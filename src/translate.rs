//! Translation of titles and abstracts through a chat-completion API.
//!
//! The endpoint is OpenAI-compatible (`POST {api_url}/chat/completions`).
//! Translation is best effort: every failure is logged and reported as
//! `None`, never as an error.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::TranslationConfig;
use crate::utils::{HttpClient, USER_AGENT};

/// Request timeout for one translation
const TRANSLATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Client for English to Chinese translation
#[derive(Debug, Clone)]
pub struct TranslationClient {
    client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

impl TranslationClient {
    pub fn new(config: &TranslationConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::with_timeout(USER_AGENT, TRANSLATION_TIMEOUT)?,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Whether an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn prompt(text: &str) -> String {
        format!(
            "Translate the following English text into Chinese. Reply with the translation only, without any explanation:\n\n{}",
            text
        )
    }

    /// Translate `text` into Chinese.
    ///
    /// Blank input gives `Some("")` without a request. Without an API key,
    /// or when the request fails, the result is `None`.
    pub async fn translate(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return Some(String::new());
        }

        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("Translation skipped: no API key configured");
            return None;
        };

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::prompt(text),
            }],
        };

        let response = match self
            .client
            .post(&format!("{}/chat/completions", self.api_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Translation request failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Translation failed: {} - {}", status, body);
            return None;
        }

        match response.json::<ChatResponse>().await {
            Ok(body) => body
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content.trim().to_string()),
            Err(e) => {
                tracing::warn!("Failed to parse translation response: {}", e);
                None
            }
        }
    }

    /// Translate several texts one after another
    pub async fn translate_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Option<String>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.translate(text.as_ref()).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str, key: Option<&str>) -> TranslationClient {
        TranslationClient::new(&TranslationConfig {
            api_key: key.map(str::to_string),
            api_url: format!("{}/", url),
            model: "qwen-plus".to_string(),
            auto_translate: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_translate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "qwen-plus"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "  深度学习 \n"}}]}"#)
            .create_async()
            .await;

        let translator = client(&server.url(), Some("secret"));
        assert_eq!(translator.translate("Deep learning").await.as_deref(), Some("深度学习"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blank_text_and_missing_key() {
        let translator = client("http://127.0.0.1:9", None);

        assert!(!translator.is_configured());
        assert_eq!(translator.translate("   ").await.as_deref(), Some(""));
        assert_eq!(translator.translate("hello").await, None);
    }

    #[tokio::test]
    async fn test_failures_become_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("invalid key")
            .create_async()
            .await;

        let translator = client(&server.url(), Some("wrong"));
        let results = translator.translate_batch(&["a", "", "b"]).await;
        assert_eq!(results, vec![None, Some(String::new()), None]);
    }
}
