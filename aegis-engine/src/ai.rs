//! Generative-AI Backend
//!
//! Thin client for a generateContent-style HTTP API plus the helpers shared
//! by the two AI-assisted steps: threat escalation and natural-language mock
//! parsing. Model responses are free text; callers extract the embedded JSON
//! object and parse it strictly.

use crate::error::{EngineError, EngineResult};
use aegis_core::{CoreError, GenerativeConfig, MockRuleDraft};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A backend that turns a prompt into generated text
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> EngineResult<String>;
}

/// HTTP implementation against a generateContent-style endpoint
pub struct HttpGenerativeBackend {
    client: reqwest::Client,
    config: GenerativeConfig,
}

impl HttpGenerativeBackend {
    pub fn new(config: GenerativeConfig) -> Self {
        Self {
            // No request timeout: escalation is fire-and-forget and a hung
            // call never blocks request flow
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl GenerativeBackend for HttpGenerativeBackend {
    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        if self.config.api_key.is_empty() {
            return Err(EngineError::Generative("no API key configured".to_string()));
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.endpoint, self.config.model, self.config.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Generative(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Generative(format!(
                "backend returned {}",
                status
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Generative(format!("invalid response body: {}", e)))?;

        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| EngineError::Generative("no generated text in response".to_string()))
    }
}

/// Extract the JSON object embedded in a model response.
///
/// Strips markdown code fences, then takes the outermost `{...}` span,
/// provided it mentions the given marker field. Returns `None` when no such
/// object is present.
pub fn extract_json_object(text: &str, marker_field: &str) -> Option<String> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    let candidate = &cleaned[start..=end];
    if candidate.contains(&format!("\"{}\"", marker_field)) {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// Natural-language mock-command parser
///
/// Parsing is strict: when the model output cannot be read back as a rule
/// draft, the whole operation fails and no guessed rule is ever created.
pub struct MockCommandParser {
    backend: Arc<dyn GenerativeBackend>,
}

impl MockCommandParser {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    pub async fn parse(&self, command: &str) -> EngineResult<MockRuleDraft> {
        let text = self.backend.generate(&mock_prompt(command)).await?;
        debug!(response = %text, "mock parse response");

        let json = extract_json_object(&text, "urlPattern").ok_or_else(|| {
            CoreError::RuleParse("model response contains no rule object".to_string())
        })?;
        let draft: MockRuleDraft = serde_json::from_str(&json)
            .map_err(|e| CoreError::RuleParse(format!("invalid rule object: {}", e)))?;

        if draft.url_pattern.trim().is_empty() {
            return Err(CoreError::RuleParse("empty URL pattern".to_string()).into());
        }
        Ok(draft)
    }
}

fn mock_prompt(command: &str) -> String {
    format!(
        r#"Parse this API mocking command into structured data.

Command: "{command}"

Extract:
- URL pattern (the endpoint to mock, can include wildcards like /api/*)
- HTTP method (GET, POST, PUT, DELETE) if mentioned, otherwise null
- Response code (404, 500, 200, 401, etc.)
- Response body (if a specific response is mentioned)

Common examples:
- "Mock /api/users with 404" -> 404 error with {{"error": "Not Found"}}
- "Return 500 for /api/data" -> 500 error with {{"error": "Internal Server Error"}}
- "Mock /api/products with empty array" -> 200 with []
- "Return 401 unauthorized for /api/auth" -> 401 with {{"error": "Unauthorized"}}

Respond with JSON:
{{
  "urlPattern": "/api/users",
  "method": "GET" or null,
  "responseCode": 404,
  "responseBody": {{"error": "Not Found"}} or [] or null
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedBackend(String);

    #[async_trait]
    impl GenerativeBackend for CannedBackend {
        async fn generate(&self, _prompt: &str) -> EngineResult<String> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_extract_json_plain() {
        let json = extract_json_object(r#"{"verdict": "safe"}"#, "verdict").unwrap();
        assert_eq!(json, r#"{"verdict": "safe"}"#);
    }

    #[test]
    fn test_extract_json_with_fences_and_prose() {
        let text = "Here is my analysis:\n```json\n{\"verdict\": \"malicious\", \"confidence\": 0.9}\n```\nLet me know!";
        let json = extract_json_object(text, "verdict").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["confidence"], 0.9);
    }

    #[test]
    fn test_extract_json_missing_marker() {
        assert!(extract_json_object(r#"{"other": 1}"#, "verdict").is_none());
        assert!(extract_json_object("no braces here", "verdict").is_none());
    }

    #[tokio::test]
    async fn test_mock_parse_happy_path() {
        let parser = MockCommandParser::new(Arc::new(CannedBackend(
            r#"```json
{"urlPattern": "/api/users", "method": "GET", "responseCode": 404, "responseBody": {"error": "Not Found"}}
```"#
                .to_string(),
        )));
        let draft = parser.parse("Mock /api/users with 404").await.unwrap();
        assert_eq!(draft.url_pattern, "/api/users");
        assert_eq!(draft.method.as_deref(), Some("GET"));
        assert_eq!(draft.response_code, Some(404));
    }

    #[tokio::test]
    async fn test_mock_parse_strict_fail_on_garbage() {
        // A parse failure must fail the whole operation; no guessed default
        // rule is ever produced.
        let parser = MockCommandParser::new(Arc::new(CannedBackend(
            "I could not understand that command, sorry.".to_string(),
        )));
        assert!(parser.parse("gibberish").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_parse_rejects_empty_pattern() {
        let parser = MockCommandParser::new(Arc::new(CannedBackend(
            r#"{"urlPattern": "  ", "responseCode": 404}"#.to_string(),
        )));
        assert!(parser.parse("mock something").await.is_err());
    }

    #[tokio::test]
    async fn test_http_backend_requires_api_key() {
        let backend = HttpGenerativeBackend::new(GenerativeConfig::default());
        assert!(backend.generate("hello").await.is_err());
    }
}
