use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::{Value, json};
use reqwest::Client;
use tracing::debug;
use crate::actions::{ChatBackend, ChatSession};
use crate::error::ModelError;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl ChatBackend for GeminiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn start_chat(&self, system_instruction: &str) -> Box<dyn ChatSession> {
        debug!(model = %self.model, "Starting Gemini chat");
        Box::new(GeminiSession {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            endpoint: format!("{}/models/{}:generateContent", self.base_url, self.model),
            system_instruction: system_instruction.to_string(),
            history: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub text: String,
}

/// 一次 Gemini 对话：历史只在请求成功后追加
#[derive(Debug)]
pub struct GeminiSession {
    client: Client,
    api_key: String,
    endpoint: String,
    system_instruction: String,
    history: Vec<ChatTurn>,
}

impl GeminiSession {
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    fn request_body(&self, content: &str) -> Value {
        let mut contents: Vec<Value> = self
            .history
            .iter()
            .map(|t| json!({ "role": t.role, "parts": [{ "text": t.text }] }))
            .collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": content }] }));

        let safety: Vec<Value> = HARM_CATEGORIES
            .iter()
            .map(|c| json!({ "category": c, "threshold": "BLOCK_NONE" }))
            .collect();

        json!({
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] },
            "contents": contents,
            "safetySettings": safety,
        })
    }
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send_message(&mut self, content: &str) -> Result<String, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(content))
            .send()
            .await
            .map_err(|e| ModelError::Backend(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Backend(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, &body));
        }

        let text = extract_text(&body)?;
        self.history.push(ChatTurn { role: "user".to_string(), text: content.to_string() });
        self.history.push(ChatTurn { role: "model".to_string(), text: text.clone() });
        Ok(text)
    }
}

/// 将 HTTP 失败映射为错误类别
pub fn classify_failure(status: u16, body: &str) -> ModelError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error_status = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/status"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let message = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(|v| v.as_str())
        .unwrap_or(body)
        .to_string();
    let detail = format!("{} {}", status, message);

    if status == 429 || error_status == "RESOURCE_EXHAUSTED" {
        ModelError::RateLimited(detail)
    } else if status == 404 || error_status == "NOT_FOUND" || message.to_lowercase().contains("not found") {
        ModelError::NotFound(detail)
    } else {
        ModelError::Backend(detail)
    }
}

/// Joins the text parts of the first candidate.
pub fn extract_text(body: &str) -> Result<String, ModelError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ModelError::Backend(format!("invalid response JSON: {}", e)))?;

    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = value
                .pointer("/candidates/0/finishReason")
                .or_else(|| value.pointer("/promptFeedback/blockReason"))
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            ModelError::Backend(format!("response has no text ({})", reason))
        })?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(classify_failure(429, body), ModelError::RateLimited(_)));
    }

    #[test]
    fn test_classify_unknown_model() {
        let body = r#"{"error": {"code": 404, "message": "models/gemini-x is not found", "status": "NOT_FOUND"}}"#;
        assert!(matches!(classify_failure(404, body), ModelError::NotFound(_)));
        assert!(matches!(classify_failure(400, "model Not Found"), ModelError::NotFound(_)));
    }

    #[test]
    fn test_classify_other() {
        assert!(matches!(classify_failure(500, "boom"), ModelError::Backend(_)));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}], "role": "model"}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "ab");
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let err = extract_text(body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_request_body_carries_history() {
        let backend = GeminiBackend::new("k".to_string(), DEFAULT_MODEL.to_string());
        let mut session = GeminiSession {
            client: Client::new(),
            api_key: "k".to_string(),
            endpoint: String::new(),
            system_instruction: "rules".to_string(),
            history: vec![
                ChatTurn { role: "user".to_string(), text: "hi".to_string() },
                ChatTurn { role: "model".to_string(), text: "hello".to_string() },
            ],
        };
        let body = session.request_body("next");
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "rules");
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(backend.model_name(), DEFAULT_MODEL);
        session.history.clear();
        assert!(session.history().is_empty());
    }
}
