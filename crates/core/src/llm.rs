use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::warn;

const SYSTEM_PROMPT: &str = "你是简历信息抽取助手，只能输出严格 JSON。禁止输出说明、示例、Markdown 或 ``` 代码块。所有阶段一律使用中文输出字段内容；但专有名词（公司/机构/学校/产品/技术/人名等）保持原文，不要翻译。";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Stateless best-effort text-completion oracle. Absent credentials mean the
/// oracle is unavailable and every dependent step takes its fallback path.
#[derive(Clone)]
pub struct LlmClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Arc::new(
                Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .build()
                    .unwrap_or_default(),
            ),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_env() -> Option<Self> {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self::from_env_with_model(&model)
    }

    pub fn from_env_with_model(model: &str) -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return None;
        }
        let base_url = std::env::var("OPENAI_BASE_URL").ok().and_then(|value| {
            let value = value.trim().trim_end_matches('/').to_string();
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        });
        Some(Self::new(api_key, base_url, model))
    }

    /// One chat completion at temperature zero. Any transport or payload
    /// failure is logged and collapses to `None`; callers treat that as
    /// "no data".
    pub async fn complete(&self, prompt: &str, text: &str, max_tokens: Option<u32>) -> Option<String> {
        let mut body = json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("{prompt}\n\n<文本开始>\n{text}\n<文本结束>")},
            ],
        });
        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                warn!(model = %self.model, %error, "llm request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(model = %self.model, status = %response.status(), "llm request rejected");
            return None;
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(error) => {
                warn!(model = %self.model, %error, "llm response unreadable");
                return None;
            }
        };

        payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.to_string())
            .filter(|content| !content.trim().is_empty())
    }
}

#[async_trait::async_trait]
impl crate::traits::ChatModel for LlmClient {
    async fn complete(&self, prompt: &str, text: &str, max_tokens: Option<u32>) -> Option<String> {
        LlmClient::complete(self, prompt, text, max_tokens).await
    }
}

static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(.*?)```").expect("valid regex")
});
static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

pub fn strip_code_fences(text: &str) -> String {
    if let Some(captures) = CODE_FENCE_RE.captures(text) {
        return captures[1].trim().to_string();
    }
    text.trim().to_string()
}

fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA_RE.replace_all(text, "$1").to_string()
}

fn parse_span(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&strip_trailing_commas(&text[start..=end])).ok()
}

/// Repair-and-parse for free-text model output: strip code fences, trim
/// trailing commas, and as a last resort take the outermost `{..}` or `[..]`
/// span. Unparsable output is `None`, never an error.
pub fn extract_json_value(text: &str) -> Option<Value> {
    let cleaned = strip_trailing_commas(&strip_code_fences(text));
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Some(value);
    }
    parse_span(&cleaned, '{', '}').or_else(|| parse_span(&cleaned, '[', ']'))
}

pub fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    match extract_json_value(text)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_with_trailing_comma_parses() {
        let fenced = "```json\n{\"name\": \"张三\", \"skills\": [\"Rust\",],}\n```";
        let bare = "{\"name\": \"张三\", \"skills\": [\"Rust\"]}";
        assert_eq!(
            extract_json_value(fenced).unwrap(),
            extract_json_value(bare).unwrap()
        );
    }

    #[test]
    fn outermost_span_recovers_chatty_output() {
        let text = "好的，结果如下：{\"overseas\": true} 希望有帮助";
        let value = extract_json_value(text).unwrap();
        assert_eq!(value["overseas"], serde_json::json!(true));
    }

    #[test]
    fn garbage_is_none_not_error() {
        assert!(extract_json_value("this is not json").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
    }
}
