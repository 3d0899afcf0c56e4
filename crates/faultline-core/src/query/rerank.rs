//! Optional LLM reranking of the lexical top candidates.
//!
//! The reranker is best-effort: any failure is logged and reported as
//! `None`, and the caller keeps its own ordering.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::errors::{FaultlineError, FaultlineResult};
use crate::query::guards::{truncate_chars, MAX_RERANK_RESULTS};

const RERANK_MAX_TOKENS: u32 = 256;

const SYSTEM_PROMPT: &str = "You localize bugs in source repositories. Given an issue and a \
list of candidate file paths, answer with a JSON array of at most 5 paths from the list, most \
likely to need a fix first. Answer with the JSON array only.";

/// Reorders candidate paths for an issue.
pub trait Reranker {
    /// `None` means no usable answer; callers fall back to their own order.
    fn rerank(&self, issue_text: &str, candidates: &[String]) -> Option<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Pull the first well-formed JSON array out of free-form model output.
///
/// Non-string elements are dropped and the list is cut to five entries.
/// An empty result is `None`.
pub fn parse_rerank_content(content: &str) -> Option<Vec<String>> {
    for (offset, _) in content.match_indices('[') {
        let mut stream = serde_json::Deserializer::from_str(&content[offset..]).into_iter::<Value>();
        let Some(Ok(Value::Array(items))) = stream.next() else {
            continue;
        };
        let paths: Vec<String> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .take(MAX_RERANK_RESULTS)
            .collect();
        return if paths.is_empty() { None } else { Some(paths) };
    }
    None
}

/// Chat-completion backed reranker.
pub struct LlmReranker {
    config: LlmConfig,
    client: Client,
}

impl LlmReranker {
    pub fn new(config: LlmConfig) -> FaultlineResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(FaultlineError::InvalidInput(
                "llm endpoint must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { config, client })
    }

    fn build_body(&self, issue_text: &str, candidates: &[String]) -> Value {
        let issue = truncate_chars(issue_text, self.config.max_issue_chars);
        let listing = candidates
            .iter()
            .map(|path| format!("- {path}"))
            .collect::<Vec<_>>()
            .join("\n");
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Issue:\n{issue}\n\nCandidate files:\n{listing}"),
                },
            ],
            "max_tokens": RERANK_MAX_TOKENS,
            "temperature": 0,
        })
    }

    fn request(&self, body: &Value) -> FaultlineResult<String> {
        let mut request = self.client.post(&self.config.endpoint).json(body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FaultlineError::Tool(format!("llm endpoint returned {status}")));
        }
        let parsed: ChatResponse = serde_json::from_str(&response.text()?)?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

impl Reranker for LlmReranker {
    fn rerank(&self, issue_text: &str, candidates: &[String]) -> Option<Vec<String>> {
        if candidates.is_empty() {
            return None;
        }
        let body = self.build_body(issue_text, candidates);
        let content = match self.request(&body) {
            Ok(content) => content,
            Err(e) => {
                warn!(endpoint = %self.config.endpoint, error = %e, "llm rerank request failed");
                return None;
            }
        };
        let parsed = parse_rerank_content(&content);
        match &parsed {
            Some(paths) => debug!(count = paths.len(), "llm rerank succeeded"),
            None => warn!("llm rerank returned no usable path list"),
        }
        parsed
    }
}
