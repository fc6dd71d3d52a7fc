//! External segment scoring through an OpenAI-compatible chat API (DeepSeek).
//!
//! The client only moves text: it sends the prompt and returns the model's
//! reply verbatim. Parsing and validation belong to the selector.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use vidclip_models::VideoMetadata;

use crate::config::ScoringConfig;
use crate::error::{WorkerError, WorkerResult};

/// Input for one scoring call.
#[derive(Debug, Clone)]
pub struct ScoringRequest {
    pub title: String,
    pub duration_seconds: u64,
    pub description: String,
    pub segment_count: usize,
    pub min_segment_secs: u32,
    pub max_segment_secs: u32,
}

impl ScoringRequest {
    pub fn new(metadata: &VideoMetadata, config: &ScoringConfig) -> Self {
        Self {
            title: metadata.title.clone(),
            duration_seconds: metadata.duration_seconds,
            description: metadata.description.clone(),
            segment_count: config.segment_count,
            min_segment_secs: config.min_segment_secs,
            max_segment_secs: config.max_segment_secs,
        }
    }

    /// Prompt asking for a JSON object with a `clips` array.
    pub fn prompt(&self) -> String {
        format!(
            r#"Analyze this YouTube video and find {count} viral segments of {min}-{max} seconds, suited to TikTok and Shorts.

Title: {title}
Duration: {duration}s
Description: {description}

Choose segments that:
- Last {min}-{max} seconds
- Have high viral potential
- Are spread across the beginning, middle and end when possible
- Avoid slow moments and transitions
- Lie entirely within 0 and {duration} seconds

Reply with valid JSON only:
{{
  "clips": [
    {{
      "start_time": 5,
      "end_time": 20,
      "title": "Short viral moment",
      "description": "Why this segment is viral",
      "viral_score": 0.9
    }}
  ]
}}"#,
            count = self.segment_count,
            min = self.min_segment_secs,
            max = self.max_segment_secs,
            title = self.title,
            duration = self.duration_seconds,
            description = self.description,
        )
    }
}

/// Something that can propose scored segments as raw text.
#[async_trait]
pub trait SegmentScorer: Send + Sync {
    /// Returns the unparsed reply content.
    async fn score(&self, request: &ScoringRequest) -> WorkerResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// [`SegmentScorer`] backed by the DeepSeek chat completions endpoint.
pub struct DeepSeekScorer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl DeepSeekScorer {
    pub fn new(config: &ScoringConfig) -> WorkerResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| WorkerError::config_error("DEEPSEEK_API_KEY not set"))?;

        let base = Url::parse(&config.base_url)
            .map_err(|e| WorkerError::config_error(format!("invalid scoring base URL: {}", e)))?;
        let endpoint = format!("{}/chat/completions", base.as_str().trim_end_matches('/'));

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SegmentScorer for DeepSeekScorer {
    async fn score(&self, request: &ScoringRequest) -> WorkerResult<String> {
        info!(model = %self.model, title = %request.title, "Requesting segment scores");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt(),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkerError::scoring_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::scoring_failed(format!(
                "scoring API returned {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::scoring_failed(format!("failed to parse response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| WorkerError::scoring_failed("no choices in response"))?;

        debug!(chars = content.len(), "Received scoring reply");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ScoringConfig {
        ScoringConfig {
            api_key: Some("test-key".to_string()),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn request() -> ScoringRequest {
        ScoringRequest {
            title: "Me at the zoo".to_string(),
            duration_seconds: 19,
            description: "elephants".to_string(),
            segment_count: 3,
            min_segment_secs: 10,
            max_segment_secs: 30,
        }
    }

    #[test]
    fn test_prompt_carries_video_context() {
        let prompt = request().prompt();
        assert!(prompt.contains("Title: Me at the zoo"));
        assert!(prompt.contains("Duration: 19s"));
        assert!(prompt.contains("\"clips\""));
        assert!(prompt.contains("find 3 viral segments of 10-30 seconds"));
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = ScoringConfig::default();
        assert!(matches!(
            DeepSeekScorer::new(&config),
            Err(WorkerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let scorer = DeepSeekScorer::new(&config("https://api.deepseek.com/v1/")).unwrap();
        assert_eq!(scorer.endpoint(), "https://api.deepseek.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_score_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "deepseek-chat", "max_tokens": 1000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"clips\": []}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scorer = DeepSeekScorer::new(&config(&server.uri())).unwrap();
        let content = scorer.score(&request()).await.unwrap();
        assert_eq!(content, "{\"clips\": []}");
    }

    #[tokio::test]
    async fn test_score_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let scorer = DeepSeekScorer::new(&config(&server.uri())).unwrap();
        let err = scorer.score(&request()).await.unwrap_err();
        assert!(matches!(err, WorkerError::ScoringFailed(ref m) if m.contains("401")));
    }

    #[tokio::test]
    async fn test_score_rejects_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let scorer = DeepSeekScorer::new(&config(&server.uri())).unwrap();
        assert!(scorer.score(&request()).await.is_err());
    }
}
