//! Page text generation via an OpenAI-compatible chat completion API.
//!
//! One completion per connector, no retries. A response with no choices,
//! blank content, or no `[Title]` label is treated as a generation failure.

mod prompt;
mod types;

use std::time::{Duration, Instant};

use pagesmith_shared::{
    BrandConfig, ConnectorRecord, GeneratedPage, LlmConfig, PagesmithError, ResearchResult,
    Result, ServiceEndpoint, StageSpend, TokenUsage,
};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

pub use prompt::{Prompt, SECTION_LABELS, build_prompt};
pub use types::{ChatRequest, Message, Usage, strip_code_fence};

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("Pagesmith/", env!("CARGO_PKG_VERSION"));

/// Label whose presence marks a well-formed completion.
const TITLE_MARKER: &str = "[Title]";

/// Generates page text for connectors.
#[derive(Debug, Clone)]
pub struct ContentGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    brand: BrandConfig,
}

impl ContentGenerator {
    pub fn new(config: &LlmConfig, endpoint: &ServiceEndpoint, brand: &BrandConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                PagesmithError::Generation(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: endpoint.base_url.clone(),
            api_key: endpoint.token.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            brand: brand.clone(),
        })
    }

    /// Model identifier requests are sent with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the prompt for `record` and run one completion.
    #[instrument(skip_all, fields(connector = %record.name, model = %self.model))]
    pub async fn generate(
        &self,
        record: &ConnectorRecord,
        research: &ResearchResult,
    ) -> Result<GeneratedPage> {
        let prompt = build_prompt(record, research, &self.brand);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::system(prompt.system), Message::user(prompt.user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let start = Instant::now();
        let raw = self.chat_completion(&request).await?;

        let usage = raw
            .usage
            .map(|u| TokenUsage {
                tokens_in: u.prompt_tokens,
                tokens_out: u.completion_tokens,
            })
            .unwrap_or_default();

        // A rejected completion was still billed.
        let malformed =
            |msg: String| PagesmithError::Generation(msg).with_spend(StageSpend::tokens(usage));

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| malformed("completion has no content".into()))?;

        let text = strip_code_fence(&content);
        if text.is_empty() {
            return Err(malformed("completion is empty".into()));
        }
        if !text.contains(TITLE_MARKER) {
            warn!(chars = text.len(), "completion is missing the title label");
            return Err(malformed(format!(
                "completion is missing the {TITLE_MARKER} label"
            )));
        }

        info!(
            tokens_in = usage.tokens_in,
            tokens_out = usage.tokens_out,
            duration_ms = start.elapsed().as_millis() as u64,
            "page text generated"
        );

        Ok(GeneratedPage {
            connector: record.name.clone(),
            text: text.to_string(),
            model: raw.model.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<types::ChatResponseRaw> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PagesmithError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<types::ErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            warn!(%status, error = %detail, "completion request rejected");
            return Err(PagesmithError::Generation(format!(
                "HTTP {status}: {}",
                detail.trim()
            )));
        }

        let raw: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| PagesmithError::Generation(format!("invalid response body: {e}")))?;

        debug!(choices = raw.choices.len(), "completion received");
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesmith_shared::{Competition, Stage};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "[Title]\nSlack + Ruh AI: Conversations That Close\n\n[Overview paragraph]\nText.";

    fn generator_for(server: &MockServer) -> ContentGenerator {
        let endpoint = ServiceEndpoint {
            base_url: server.uri(),
            token: "sk-test".into(),
        };
        ContentGenerator::new(&LlmConfig::default(), &endpoint, &BrandConfig::default()).unwrap()
    }

    fn research() -> ResearchResult {
        ResearchResult {
            primary_keyword: "Slack integration".into(),
            related_keywords: vec![],
            long_tail_keywords: vec![],
            snippets: vec![],
            competition: Competition::Low,
            queries_issued: 4,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "model": "openai/gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 1200, "completion_tokens": 640, "total_tokens": 1840}
        })
    }

    #[tokio::test]
    async fn generate_returns_text_and_usage() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "openai/gpt-4o-mini",
                "max_tokens": 2500
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(PAGE)))
            .expect(1)
            .mount(&server)
            .await;

        let page = generator_for(&server)
            .generate(&ConnectorRecord::named("Slack"), &research())
            .await
            .unwrap();

        assert_eq!(page.connector, "Slack");
        assert!(page.text.starts_with("[Title]"));
        assert_eq!(page.model, "openai/gpt-4o-mini-2024-07-18");
        assert_eq!(page.usage.tokens_in, 1200);
        assert_eq!(page.usage.tokens_out, 640);
    }

    #[tokio::test]
    async fn missing_usage_counts_as_zero() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": PAGE}}]
            })))
            .mount(&server)
            .await;

        let page = generator_for(&server)
            .generate(&ConnectorRecord::named("Slack"), &research())
            .await
            .unwrap();
        assert_eq!(page.usage, TokenUsage::default());
        assert_eq!(page.model, "openai/gpt-4o-mini");
    }

    #[tokio::test]
    async fn malformed_completions_are_generation_errors() {
        let cases = [
            serde_json::json!({"choices": []}),
            completion("   \n  "),
            completion("Here is a page about Slack without any labels."),
            serde_json::json!({"choices": [{"message": {"content": null}}]}),
        ];

        for body in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
                .mount(&server)
                .await;

            let err = generator_for(&server)
                .generate(&ConnectorRecord::named("Slack"), &research())
                .await
                .unwrap_err();
            assert_eq!(err.stage(), Some(Stage::Generation), "body: {body}");
        }
    }

    #[tokio::test]
    async fn rejected_completion_reports_its_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("No labels here at all.")),
            )
            .mount(&server)
            .await;

        let err = generator_for(&server)
            .generate(&ConnectorRecord::named("Slack"), &research())
            .await
            .unwrap_err();
        assert_eq!(
            err.spend(),
            Some(StageSpend::tokens(TokenUsage {
                tokens_in: 1200,
                tokens_out: 640
            }))
        );
        assert!(err.to_string().contains("[Title]"));
    }

    #[tokio::test]
    async fn rejected_completion_without_usage_has_no_spend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = generator_for(&server)
            .generate(&ConnectorRecord::named("Slack"), &research())
            .await
            .unwrap_err();
        assert!(err.spend().is_none());
        assert!(matches!(err, PagesmithError::Generation(_)));
    }

    #[tokio::test]
    async fn provider_error_message_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Rate limit exceeded", "code": 429}
            })))
            .mount(&server)
            .await;

        let err = generator_for(&server)
            .generate(&ConnectorRecord::named("Slack"), &research())
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("429"));
        assert!(text.contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn fenced_completion_is_unwrapped() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion(&format!("```\n{PAGE}\n```"))),
            )
            .mount(&server)
            .await;

        let page = generator_for(&server)
            .generate(&ConnectorRecord::named("Slack"), &research())
            .await
            .unwrap();
        assert_eq!(page.text, PAGE);
    }
}
