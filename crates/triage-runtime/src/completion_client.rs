use std::sync::Arc;

use triage_ai::{ChatRequest, LlmClient, Message, TriageAiError};
use triage_core::{CancellationToken, Failure, FailureKind};
use triage_github::Aggregate;

use crate::render_sink::Suggestion;

pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_COMPLETION_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_COMPLETION_MAX_TOKENS: u32 = 500;

/// Rendered when the endpoint answers without any completion text.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response";

pub const TRIAGE_SYSTEM_PROMPT: &str = "You are a triage assistant for GitHub issues. \
Read the repository readme and the full issue thread, then reply in markdown with a one-paragraph \
summary of the problem followed by a numbered list of at most five clarifying questions that would \
help a maintainer reproduce, scope, or prioritize the issue. Do not repeat questions that the thread \
already answers.";

#[derive(Debug, Clone, PartialEq)]
/// Fixed sampling parameters for triage completions.
pub struct CompletionConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: DEFAULT_COMPLETION_TEMPERATURE,
            max_tokens: DEFAULT_COMPLETION_MAX_TOKENS,
        }
    }
}

#[derive(Clone)]
/// Turns an [`Aggregate`] into a single completion request and extracts the
/// suggestion text. Requests are never retried.
pub struct CompletionClient {
    llm: Arc<dyn LlmClient>,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(llm: Arc<dyn LlmClient>, config: CompletionConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn build_request(&self, aggregate: &Aggregate) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message::system(TRIAGE_SYSTEM_PROMPT),
                Message::user(render_user_prompt(aggregate)),
            ],
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
        }
    }

    pub async fn suggest(
        &self,
        aggregate: &Aggregate,
        cancel: &CancellationToken,
    ) -> Result<Suggestion, Failure> {
        let request = self.build_request(aggregate);
        tracing::debug!(
            issue = %aggregate.context,
            model = %request.model,
            prompt_chars = request.messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "requesting triage completion"
        );
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Failure::cancelled(format!(
                    "completion request abandoned for {}",
                    aggregate.context
                )));
            }
            response = self.llm.complete(request) => response,
        };

        let response = response.map_err(failure_from_ai_error)?;
        tracing::debug!(
            issue = %aggregate.context,
            finish_reason = response.finish_reason.as_deref().unwrap_or("none"),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            total_tokens = response.usage.total_tokens,
            "triage completion received"
        );
        let text = response
            .content
            .unwrap_or_else(|| NO_RESPONSE_PLACEHOLDER.to_string());
        Ok(Suggestion { text })
    }
}

fn render_user_prompt(aggregate: &Aggregate) -> String {
    format!(
        "Here is a GitHub issue with its repository context:\n\n{}\n\nWhat questions would help triage this issue?",
        aggregate.render_prompt_text()
    )
}

fn failure_from_ai_error(error: TriageAiError) -> Failure {
    match error {
        TriageAiError::Http(error) if error.is_timeout() => Failure::new(
            FailureKind::Timeout,
            format!("completion request timed out: {error}"),
        ),
        TriageAiError::Http(error) if error.is_decode() => {
            Failure::parse(format!("failed to read completion response: {error}"))
        }
        TriageAiError::Http(error) => {
            Failure::network(format!("failed to reach completion endpoint: {error}"))
        }
        TriageAiError::HttpStatus { status, body } => {
            Failure::http_status(status, "completion endpoint", &body)
        }
        TriageAiError::Serde(error) => {
            Failure::parse(format!("failed to parse completion response: {error}"))
        }
        TriageAiError::InvalidResponse(detail) => {
            Failure::parse(format!("invalid completion response: {detail}"))
        }
        TriageAiError::MissingApiKey => {
            Failure::network("completion request not sent: missing API key")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use triage_ai::{ChatRequest, ChatResponse, ChatUsage, LlmClient, MessageRole, TriageAiError};
    use triage_core::{CancellationToken, FailureKind, IssueContext};
    use triage_github::{Aggregate, AggregateComment};

    use super::{CompletionClient, CompletionConfig, NO_RESPONSE_PLACEHOLDER};

    struct ScriptedClient {
        reply: Mutex<Option<Result<ChatResponse, TriageAiError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        fn new(reply: Result<ChatResponse, TriageAiError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, TriageAiError> {
            self.requests.lock().expect("requests").push(request);
            self.reply
                .lock()
                .expect("reply")
                .take()
                .unwrap_or_else(|| Err(TriageAiError::InvalidResponse("exhausted".into())))
        }
    }

    fn content(text: Option<&str>) -> ChatResponse {
        ChatResponse {
            content: text.map(str::to_string),
            finish_reason: Some("stop".to_string()),
            usage: ChatUsage::default(),
        }
    }

    fn aggregate() -> Aggregate {
        Aggregate {
            context: IssueContext {
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                issue_number: 7,
            },
            readme_text: "# Widgets".to_string(),
            issue_author: "alice".to_string(),
            issue_title: "Crash".to_string(),
            issue_body: "It crashes".to_string(),
            comments: vec![AggregateComment {
                author: "bob".to_string(),
                body: "Can you share logs?".to_string(),
            }],
        }
    }

    #[test]
    fn unit_request_carries_fixed_sampling_and_two_messages() {
        let client = CompletionClient::new(
            ScriptedClient::new(Ok(content(Some("x")))),
            CompletionConfig::default(),
        );
        let request = client.build_request(&aggregate());
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[1].role, MessageRole::User);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(500));
        for snippet in ["# Widgets", "alice", "Crash", "It crashes", "@bob:", "Can you share logs?"] {
            assert!(
                request.messages[1].content.contains(snippet),
                "user prompt missing {snippet}"
            );
        }
    }

    #[test]
    fn regression_prompt_is_deterministic() {
        let client = CompletionClient::new(
            ScriptedClient::new(Ok(content(None))),
            CompletionConfig::default(),
        );
        assert_eq!(
            client.build_request(&aggregate()),
            client.build_request(&aggregate())
        );
    }

    #[tokio::test]
    async fn functional_returns_first_completion_text() {
        let llm = ScriptedClient::new(Ok(content(Some("X"))));
        let client = CompletionClient::new(llm.clone(), CompletionConfig::default());
        let suggestion = client
            .suggest(&aggregate(), &CancellationToken::new())
            .await
            .expect("suggestion");
        assert_eq!(suggestion.text, "X");
        assert_eq!(llm.requests.lock().expect("requests").len(), 1);
    }

    #[tokio::test]
    async fn functional_missing_content_yields_placeholder() {
        let client = CompletionClient::new(
            ScriptedClient::new(Ok(content(None))),
            CompletionConfig::default(),
        );
        let suggestion = client
            .suggest(&aggregate(), &CancellationToken::new())
            .await
            .expect("placeholder");
        assert_eq!(suggestion.text, NO_RESPONSE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn functional_error_taxonomy_mapping() {
        let cases = [
            (
                TriageAiError::Serde(
                    serde_json::from_str::<serde_json::Value>("{bad").expect_err("bad json"),
                ),
                FailureKind::Parse,
            ),
            (
                TriageAiError::HttpStatus {
                    status: 401,
                    body: "unauthorized".to_string(),
                },
                FailureKind::HttpStatus,
            ),
            (
                TriageAiError::InvalidResponse("odd".to_string()),
                FailureKind::Parse,
            ),
        ];
        for (error, expected) in cases {
            let client =
                CompletionClient::new(ScriptedClient::new(Err(error)), CompletionConfig::default());
            let failure = client
                .suggest(&aggregate(), &CancellationToken::new())
                .await
                .expect_err("must fail");
            assert_eq!(failure.kind, expected);
        }
    }

    #[tokio::test]
    async fn regression_cancelled_token_short_circuits_request() {
        let llm = ScriptedClient::new(Ok(content(Some("late"))));
        let client = CompletionClient::new(llm.clone(), CompletionConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let failure = client
            .suggest(&aggregate(), &cancel)
            .await
            .expect_err("cancelled");
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert!(llm.requests.lock().expect("requests").is_empty());
    }
}
