//! Inference client: one chat-completions call per page image.
//!
//! The outbound wire contract is pinned for compatibility with the existing
//! endpoint and must not be altered: a message array with an inline base64
//! image content block, `choices[0].message.content` / `usage.total_tokens`
//! on success, `error.message` on failure.
//!
//! Nothing in this module is allowed to propagate past the page boundary:
//! timeouts, transport faults, non-2xx statuses, and structured error
//! payloads all come back as a contained [`InferenceError`]. The client holds
//! no shared mutable state and is safe to invoke concurrently from multiple
//! workers.

use crate::config::{BatchConfig, PromptConfig};
use crate::error::{InferenceError, NotemarkError};
use crate::pipeline::encode::EncodedPage;
use crate::prompts;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Structured text produced for one page.
#[derive(Debug, Clone)]
pub struct Transcription {
    /// Restructured Markdown content.
    pub text: String,
    /// Total tokens billed for the call.
    pub tokens: u64,
}

/// The seam between the dispatcher and the network.
///
/// The production implementation is [`VisionClient`]; tests substitute an
/// instrumented double via [`crate::config::BatchConfigBuilder::client`].
#[async_trait]
pub trait VisionInference: Send + Sync {
    /// Perform exactly one inference call for one page.
    async fn transcribe(&self, page: &EncodedPage) -> Result<Transcription, InferenceError>;
}

/// Reqwest-backed client for the OpenAI-compatible vision endpoint.
pub struct VisionClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl VisionClient {
    /// Build a client from a batch configuration and the resolved prompt.
    ///
    /// Fails with [`NotemarkError::MissingApiKey`] when no credential is set.
    pub fn from_config(
        config: &BatchConfig,
        prompt: &PromptConfig,
    ) -> Result<Self, NotemarkError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(NotemarkError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| NotemarkError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            system_prompt: prompts::compose_system_prompt(prompt),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn build_request(&self, page: &EncodedPage) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: Role::System,
                    content: MessageContent::Text(self.system_prompt.clone()),
                },
                Message {
                    role: Role::User,
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: prompts::USER_INSTRUCTION.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: page.data_url.clone(),
                                detail: Some("high".to_string()),
                            },
                        },
                    ]),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl VisionInference for VisionClient {
    async fn transcribe(&self, page: &EncodedPage) -> Result<Transcription, InferenceError> {
        let request = self.build_request(page);
        debug!("Sending inference request for {}", page.filename);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    InferenceError::Transport {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body: ApiResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                InferenceError::Malformed {
                    detail: format!("HTTP {}: {}", status, e),
                }
            }
        })?;

        match parse_response(body) {
            Ok(t) => {
                debug!("{}: {} tokens", page.filename, t.tokens);
                Ok(t)
            }
            Err(e) => {
                warn!("{}: inference failed — {}", page.filename, e);
                Err(e)
            }
        }
    }
}

/// Validate and convert the third-party payload into a typed result.
///
/// Kept as a pure function so the pinned response contract is unit-testable
/// without a live endpoint.
fn parse_response(body: ApiResponse) -> Result<Transcription, InferenceError> {
    if let Some(choices) = body.choices {
        if let Some(content) = choices.into_iter().next().and_then(|c| c.message.content) {
            let tokens = body.usage.map(|u| u.total_tokens).unwrap_or(0);
            return Ok(Transcription {
                text: content,
                tokens,
            });
        }
        return Err(InferenceError::Malformed {
            detail: "choices present but no message content".into(),
        });
    }

    if let Some(err) = body.error {
        return Err(InferenceError::Service {
            message: err.message,
        });
    }

    Err(InferenceError::Malformed {
        detail: "response has neither choices nor error".into(),
    })
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: Role,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;

    fn test_client() -> VisionClient {
        let config = BatchConfig::builder().api_key("sk-test").build().unwrap();
        VisionClient::from_config(&config, &PromptConfig::default()).unwrap()
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let config = BatchConfig::default();
        let result = VisionClient::from_config(&config, &PromptConfig::default());
        assert!(matches!(result, Err(NotemarkError::MissingApiKey)));
    }

    #[test]
    fn request_shape_matches_endpoint_contract() {
        let client = test_client();
        let page = EncodedPage {
            filename: "page_1.png".into(),
            data_url: "data:image/png;base64,QUJD".into(),
        };
        let json = serde_json::to_value(client.build_request(&page)).unwrap();

        assert_eq!(json["model"], "qwen-vl-plus");
        // temperature is f32; compare with tolerance rather than against an
        // f64 literal, which would never match the widened value exactly.
        let temperature = json["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-6, "got {temperature}");
        assert_eq!(json["max_tokens"], 3000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"][0]["type"], "text");
        assert_eq!(json["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,QUJD"
        );
        assert_eq!(
            json["messages"][1]["content"][1]["image_url"]["detail"],
            "high"
        );
    }

    #[test]
    fn parse_success_response() {
        let body: ApiResponse = serde_json::from_str(
            r###"{"choices":[{"message":{"content":"## Notes"}}],"usage":{"total_tokens":812}}"###,
        )
        .unwrap();
        let t = parse_response(body).unwrap();
        assert_eq!(t.text, "## Notes");
        assert_eq!(t.tokens, 812);
    }

    #[test]
    fn parse_success_without_usage_defaults_tokens_to_zero() {
        let body: ApiResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"x"}}]}"#).unwrap();
        assert_eq!(parse_response(body).unwrap().tokens, 0);
    }

    #[test]
    fn parse_service_error_keeps_message_verbatim() {
        let body: ApiResponse =
            serde_json::from_str(r#"{"error":{"message":"Invalid API key provided."}}"#).unwrap();
        let err = parse_response(body).unwrap_err();
        match err {
            InferenceError::Service { message } => {
                assert_eq!(message, "Invalid API key provided.")
            }
            other => panic!("expected Service, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty_object_is_malformed() {
        let body: ApiResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            parse_response(body),
            Err(InferenceError::Malformed { .. })
        ));
    }
}
