//! Gemini `generateContent` client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{GenerationError, TextGenerator};
use crate::config::GenerationConfig;
use crate::{Error, Result};

/// Request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sampling temperature
pub const TEMPERATURE: f32 = 0.7;

/// Output length cap
pub const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationSettings,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    /// Any non-null value marks a failure; its shape is not guaranteed
    error: Option<Value>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn error_message(&self) -> Option<String> {
        self.error
            .as_ref()?
            .get("message")?
            .as_str()
            .map(ToString::to_string)
    }

    fn answer(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.is_empty())
    }
}

/// Classify a completed HTTP exchange
///
/// Authentication and throttling statuses win over whatever the body says; any
/// other failure status or an `error` object in the body is a provider error.
/// Bodies that are not JSON are judged by status alone.
pub fn classify_response(
    status: StatusCode,
    body: &str,
) -> std::result::Result<String, GenerationError> {
    let parsed: Option<GenerateResponse> = serde_json::from_str(body).ok();
    let has_error = parsed.as_ref().is_some_and(|r| r.error.is_some());

    if status.is_success() && !has_error {
        return parsed
            .and_then(GenerateResponse::answer)
            .ok_or(GenerationError::NoContent);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GenerationError::Authentication),
        StatusCode::TOO_MANY_REQUESTS => Err(GenerationError::RateLimitExceeded),
        _ => {
            let message = parsed
                .as_ref()
                .and_then(GenerateResponse::error_message)
                .unwrap_or_else(|| "Unknown error".to_string());
            Err(GenerationError::Provider {
                message,
                status: status.as_u16(),
            })
        }
    }
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    // The URL carries the API key
    let e = e.without_url();
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Network(e.to_string())
    }
}

/// Gemini text-generation client
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl GeminiClient {
    /// Create a client for the configured model
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(api_key: SecretString, config: &GenerationConfig) -> Result<Self> {
        Self::with_timeout(api_key, config, REQUEST_TIMEOUT)
    }

    /// Create a client with a non-default request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn with_timeout(
        api_key: SecretString,
        config: &GenerationConfig,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Gemini API key required".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("speechbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            api_key,
        })
    }

    /// Endpoint requests are sent to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        if prompt.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let request = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationSettings {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        tracing::debug!(
            chars = prompt.len(),
            endpoint = %self.endpoint,
            "sending generation request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = transport_error(e);
                tracing::error!(error = %err, "generation request failed");
                err
            })?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        let result = classify_response(status, &body);
        match &result {
            Ok(text) => {
                tracing::info!(status = %status, chars = text.len(), "generation complete");
            }
            Err(e) => {
                tracing::warn!(
                    status = %status,
                    kind = e.kind(),
                    error = %e,
                    "generation failed"
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_BODY: &str =
        r#"{"candidates":[{"content":{"parts":[{"text":"Hi there"}],"role":"model"}}]}"#;

    #[test]
    fn test_success_extracts_first_part() {
        assert_eq!(classify_response(StatusCode::OK, OK_BODY), Ok("Hi there".to_string()));
    }

    #[test]
    fn test_auth_statuses() {
        let body = r#"{"error":{"code":403,"message":"API key not valid"}}"#;
        assert_eq!(
            classify_response(StatusCode::FORBIDDEN, body),
            Err(GenerationError::Authentication)
        );
        assert_eq!(
            classify_response(StatusCode::UNAUTHORIZED, "not json"),
            Err(GenerationError::Authentication)
        );
    }

    #[test]
    fn test_rate_limit_status() {
        assert_eq!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, "{}"),
            Err(GenerationError::RateLimitExceeded)
        );
    }

    #[test]
    fn test_other_status_uses_error_message() {
        let body = r#"{"error":{"code":500,"message":"Internal error"}}"#;
        assert_eq!(
            classify_response(StatusCode::INTERNAL_SERVER_ERROR, body),
            Err(GenerationError::Provider {
                message: "Internal error".to_string(),
                status: 500
            })
        );
        assert_eq!(
            classify_response(StatusCode::BAD_GATEWAY, "<html>"),
            Err(GenerationError::Provider {
                message: "Unknown error".to_string(),
                status: 502
            })
        );
    }

    #[test]
    fn test_error_field_on_success_status() {
        let body = r#"{"error":{"message":"quota"}}"#;
        assert_eq!(
            classify_response(StatusCode::OK, body),
            Err(GenerationError::Provider {
                message: "quota".to_string(),
                status: 200
            })
        );
    }

    #[test]
    fn test_error_field_of_any_shape() {
        for body in [
            r#"{"error":"quota exhausted"}"#,
            r#"{"error":{"code":8}}"#,
            r#"{"error":{"message":42}}"#,
            r#"{"error":true,"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#,
        ] {
            assert_eq!(
                classify_response(StatusCode::OK, body),
                Err(GenerationError::Provider {
                    message: "Unknown error".to_string(),
                    status: 200
                }),
                "body: {body}"
            );
        }
        let body = r#"{"error":null,"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#;
        assert_eq!(classify_response(StatusCode::OK, body), Ok("hi".to_string()));
    }

    #[test]
    fn test_missing_or_empty_text_is_no_content() {
        for body in [
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
            "{}",
            "not json",
        ] {
            assert_eq!(
                classify_response(StatusCode::OK, body),
                Err(GenerationError::NoContent),
                "body: {body}"
            );
        }
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: "hello" }],
            }],
            generation_config: GenerationSettings {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        let temperature = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_empty_key() {
        let config = GenerationConfig::default();
        assert!(GeminiClient::new(SecretString::from(""), &config).is_err());
    }
}
