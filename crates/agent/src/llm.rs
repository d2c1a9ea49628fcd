use std::time::Duration;

use agentpay_core::config::LlmConfig;
use agentpay_core::{ApplicationError, Collaborator, TransportError};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.0, max_output_tokens: 1024 }
    }
}

impl GenerationOptions {
    pub fn deterministic(max_output_tokens: u32) -> Self {
        Self { temperature: 0.0, max_output_tokens }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ApplicationError>;
}

/// Gemini `generateContent` over REST.
pub struct GeminiClient {
    config: LlmConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, empty when absent.
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .unwrap_or_default()
    }
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                ApplicationError::Configuration(format!(
                    "failed to build inference http client: {error}"
                ))
            })?;
        Ok(Self { config: config.clone(), client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ApplicationError> {
        let api_key = self.config.require_api_key()?;

        let body = GenerateContentRequest {
            contents: vec![Content { role: "user", parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| TransportError::network(Collaborator::Inference, error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = match response.text().await {
                Ok(body) => body,
                Err(error) => format!("<failed to read error body: {error}>"),
            };
            return Err(TransportError::status(
                Collaborator::Inference,
                status.as_u16(),
                format!("Gemini error {}: {error_text}", status.as_u16()),
            )
            .into());
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|error| {
            TransportError::status(
                Collaborator::Inference,
                status.as_u16(),
                format!("failed to decode Gemini response: {error}"),
            )
        })?;

        Ok(payload.into_text())
    }
}

#[cfg(test)]
mod tests {
    use agentpay_core::config::AppConfig;
    use agentpay_core::{ApplicationError, Collaborator};
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::{GeminiClient, GenerationOptions, LlmClient};

    fn config(base_url: String, api_key: Option<&str>) -> agentpay_core::config::LlmConfig {
        let mut llm = AppConfig::default().llm;
        llm.base_url = base_url;
        llm.model = "gemini-test".to_string();
        llm.api_key = api_key.map(|key| key.to_string().into());
        llm
    }

    #[tokio::test]
    async fn generate_sends_deterministic_request_and_reads_first_part() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "contents": [{"role": "user", "parts": [{"text": "classify this"}]}],
                "generationConfig": {"temperature": 0.0, "maxOutputTokens": 1024}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"{\"complexity\":\"LOW\"}"}]}}]}"#)
            .create_async()
            .await;

        let client = GeminiClient::from_config(&config(server.url(), Some("test-key")))
            .expect("client builds");
        let raw = client
            .generate("classify this", &GenerationOptions::default())
            .await
            .expect("generate succeeds");

        assert_eq!(raw, r#"{"complexity":"LOW"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_candidate_list_yields_empty_text() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let client =
            GeminiClient::from_config(&config(server.url(), Some("k"))).expect("client builds");
        let raw = client.generate("p", &GenerationOptions::default()).await.expect("ok");
        assert_eq!(raw, "");
    }

    #[tokio::test]
    async fn non_success_status_is_a_transport_error_with_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .with_status(429)
            .with_body("quota exhausted")
            .create_async()
            .await;

        let client =
            GeminiClient::from_config(&config(server.url(), Some("k"))).expect("client builds");
        let error = client.generate("p", &GenerationOptions::default()).await.expect_err("429");

        match error {
            ApplicationError::Transport(transport) => {
                assert_eq!(transport.collaborator, Collaborator::Inference);
                assert_eq!(transport.status, Some(429));
                assert!(transport.message.contains("quota exhausted"));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = GeminiClient::from_config(&config(server.url(), None)).expect("client builds");
        let error = client.generate("p", &GenerationOptions::default()).await.expect_err("no key");

        assert!(matches!(error, ApplicationError::Configuration(ref m) if m.contains("llm.api_key")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreadable_error_body_is_reported_in_the_transport_message() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        let upstream = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            read_full_request(&mut socket).await;
            socket
                .write_all(
                    b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 100\r\nconnection: close\r\n\r\npartial",
                )
                .await
                .expect("write");
            socket.shutdown().await.ok();
        });

        let client = GeminiClient::from_config(&config(format!("http://{address}"), Some("k")))
            .expect("client builds");
        let error = client.generate("p", &GenerationOptions::default()).await.expect_err("503");
        upstream.await.expect("upstream task");

        match error {
            ApplicationError::Transport(transport) => {
                assert_eq!(transport.status, Some(503));
                assert!(
                    transport.message.contains("failed to read error body"),
                    "{}",
                    transport.message
                );
            }
            other => panic!("expected transport error, got {other:?}"),
        }

        async fn read_full_request(socket: &mut tokio::net::TcpStream) {
            let mut received = Vec::new();
            let mut chunk = [0_u8; 4096];
            loop {
                let read = socket.read(&mut chunk).await.expect("read");
                if read == 0 {
                    return;
                }
                received.extend_from_slice(&chunk[..read]);

                let text = String::from_utf8_lossy(&received);
                let Some(header_end) = text.find("\r\n\r\n") else {
                    continue;
                };
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }
}
