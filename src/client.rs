//! HTTP client for the MiniMax OpenAI-compatible chat completions API.
//!
//! Opens streamed completion requests and re-frames the upstream SSE byte
//! stream into typed [`ChatDelta`] fragments. Malformed chunks are skipped
//! with a warning; only transport faults surface as stream errors.

use std::pin::Pin;

use anyhow::Result;
use futures_util::Stream;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::config::{Config, RetryPolicy};
use crate::logging;
use crate::models::{ChatDelta, ChatMessage, ToolDefinition};

/// Lazy sequence of delta fragments from one streamed completion call.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<ChatDelta>> + Send>>;

// === CompletionClient ===

/// Client for the MiniMax chat completions endpoint.
#[must_use]
#[derive(Clone)]
pub struct CompletionClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl CompletionClient {
    /// Create a client from the proxy configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.minimax_api_key()?;
        let base_url = config.minimax_base_url();
        let retry = config.retry_policy();
        let model = config.model();

        logging::info(format!("MiniMax base URL: {base_url}"));
        logging::info(format!("Model: {model}"));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            model,
            retry,
        })
    }

    /// Open a streamed completion request and return its delta fragments.
    ///
    /// The request always asks for separated reasoning output
    /// (`reasoning_split`, a MiniMax extension) so thinking text arrives on
    /// its own channel.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<DeltaStream> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "tools": tools.iter().map(tool_to_wire).collect::<Vec<_>>(),
            "reasoning_split": true,
            "stream": true,
        });

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let response =
            send_with_retry(&self.retry, || self.http_client.post(&url).json(&body)).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions request failed: HTTP {status}: {error_text}");
        }

        let byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            use futures_util::StreamExt;

            let mut line_buf = String::new();
            let mut byte_buf = Vec::new();
            let mut byte_stream = std::pin::pin!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(anyhow::anyhow!("Stream read error: {e}"));
                        break;
                    }
                };

                byte_buf.extend_from_slice(&chunk);

                // Process complete SSE lines from the buffer. Framing is
                // byte-based; each line is decoded only after extraction so
                // invalid UTF-8 cannot skew the consumed length.
                while let Some(newline_pos) = byte_buf.iter().position(|&b| b == b'\n') {
                    let raw_line: Vec<u8> = byte_buf.drain(..=newline_pos).collect();
                    let decoded = String::from_utf8_lossy(&raw_line[..newline_pos]);
                    let line = decoded.trim_end_matches('\r');

                    if line.is_empty() {
                        // Empty line = event boundary, process accumulated data
                        if !line_buf.is_empty() {
                            let data = std::mem::take(&mut line_buf);
                            if data.trim() == "[DONE]" {
                                // Stream complete
                            } else if let Some(delta) = parse_delta(&data) {
                                yield Ok(delta);
                            }
                        }
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data: ") {
                        line_buf.push_str(data);
                    }
                    // Ignore other SSE fields (event:, id:, retry:)
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

// === Wire Helpers ===

fn tool_to_wire(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Extract the first choice's delta from one SSE data payload.
///
/// Any shape problem (bad JSON, missing choices, unexpected delta fields)
/// is logged and skipped; streaming must not abort on a malformed chunk.
fn parse_delta(data: &str) -> Option<ChatDelta> {
    let chunk: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => {
            logging::warn(format!("Skipping unparseable stream chunk: {err}"));
            return None;
        }
    };
    let delta_value = chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))?
        .clone();
    match serde_json::from_value::<ChatDelta>(delta_value) {
        Ok(delta) => Some(delta),
        Err(err) => {
            logging::warn(format!("Skipping malformed delta fragment: {err}"));
            None
        }
    }
}

// === Retry Helpers ===

async fn send_with_retry<F>(policy: &RetryPolicy, mut build: F) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt: u32 = 0;

    loop {
        let result = build().send().await;

        match result {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response);
                }

                // Non-retryable errors go back to the caller as-is
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if !retryable || !policy.enabled || attempt >= policy.max_retries {
                    return Ok(response);
                }

                logging::warn(format!(
                    "Retryable HTTP {} (attempt {} of {})",
                    status.as_u16(),
                    attempt + 1,
                    policy.max_retries + 1
                ));
            }
            Err(err) => {
                if !policy.enabled || attempt >= policy.max_retries {
                    return Err(err.into());
                }
                logging::warn(format!(
                    "Request error: {} (attempt {} of {})",
                    err,
                    attempt + 1,
                    policy.max_retries + 1
                ));
            }
        }

        let delay = policy.delay_for_attempt(attempt);
        attempt += 1;
        logging::info(format!("Retrying after {:.2}s", delay.as_secs_f64()));
        tokio::time::sleep(delay).await;
    }
}
