//! Stdio bridge.
//!
//! Reads one JSON-RPC message per line from an input stream, hands it to an
//! [`Upstream`] and writes the answer, if any, as one line of output. Lines
//! are processed strictly one at a time, so responses leave in the order
//! their requests arrived. The bridge only builds envelopes itself for a
//! failed relay round trip and for lines that cannot be JSON at all (invalid
//! UTF-8 or longer than the frame limit), which it answers as parse errors.


pub mod child;

use crate::http::MCP_ENDPOINT;
use crate::mcp::errors::McpError;
use crate::mcp::protocol::{RequestId, extract_request_id, is_notification};
use crate::mcp::server::McpServer;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, error, info, warn};
use url::Url;

pub use child::ServerProcess;

const PROBE_TIMEOUT_SECONDS: u64 = 2;

/// Matches axum's default request body limit, so a line the bridge accepts
/// can also be relayed
pub const MAX_FRAME_BYTES: usize = 2 * 1024 * 1024;

/// Where the bridge sends each line
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Forward one raw message. `Ok(None)` means nothing is to be written
    /// back; `Err` means the round trip itself failed.
    async fn forward(&self, line: &str) -> Result<Option<String>>;
}

/// Dispatches in the bridge's own process
pub struct InProcessUpstream {
    server: Arc<McpServer>,
}

impl InProcessUpstream {
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Upstream for InProcessUpstream {
    #[inline]
    async fn forward(&self, line: &str) -> Result<Option<String>> {
        let Some(message) = self.server.handle_message(line).await else {
            return Ok(None);
        };

        let encoded = serde_json::to_string(&message).context("Failed to encode response")?;
        Ok(Some(encoded))
    }
}

/// Relays each line to an HTTP server's JSON-RPC endpoint
#[derive(Debug, Clone)]
pub struct HttpRelay {
    agent: ureq::Agent,
    base_url: Url,
    endpoint: Url,
}

impl HttpRelay {
    /// `base_url` must end with `/`; the endpoint path is joined beneath it
    #[inline]
    pub fn new(base_url: Url) -> Result<Self> {
        let endpoint = base_url
            .join(MCP_ENDPOINT.trim_start_matches('/'))
            .with_context(|| format!("Failed to build relay endpoint from {}", base_url))?;

        // Error statuses still carry envelopes, so they are not errors here.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            base_url,
            endpoint,
        })
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Check once that the server answers `GET /`
    #[inline]
    pub async fn probe(&self) -> Result<()> {
        let base_url = self.base_url.clone();
        tokio::task::spawn_blocking(move || probe_blocking(&base_url))
            .await
            .context("Probe task failed")?
    }
}

#[async_trait]
impl Upstream for HttpRelay {
    #[inline]
    async fn forward(&self, line: &str) -> Result<Option<String>> {
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let line = line.to_string();

        let (status, body) = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut response = agent
                .post(endpoint.as_str())
                .header("Content-Type", "application/json")
                .send(line.as_str())
                .with_context(|| format!("Failed to reach {}", endpoint))?;
            let status = response.status().as_u16();
            let body = response
                .body_mut()
                .read_to_string()
                .context("Failed to read relay response")?;
            Ok((status, body))
        })
        .await
        .context("Relay task failed")??;

        debug!("Relay answered HTTP {}", status);
        if body.trim().is_empty() {
            return Ok(None);
        }

        // Copy verbatim unless the body spans lines, which would break the
        // one message per line framing.
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Relay returned HTTP {} without JSON: {}", status, e))?;
        if body.contains('\n') {
            return Ok(Some(value.to_string()));
        }
        Ok(Some(body))
    }
}

/// Blocking `GET base_url`, successful when the server answers 2xx
pub(crate) fn probe_blocking(base_url: &Url) -> Result<()> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(PROBE_TIMEOUT_SECONDS)))
        .http_status_as_error(false)
        .build()
        .into();

    let response = agent
        .get(base_url.as_str())
        .call()
        .with_context(|| format!("Server at {} is unreachable", base_url))?;

    if !response.status().is_success() {
        bail!(
            "Server at {} answered HTTP {}",
            base_url,
            response.status().as_u16()
        );
    }
    Ok(())
}

/// Line loop shared by every upstream
pub struct StdioBridge<U> {
    upstream: U,
    max_frame_bytes: usize,
}

impl<U: Upstream> StdioBridge<U> {
    #[inline]
    pub fn new(upstream: U) -> Self {
        Self {
            upstream,
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Longest accepted line, excluding the newline
    #[inline]
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Run until `reader` reaches end of input. Errors only on I/O failure
    /// of either stream; a malformed line is answered and reading goes on.
    #[inline]
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frame = Vec::new();
        let mut handled = 0_u64;

        loop {
            frame.clear();
            let read = (&mut reader)
                .take(self.max_frame_bytes as u64 + 1)
                .read_until(b'\n', &mut frame)
                .await
                .context("Failed to read input")?;
            if read == 0 {
                break;
            }

            let response = if frame.last() != Some(&b'\n') && frame.len() > self.max_frame_bytes {
                discard_line(&mut reader)
                    .await
                    .context("Failed to read input")?;
                handled += 1;
                warn!("Dropping message longer than {} bytes", self.max_frame_bytes);
                encode_error(
                    &McpError::ParseError {
                        message: format!(
                            "Message exceeds the maximum of {} bytes",
                            self.max_frame_bytes
                        ),
                    },
                    None,
                )
            } else {
                match std::str::from_utf8(&frame) {
                    Ok(text) => {
                        let line = text.trim();
                        if line.is_empty() {
                            continue;
                        }
                        handled += 1;
                        self.process_line(line).await
                    }
                    Err(e) => {
                        handled += 1;
                        let error = McpError::ParseError {
                            message: e.to_string(),
                        };
                        error.log();
                        encode_error(&error, None)
                    }
                }
            };

            let Some(response) = response else {
                continue;
            };

            writer
                .write_all(response.as_bytes())
                .await
                .context("Failed to write output")?;
            writer
                .write_all(b"\n")
                .await
                .context("Failed to write output")?;
            writer.flush().await.context("Failed to flush output")?;
        }

        info!("Input closed after {} messages", handled);
        Ok(())
    }

    /// Bridge the process's own stdin and stdout
    #[inline]
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("Stdio bridge ready");
        let stdin = BufReader::new(tokio::io::stdin());
        self.run(stdin, tokio::io::stdout()).await
    }

    async fn process_line(&self, line: &str) -> Option<String> {
        let parsed: Option<Value> = serde_json::from_str(line).ok();
        let notification = parsed.as_ref().is_some_and(is_notification);

        match self.upstream.forward(line).await {
            Ok(response) if notification => {
                if response.is_some() {
                    warn!("Upstream answered a notification; dropping the response");
                }
                None
            }
            Ok(response) => response,
            Err(e) if notification => {
                warn!("Failed to deliver notification: {:#}", e);
                None
            }
            Err(e) => {
                error!("Upstream round trip failed: {:#}", e);
                let id = parsed.as_ref().and_then(extract_request_id);
                let error = McpError::InternalError {
                    message: format!("Upstream unavailable: {}", e),
                };
                encode_error(&error, id)
            }
        }
    }
}

fn encode_error(error: &McpError, id: Option<RequestId>) -> Option<String> {
    serde_json::to_string(&error.to_error_response(id))
        .map_err(|e| error!("Failed to encode error response: {}", e))
        .ok()
}

/// Skip the rest of an oversized line without buffering it
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        if let Some(position) = available.iter().position(|&byte| byte == b'\n') {
            reader.consume(position + 1);
            return Ok(());
        }
        let skipped = available.len();
        reader.consume(skipped);
    }
}
