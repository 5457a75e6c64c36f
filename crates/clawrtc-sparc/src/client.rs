//! Async HTTP client for the node's attestation endpoint.

use crate::config::MinerConfig;
use crate::error::{MinerError, MinerResult};
use crate::payload::AttestationRecord;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// Attestation submission path on the node.
pub const SUBMIT_PATH: &str = "/attest/submit";

/// Response from `/attest/submit`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttestResponse {
    pub ok: bool,
    /// Display-only hint for when the next attestation is useful.
    #[serde(default)]
    pub next_window: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What happened to one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The node returned `ok: true`.
    Accepted { next_window: Option<String> },
    /// The node answered but returned `ok: false`.
    Rejected { reason: String },
    /// Timeout, connection failure, non-2xx status, or an unreadable body.
    Unreachable { detail: String },
}

impl fmt::Display for SubmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitOutcome::Accepted { .. } => f.write_str("accepted"),
            SubmitOutcome::Rejected { .. } => f.write_str("rejected"),
            SubmitOutcome::Unreachable { .. } => f.write_str("unreachable"),
        }
    }
}

/// Sort a transport result into exactly one outcome.
pub fn classify(result: MinerResult<AttestResponse>) -> SubmitOutcome {
    match result {
        Ok(resp) if resp.ok => SubmitOutcome::Accepted {
            next_window: resp.next_window.map(|w| match w {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
        },
        Ok(resp) => SubmitOutcome::Rejected {
            reason: resp.error.unwrap_or_else(|| "Unknown error".into()),
        },
        Err(e) => SubmitOutcome::Unreachable {
            detail: e.to_string(),
        },
    }
}

/// Route HTTPS targets through `proxy` by prefixing the full URL.
///
/// Plain HTTP URLs are returned unchanged. No check is made that the proxy
/// actually terminates TLS.
pub fn effective_url(url: &str, proxy: Option<&str>) -> String {
    match proxy {
        Some(proxy) if url.starts_with("https://") => format!("{proxy}/{url}"),
        _ => url.to_string(),
    }
}

/// Something that can deliver an attestation to a node.
#[async_trait]
pub trait AttestTransport: Send + Sync {
    async fn submit(&self, record: &AttestationRecord) -> MinerResult<AttestResponse>;
}

/// reqwest-backed client for a RustChain node.
pub struct RustChainClient {
    http: reqwest::Client,
    submit_url: String,
}

impl RustChainClient {
    /// Build a client for the configured node, proxy, and timeout.
    pub fn new(config: &MinerConfig) -> MinerResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true) // Self-signed certs on nodes
            .timeout(config.request_timeout)
            .user_agent(format!("RustChain-SPARC-Miner/{}", config.client_version))
            .build()?;
        let target = format!("{}{}", config.node_url, SUBMIT_PATH);
        Ok(Self {
            http,
            submit_url: effective_url(&target, config.proxy.as_deref()),
        })
    }

    /// The URL requests are actually sent to.
    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }
}

#[async_trait]
impl AttestTransport for RustChainClient {
    async fn submit(&self, record: &AttestationRecord) -> MinerResult<AttestResponse> {
        debug!(url = %self.submit_url, nonce = record.nonce, "Submitting attestation");
        let resp = self
            .http
            .post(&self.submit_url)
            .header(ACCEPT, "application/json")
            .json(record)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MinerError::NodeApi(format!("HTTP {status}: {body}")));
        }
        Ok(resp.json().await?)
    }
}
