//! Miner configuration.
//!
//! Resolved once at startup from (highest precedence first) command-line
//! flags, an optional TOML file, and built-in defaults. The result is
//! immutable and handed to the scheduler.

use crate::error::{MinerError, MinerResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTPS node endpoint (self-signed certificate).
pub const DEFAULT_NODE_URL_HTTPS: &str = "https://50.28.86.131";

/// Plain HTTP endpoint for machines whose TLS stack is too old.
pub const DEFAULT_NODE_URL_HTTP: &str = "http://50.28.86.131:8088";

/// Seconds between attestations.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Client version reported in the payload and `User-Agent`.
pub const CLIENT_VERSION: &str = "1.0.0-sparc";

/// HTTP submission timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// How the scheduler behaves for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Submit every interval until interrupted.
    #[default]
    Loop,
    /// Submit once, then exit.
    Once,
    /// Build a payload and report what would be sent. No network I/O.
    DryRun,
    /// Build a payload and print it. No network I/O.
    ShowPayload,
}

impl RunMode {
    /// Pick the mode from mutually exclusive command-line flags.
    pub fn from_flags(once: bool, dry_run: bool, show_payload: bool) -> MinerResult<Self> {
        match (once, dry_run, show_payload) {
            (false, false, false) => Ok(RunMode::Loop),
            (true, false, false) => Ok(RunMode::Once),
            (false, true, false) => Ok(RunMode::DryRun),
            (false, false, true) => Ok(RunMode::ShowPayload),
            _ => Err(MinerError::Config(
                "--once, --dry-run and --show-payload are mutually exclusive".into(),
            )),
        }
    }

    /// Whether this mode ever talks to the node.
    pub fn submits(&self) -> bool {
        matches!(self, RunMode::Loop | RunMode::Once)
    }
}

/// Optional on-disk settings (`~/.clawrtc/sparc.toml`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub node_url: Option<String>,
    pub node_url_http: Option<String>,
    pub interval_secs: Option<u64>,
    pub proxy: Option<String>,
}

impl FileConfig {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> MinerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Load the default file if it exists; otherwise return empty settings.
    pub fn load_default() -> MinerResult<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `~/.clawrtc/sparc.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".clawrtc").join("sparc.toml"))
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub wallet: String,
    pub proxy: Option<String>,
    pub use_http: bool,
    pub interval_secs: Option<u64>,
    pub mode: RunMode,
}

/// Immutable runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerConfig {
    /// Principal (wallet) identifier the rewards are credited to.
    pub wallet: String,
    /// Node base URL, without trailing slash.
    pub node_url: String,
    /// Forwarding proxy for HTTPS targets.
    pub proxy: Option<String>,
    pub interval: Duration,
    pub client_version: String,
    pub request_timeout: Duration,
    pub mode: RunMode,
}

impl MinerConfig {
    /// Merge command-line flags over file settings over defaults.
    pub fn resolve(cli: CliOverrides, file: FileConfig) -> MinerResult<Self> {
        let wallet = cli.wallet.trim().to_string();
        if wallet.is_empty() {
            return Err(MinerError::Config("wallet must not be empty".into()));
        }

        let node_url = if cli.use_http {
            file.node_url_http
                .unwrap_or_else(|| DEFAULT_NODE_URL_HTTP.to_string())
        } else {
            file.node_url
                .unwrap_or_else(|| DEFAULT_NODE_URL_HTTPS.to_string())
        };

        let interval_secs = cli
            .interval_secs
            .or(file.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(MinerError::Config("interval must be at least 1 second".into()));
        }

        let proxy = cli
            .proxy
            .or(file.proxy)
            .filter(|p| !p.trim().is_empty());

        Ok(Self {
            wallet,
            node_url: node_url.trim_end_matches('/').to_string(),
            proxy,
            interval: Duration::from_secs(interval_secs),
            client_version: CLIENT_VERSION.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            mode: cli.mode,
        })
    }

    /// Whether the selected node is reached over HTTPS.
    pub fn uses_tls(&self) -> bool {
        self.node_url.starts_with("https://")
    }
}
