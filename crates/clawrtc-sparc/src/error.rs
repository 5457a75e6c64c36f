//! Error types for the SPARC attestation client.

/// Errors that can stop the miner or fail a single submission.
#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Node API error: {0}")]
    NodeApi(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<reqwest::Error> for MinerError {
    fn from(e: reqwest::Error) -> Self {
        MinerError::Network(e.to_string())
    }
}

/// Convenience type alias.
pub type MinerResult<T> = Result<T, MinerError>;

/// Why a single hardware probe step produced no value.
///
/// These never leave the probe or collector that owns them; the caller
/// substitutes the field's default.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("{tool} is not installed")]
    ToolAbsent { tool: String },

    #[error("{tool} failed: {detail}")]
    ToolFailed { tool: String, detail: String },

    #[error("could not parse {what}")]
    Unparsable { what: String },
}

impl ProbeError {
    pub(crate) fn unparsable(what: &str) -> Self {
        ProbeError::Unparsable {
            what: what.to_string(),
        }
    }
}

/// Result of one probe step. `Ok` is "success with value".
pub type ProbeResult<T> = Result<T, ProbeError>;
