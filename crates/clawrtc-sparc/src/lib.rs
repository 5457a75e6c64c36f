//! `clawrtc-sparc` — RustChain (RTC) hardware attestation for UltraSPARC
//! machines running Solaris.
//!
//! Provides:
//! - **Processor**: `prtconf`/`psrinfo` parsing and SPARC family classification
//! - **Identity**: hostid, configuration digest, OBP version, zone/LDOM markers
//! - **Anti-spoofing**: operator warnings for zones, LDOMs, and placeholder hostids
//! - **Payload**: the `/attest/submit` record
//! - **Client**: async HTTP client with HTTPS proxy rewriting
//! - **Scheduler**: the periodic submit loop with dry-run and preview modes

pub mod anti_spoof;
pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod identity;
pub mod payload;
pub mod processor;
pub mod scheduler;

// Re-exports for convenience
pub use anti_spoof::SpoofWarning;
pub use client::{AttestTransport, RustChainClient, SubmitOutcome};
pub use config::{MinerConfig, RunMode};
pub use error::{MinerError, MinerResult, ProbeError, ProbeResult};
pub use host::{Host, SystemHost};
pub use identity::HardwareFingerprint;
pub use payload::AttestationRecord;
pub use processor::{ProcessorDescription, SparcFamily};
pub use scheduler::{HardwareFacts, RunSummary, Scheduler, SystemClock, TokioSleeper};
