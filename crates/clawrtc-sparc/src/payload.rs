//! Attestation payload for `POST /attest/submit`.
//!
//! Field names match the node's expected JSON exactly; the record is rebuilt
//! with a fresh nonce for every submission and never persisted.

use crate::identity::{HardwareFingerprint, OS_NAME};
use crate::processor::{ProcessorDescription, SparcFamily};
use serde::{Deserialize, Serialize};

/// The full attestation body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationRecord {
    /// Wallet / principal identifier.
    pub miner: String,
    /// `<miner>-<hostid>`.
    pub miner_id: String,
    /// Milliseconds since the Unix epoch at build time.
    pub nonce: u64,
    pub device: DevicePayload,
    pub signals: HardwareFingerprint,
    pub report: ReportBlock,
    pub fingerprint: ChecksSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePayload {
    pub model: String,
    pub arch: String,
    pub family: SparcFamily,
    pub device_arch: String,
    pub clock_mhz: u32,
    pub ncpus: u32,
}

/// Client and OS identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportBlock {
    pub version: String,
    pub os: String,
    pub os_version: String,
}

impl ReportBlock {
    pub fn new(client_version: &str, os_version: &str) -> Self {
        Self {
            version: client_version.to_string(),
            os: OS_NAME.to_string(),
            os_version: os_version.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksSummary {
    /// Equal to `checks.anti_emulation.passed`; nothing else feeds it.
    pub all_passed: bool,
    pub checks: Checks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checks {
    pub hostid: PassFlag,
    pub prtconf: PassFlag,
    pub anti_emulation: AntiEmulationCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassFlag {
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiEmulationCheck {
    pub passed: bool,
    pub data: AntiEmulationData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiEmulationData {
    pub is_zone: bool,
    pub is_ldom: bool,
}

impl ChecksSummary {
    pub fn from_fingerprint(fp: &HardwareFingerprint) -> Self {
        let anti_emulation = AntiEmulationCheck {
            passed: fp.anti_emulation_passed(),
            data: AntiEmulationData {
                is_zone: fp.is_zone,
                is_ldom: fp.is_ldom,
            },
        };
        Self {
            all_passed: anti_emulation.passed,
            checks: Checks {
                hostid: PassFlag {
                    passed: fp.hostid_valid(),
                },
                prtconf: PassFlag {
                    passed: fp.digest_valid(),
                },
                anti_emulation,
            },
        }
    }
}

impl AttestationRecord {
    /// Assemble a record. Deterministic apart from `nonce_ms`.
    pub fn build(
        principal: &str,
        cpu: &ProcessorDescription,
        fp: &HardwareFingerprint,
        report: &ReportBlock,
        nonce_ms: u64,
    ) -> Self {
        Self {
            miner: principal.to_string(),
            miner_id: format!("{}-{}", principal, fp.hostid),
            nonce: nonce_ms,
            device: DevicePayload {
                model: cpu.model.clone(),
                arch: cpu.arch.clone(),
                family: cpu.family,
                device_arch: cpu.family.device_arch(),
                clock_mhz: cpu.clock_mhz,
                ncpus: cpu.core_count,
            },
            signals: fp.clone(),
            report: report.clone(),
            fingerprint: ChecksSummary::from_fingerprint(fp),
        }
    }
}
