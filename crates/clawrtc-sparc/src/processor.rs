//! SPARC processor detection for RustChain antiquity classification.
//!
//! Reads `prtconf -v` for the processor model and `psrinfo -v` for clock
//! speed and processor count, then buckets the model into a [`SparcFamily`]
//! for multiplier lookup.

use crate::error::{ProbeError, ProbeResult};
use crate::host::{decode_lossy, Host};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Architecture tag reported for every device.
pub const ARCH_TAG: &str = "sparc";

const PRTCONF: &str = "/usr/sbin/prtconf";
const PSRINFO: &str = "/usr/sbin/psrinfo";

/// Processor family bucket used for reward multiplier lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SparcFamily {
    #[serde(rename = "UltraSPARC-I")]
    UltraSparcI,
    #[serde(rename = "UltraSPARC-II")]
    UltraSparcII,
    #[serde(rename = "UltraSPARC-IIi")]
    UltraSparcIIi,
    #[serde(rename = "UltraSPARC-IIe")]
    UltraSparcIIe,
    #[serde(rename = "UltraSPARC-III")]
    UltraSparcIII,
    #[serde(rename = "UltraSPARC-IIIi")]
    UltraSparcIIIi,
    #[serde(rename = "UltraSPARC-IV")]
    UltraSparcIV,
    #[serde(rename = "SPARC64")]
    Sparc64,
    #[serde(rename = "SPARC-T")]
    SparcT,
    #[serde(rename = "unknown")]
    Unknown,
}

/// UltraSPARC revision suffixes, most specific first. `IIIi` must precede
/// `III` and `IIi`, and `IIi`/`IIe` must precede `II`.
const ULTRASPARC_REVISIONS: &[(&str, SparcFamily)] = &[
    ("IIIi", SparcFamily::UltraSparcIIIi),
    ("III", SparcFamily::UltraSparcIII),
    ("IIi", SparcFamily::UltraSparcIIi),
    ("IIe", SparcFamily::UltraSparcIIe),
    ("II", SparcFamily::UltraSparcII),
    ("IV", SparcFamily::UltraSparcIV),
    ("I", SparcFamily::UltraSparcI),
];

impl SparcFamily {
    /// Every family, in multiplier-table order.
    pub const ALL: [SparcFamily; 10] = [
        SparcFamily::UltraSparcI,
        SparcFamily::UltraSparcII,
        SparcFamily::UltraSparcIIi,
        SparcFamily::UltraSparcIIe,
        SparcFamily::UltraSparcIII,
        SparcFamily::UltraSparcIIIi,
        SparcFamily::UltraSparcIV,
        SparcFamily::Sparc64,
        SparcFamily::SparcT,
        SparcFamily::Unknown,
    ];

    /// Classify a free-text model string.
    pub fn classify(model: &str) -> Self {
        if let Some(pos) = model.find("UltraSPARC") {
            let revision = model[pos + "UltraSPARC".len()..].trim_start_matches('-');
            for (suffix, family) in ULTRASPARC_REVISIONS {
                if revision.starts_with(suffix) {
                    return *family;
                }
            }
        }
        if model.contains("SPARC64") {
            return SparcFamily::Sparc64;
        }
        if model.contains("SPARC-T") || model.contains("T1") || model.contains("T2") {
            return SparcFamily::SparcT;
        }
        SparcFamily::Unknown
    }

    /// Canonical family name as sent to the node.
    pub fn as_str(&self) -> &'static str {
        match self {
            SparcFamily::UltraSparcI => "UltraSPARC-I",
            SparcFamily::UltraSparcII => "UltraSPARC-II",
            SparcFamily::UltraSparcIIi => "UltraSPARC-IIi",
            SparcFamily::UltraSparcIIe => "UltraSPARC-IIe",
            SparcFamily::UltraSparcIII => "UltraSPARC-III",
            SparcFamily::UltraSparcIIIi => "UltraSPARC-IIIi",
            SparcFamily::UltraSparcIV => "UltraSPARC-IV",
            SparcFamily::Sparc64 => "SPARC64",
            SparcFamily::SparcT => "SPARC-T",
            SparcFamily::Unknown => "unknown",
        }
    }

    /// Antiquity reward multiplier advertised by the network.
    pub fn multiplier(&self) -> f64 {
        match self {
            SparcFamily::UltraSparcI => 1.8,
            SparcFamily::UltraSparcII | SparcFamily::UltraSparcIIi => 1.6,
            SparcFamily::UltraSparcIIe => 1.5,
            SparcFamily::UltraSparcIII | SparcFamily::UltraSparcIIIi => 1.4,
            SparcFamily::UltraSparcIV => 1.3,
            SparcFamily::Sparc64 => 1.5,
            SparcFamily::SparcT => 1.1,
            SparcFamily::Unknown => 1.2,
        }
    }

    /// Lowercase, underscore-separated tag (e.g. `ultrasparc_iii`).
    pub fn device_arch(&self) -> String {
        self.as_str().to_lowercase().replace('-', "_")
    }
}

impl fmt::Display for SparcFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected processor facts. Computed once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorDescription {
    /// Always [`ARCH_TAG`].
    pub arch: String,
    pub family: SparcFamily,
    /// Best-effort model token, e.g. `UltraSPARC-IIi`. Never used for control flow.
    pub model: String,
    /// Clock speed in MHz, 0 when unknown.
    pub clock_mhz: u32,
    /// Number of virtual processors, at least 1.
    pub core_count: u32,
    /// Implementation name from `psrinfo`, may be empty.
    pub implementation: String,
}

impl Default for ProcessorDescription {
    fn default() -> Self {
        Self {
            arch: ARCH_TAG.to_string(),
            family: SparcFamily::Unknown,
            model: "unknown".to_string(),
            clock_mhz: 0,
            core_count: 1,
            implementation: String::new(),
        }
    }
}

/// Values pulled out of the per-processor status report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub clock_mhz: Option<u32>,
    pub core_count: u32,
    pub implementation: Option<String>,
}

impl ProcessorDescription {
    /// Probe the host. Never fails; unavailable sources leave defaults.
    pub fn probe<H: Host + ?Sized>(host: &H) -> Self {
        let mut desc = Self::default();

        match probe_model(host) {
            Ok(model) => desc.model = model,
            Err(e) => warn!(error = %e, "prtconf model probe failed"),
        }

        match probe_status(host) {
            Ok(status) => {
                if let Some(mhz) = status.clock_mhz {
                    desc.clock_mhz = mhz;
                }
                desc.core_count = status.core_count.max(1);
                if let Some(imp) = status.implementation {
                    if desc.model == "unknown" {
                        desc.model = imp.clone();
                    }
                    desc.implementation = imp;
                }
            }
            Err(e) => warn!(error = %e, "psrinfo probe failed"),
        }

        desc.family = SparcFamily::classify(&desc.model);
        debug!(model = %desc.model, family = %desc.family, "Processor classified");
        desc
    }
}

fn model_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(UltraSPARC[^\s,']+|SPARC64[^\s,']*|SPARC-T\d+)").expect("model pattern")
    })
}

fn implementation_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(UltraSPARC[^\s,']+|SPARC64[^\s,']*)").expect("implementation pattern")
    })
}

fn clock_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*MHz").expect("clock pattern"))
}

fn probe_model<H: Host + ?Sized>(host: &H) -> ProbeResult<String> {
    let dump = decode_lossy(&host.run(PRTCONF, &["-v"])?);
    parse_model_token(&dump).ok_or_else(|| ProbeError::unparsable("processor model in prtconf -v"))
}

fn probe_status<H: Host + ?Sized>(host: &H) -> ProbeResult<StatusReport> {
    let report = decode_lossy(&host.run(PSRINFO, &["-v"])?);
    Ok(parse_status_report(&report))
}

/// First model token on a line mentioning SPARC; scanning stops at the first hit.
pub fn parse_model_token(dump: &str) -> Option<String> {
    dump.lines()
        .filter(|line| line.contains("SPARC"))
        .find_map(|line| model_pattern().find(line))
        .map(|m| m.as_str().to_string())
}

/// Clock speed, processor count, and implementation from `psrinfo -v`.
pub fn parse_status_report(report: &str) -> StatusReport {
    let mut core_count = report.matches("Status of virtual processor").count();
    if core_count == 0 {
        core_count = report.matches("on-line").count();
    }

    let clock_mhz = clock_pattern()
        .captures(report)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let implementation = implementation_pattern()
        .find(report)
        .map(|m| m.as_str().to_string());

    StatusReport {
        clock_mhz,
        core_count: u32::try_from(core_count).unwrap_or(u32::MAX),
        implementation,
    }
}
