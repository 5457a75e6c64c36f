//! Hardware identity signals for the attestation `signals` block.
//!
//! Collects the Solaris hostid, a digest of the `prtconf` dump, the OpenBoot
//! PROM version, installed memory, and zone/LDOM markers. Every step fails
//! independently to its documented default.

use crate::error::{ProbeError, ProbeResult};
use crate::host::{decode_lossy, decode_strict, Host};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use tracing::{debug, warn};

const HOSTID: &str = "/usr/bin/hostid";
const PRTCONF: &str = "/usr/sbin/prtconf";
const RELEASE_FILE: &str = "/etc/release";

/// Both must exist for the process to count as running inside a zone.
const ZONE_MARKERS: [&str; 2] = ["/etc/zones", "/.SUNWnative"];
const LDOM_MARKER: &str = "/dev/ldomsd";

/// Placeholder for identity fields that could not be collected.
pub const UNKNOWN: &str = "unknown";

/// Operating system name reported to the node.
pub const OS_NAME: &str = "Solaris";

/// Length of the truncated configuration digest, in hex characters.
pub const DIGEST_HEX_LEN: usize = 16;

/// Collected hardware identity. Computed once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareFingerprint {
    /// Solaris hostid, or `unknown`.
    pub hostid: String,
    /// First 16 hex chars of SHA-256 over the raw `prtconf` output, or `unknown`.
    pub prtconf_hash: String,
    /// OpenBoot PROM version string, or `unknown`.
    pub obp_version: String,
    /// Installed memory in megabytes, 0 when unknown.
    pub memory_mb: u64,
    /// Running inside a Solaris zone.
    pub is_zone: bool,
    /// Running inside a logical domain.
    pub is_ldom: bool,
}

impl Default for HardwareFingerprint {
    fn default() -> Self {
        Self {
            hostid: UNKNOWN.to_string(),
            prtconf_hash: UNKNOWN.to_string(),
            obp_version: UNKNOWN.to_string(),
            memory_mb: 0,
            is_zone: false,
            is_ldom: false,
        }
    }
}

impl HardwareFingerprint {
    /// Collect every signal from the host. Never fails.
    pub fn collect<H: Host + ?Sized>(host: &H) -> Self {
        let mut fp = Self::default();

        match collect_hostid(host) {
            Ok(id) => fp.hostid = id,
            Err(e) => warn!(error = %e, "hostid unavailable"),
        }

        match host.run(PRTCONF, &[]) {
            Ok(dump) => {
                match config_digest(&dump) {
                    Ok(digest) => fp.prtconf_hash = digest,
                    Err(e) => warn!(error = %e, "prtconf digest unavailable"),
                }
                match parse_memory_mb(&decode_lossy(&dump)) {
                    Ok(mb) => fp.memory_mb = mb,
                    Err(e) => warn!(error = %e, "memory size unavailable"),
                }
            }
            Err(e) => warn!(error = %e, "prtconf unavailable"),
        }

        match collect_obp_version(host) {
            Ok(v) => fp.obp_version = v,
            Err(e) => warn!(error = %e, "OBP version unavailable"),
        }

        fp.is_zone = ZONE_MARKERS.iter().all(|p| host.path_exists(p));
        fp.is_ldom = host.path_exists(LDOM_MARKER);

        debug!(
            hostid = %fp.hostid,
            prtconf_hash = %fp.prtconf_hash,
            memory_mb = fp.memory_mb,
            is_zone = fp.is_zone,
            is_ldom = fp.is_ldom,
            "Hardware fingerprint collected"
        );
        fp
    }

    /// Whether the hostid looks like real hardware rather than a placeholder.
    pub fn hostid_valid(&self) -> bool {
        !is_sentinel_hostid(&self.hostid)
    }

    /// Whether the configuration digest was collected.
    pub fn digest_valid(&self) -> bool {
        self.prtconf_hash != UNKNOWN
    }

    /// No zone or LDOM marker is present.
    pub fn anti_emulation_passed(&self) -> bool {
        !(self.is_zone || self.is_ldom)
    }
}

/// `unknown`, empty, all zeros, or all `f`: values VMs and broken installs report.
pub fn is_sentinel_hostid(hostid: &str) -> bool {
    hostid.is_empty()
        || hostid == UNKNOWN
        || hostid.chars().all(|c| c == '0')
        || hostid.chars().all(|c| c.eq_ignore_ascii_case(&'f'))
}

/// Truncated SHA-256 over the raw dump bytes.
pub fn config_digest(dump: &[u8]) -> ProbeResult<String> {
    if dump.is_empty() {
        return Err(ProbeError::unparsable("empty prtconf output"));
    }
    let mut digest = hex::encode(Sha256::digest(dump));
    digest.truncate(DIGEST_HEX_LEN);
    Ok(digest)
}

fn memory_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Memory size:\s*(\d+)").expect("memory pattern"))
}

/// `Memory size: <n> Megabytes` from a `prtconf` dump.
pub fn parse_memory_mb(dump: &str) -> ProbeResult<u64> {
    memory_pattern()
        .captures(dump)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ProbeError::unparsable("Memory size in prtconf"))
}

fn collect_hostid<H: Host + ?Sized>(host: &H) -> ProbeResult<String> {
    let id = decode_strict(host.run(HOSTID, &[])?, "hostid output")?
        .trim()
        .to_string();
    if id.is_empty() {
        return Err(ProbeError::unparsable("hostid output"));
    }
    Ok(id)
}

fn collect_obp_version<H: Host + ?Sized>(host: &H) -> ProbeResult<String> {
    let version = decode_strict(host.run(PRTCONF, &["-V"])?, "prtconf -V output")?
        .trim()
        .to_string();
    if version.is_empty() {
        return Err(ProbeError::unparsable("prtconf -V output"));
    }
    Ok(version)
}

/// First line of `/etc/release`, or `Solaris` if it cannot be read.
pub fn os_version<H: Host + ?Sized>(host: &H) -> String {
    match host.read_to_string(RELEASE_FILE) {
        Ok(text) => match text.lines().next().map(str::trim) {
            Some(line) if !line.is_empty() => line.to_string(),
            _ => OS_NAME.to_string(),
        },
        Err(e) => {
            debug!(error = %e, "release file unavailable");
            OS_NAME.to_string()
        }
    }
}
