//! Virtualization warnings shown to the operator.
//!
//! Purely informational: warnings never block or alter a submission. The node
//! applies the reduced reward itself based on the `signals` it receives.

use crate::identity::{is_sentinel_hostid, HardwareFingerprint};
use serde::Serialize;
use std::fmt;

/// One anti-spoofing finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpoofWarning {
    /// Running inside a Solaris zone.
    Sandboxed,
    /// Running inside an LDOM.
    Virtualized,
    /// hostid is `unknown`, all zeros, or all `f`.
    InvalidHostId,
}

impl fmt::Display for SpoofWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpoofWarning::Sandboxed => f.write_str("Running in Solaris Zone - minimal rewards"),
            SpoofWarning::Virtualized => f.write_str("Running in LDOM - minimal rewards"),
            SpoofWarning::InvalidHostId => f.write_str("Invalid hostid - possible virtual machine"),
        }
    }
}

/// Evaluate every rule in fixed order: zone, LDOM, hostid.
pub fn evaluate(fp: &HardwareFingerprint) -> Vec<SpoofWarning> {
    let mut warnings = Vec::new();
    if fp.is_zone {
        warnings.push(SpoofWarning::Sandboxed);
    }
    if fp.is_ldom {
        warnings.push(SpoofWarning::Virtualized);
    }
    if is_sentinel_hostid(&fp.hostid) {
        warnings.push(SpoofWarning::InvalidHostId);
    }
    warnings
}
