//! Access to the machine being attested: external tools, marker files, and
//! small text files.
//!
//! Probes and collectors only talk to the [`Host`] trait so tests can feed
//! them canned `prtconf`/`psrinfo` output.

use crate::error::{ProbeError, ProbeResult};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

/// Capabilities the hardware probes need from the operating system.
pub trait Host {
    /// Run `program` with `args` and return its stdout bytes.
    fn run(&self, program: &str, args: &[&str]) -> ProbeResult<Vec<u8>>;

    /// Whether `path` exists (file, directory, or device node).
    fn path_exists(&self, path: &str) -> bool;

    /// Read a whole text file.
    fn read_to_string(&self, path: &str) -> ProbeResult<String>;
}

/// [`Host`] backed by the real system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
    fn run(&self, program: &str, args: &[&str]) -> ProbeResult<Vec<u8>> {
        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ProbeError::ToolAbsent {
                    tool: program.to_string(),
                }
            } else {
                ProbeError::ToolFailed {
                    tool: program.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ToolFailed {
                tool: program.to_string(),
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(output.stdout)
    }

    fn path_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn read_to_string(&self, path: &str) -> ProbeResult<String> {
        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ProbeError::ToolAbsent {
                    tool: path.to_string(),
                }
            } else {
                ProbeError::ToolFailed {
                    tool: path.to_string(),
                    detail: e.to_string(),
                }
            }
        })
    }
}

/// Decode tool output, replacing invalid UTF-8 rather than failing.
pub(crate) fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Decode tool output, treating invalid UTF-8 as unparsable.
pub(crate) fn decode_strict(bytes: Vec<u8>, what: &str) -> ProbeResult<String> {
    String::from_utf8(bytes).map_err(|_| ProbeError::unparsable(what))
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted [`Host`] used by the probe and collector tests.

    use super::*;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    pub struct FakeHost {
        commands: HashMap<String, ProbeResult<Vec<u8>>>,
        paths: HashSet<String>,
        files: HashMap<String, String>,
    }

    impl FakeHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_output(mut self, command: &str, stdout: &str) -> Self {
            self.commands
                .insert(command.to_string(), Ok(stdout.as_bytes().to_vec()));
            self
        }

        pub fn with_bytes(mut self, command: &str, stdout: &[u8]) -> Self {
            self.commands.insert(command.to_string(), Ok(stdout.to_vec()));
            self
        }

        pub fn with_failure(mut self, command: &str, err: ProbeError) -> Self {
            self.commands.insert(command.to_string(), Err(err));
            self
        }

        pub fn with_path(mut self, path: &str) -> Self {
            self.paths.insert(path.to_string());
            self
        }

        pub fn with_file(mut self, path: &str, contents: &str) -> Self {
            self.files.insert(path.to_string(), contents.to_string());
            self
        }
    }

    impl Host for FakeHost {
        fn run(&self, program: &str, args: &[&str]) -> ProbeResult<Vec<u8>> {
            let key = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.commands
                .get(&key)
                .cloned()
                .unwrap_or_else(|| Err(ProbeError::ToolAbsent { tool: key }))
        }

        fn path_exists(&self, path: &str) -> bool {
            self.paths.contains(path)
        }

        fn read_to_string(&self, path: &str) -> ProbeResult<String> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| ProbeError::ToolAbsent {
                    tool: path.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_absent() {
        let err = SystemHost
            .run("/nonexistent/clawrtc-sparc-missing-tool", &[])
            .unwrap_err();
        assert!(matches!(err, ProbeError::ToolAbsent { .. }));
    }

    #[test]
    fn test_missing_file_is_absent() {
        let err = SystemHost
            .read_to_string("/nonexistent/clawrtc-sparc/release")
            .unwrap_err();
        assert!(matches!(err, ProbeError::ToolAbsent { .. }));
    }

    #[test]
    fn test_path_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        assert!(SystemHost.path_exists(path));
        assert!(!SystemHost.path_exists(&format!("{path}/missing")));
    }

    #[test]
    fn test_decode_strict_rejects_invalid_bytes() {
        assert_eq!(decode_strict(b"80f0ab12\n".to_vec(), "hostid").unwrap(), "80f0ab12\n");
        assert!(matches!(
            decode_strict(vec![0xff, 0xfe], "hostid"),
            Err(ProbeError::Unparsable { .. })
        ));
    }

    #[test]
    fn test_decode_lossy_replaces_invalid_bytes() {
        let text = decode_lossy(&[b'o', b'k', 0xff]);
        assert!(text.starts_with("ok"));
    }
}
