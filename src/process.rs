//! Process identity labels
//!
//! Hostname and program name are looked up once per process and reused for
//! every observation.

use std::path::Path;
use std::sync::OnceLock;

/// Label value used when the OS lookup fails.
pub const UNKNOWN: &str = "unknown";

static RESOLVED: OnceLock<ProcessIdentity> = OnceLock::new();

/// Hostname and program name injected into every label tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    hostname: String,
    program: String,
}

impl ProcessIdentity {
    /// Identity with explicit values.
    pub fn new(hostname: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            program: program.into(),
        }
    }

    /// Identity of the running process, resolved on first call.
    pub fn resolve() -> &'static ProcessIdentity {
        RESOLVED.get_or_init(|| {
            Self::new(
                os_hostname().unwrap_or_else(|| UNKNOWN.to_string()),
                program_name().unwrap_or_else(|| UNKNOWN.to_string()),
            )
        })
    }

    /// Resolved identity with optional per-field overrides.
    pub fn with_overrides(hostname: Option<&str>, program: Option<&str>) -> Self {
        let resolved = Self::resolve();
        Self::new(
            hostname.unwrap_or(&resolved.hostname),
            program.unwrap_or(&resolved.program),
        )
    }

    /// Hostname label value.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Program label value.
    pub fn program(&self) -> &str {
        &self.program
    }
}

fn os_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
}

/// File name of the current executable, falling back to argv[0].
fn program_name() -> Option<String> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| file_name(&exe))
        .or_else(|| {
            std::env::args_os()
                .next()
                .and_then(|arg0| file_name(Path::new(&arg0)))
        })
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_stable() {
        let first = ProcessIdentity::resolve();
        let second = ProcessIdentity::resolve();
        assert!(std::ptr::eq(first, second));
        assert!(!first.hostname().is_empty());
        assert!(!first.program().is_empty());
    }

    #[test]
    fn test_overrides() {
        let resolved = ProcessIdentity::resolve();

        let both = ProcessIdentity::with_overrides(Some("h"), Some("p"));
        assert_eq!(both, ProcessIdentity::new("h", "p"));

        let host_only = ProcessIdentity::with_overrides(Some("h"), None);
        assert_eq!(host_only.hostname(), "h");
        assert_eq!(host_only.program(), resolved.program());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/usr/bin/server")).as_deref(), Some("server"));
        assert_eq!(file_name(Path::new("/")), None);
    }
}
