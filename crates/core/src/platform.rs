//! Platform conventions that change how external tools are addressed and launched.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Conventions of one target platform: path separators, executable naming,
/// command-line quoting, and whether the compressor has to be configured
/// explicitly.
pub trait PlatformProfile: fmt::Debug + Send + Sync {
    fn separator(&self) -> char;

    /// Suffix appended to the compressor program name (`.exe` on Windows).
    fn executable_extension(&self) -> &'static str;

    /// Whether compression tooling must come from a configured directory
    /// rather than the default search path.
    fn requires_explicit_compressor(&self) -> bool;

    /// Quotes one argument the way this platform's shell would need it, for
    /// command lines shown in logs and errors.
    fn quote(&self, arg: &str) -> String;

    fn is_executable(&self, path: &Path) -> bool;

    /// Converts `dir` to separator-terminated form. An empty directory stays
    /// empty, meaning "use the search path".
    fn normalize_dir(&self, dir: &str) -> String {
        if dir.is_empty() {
            return String::new();
        }
        let sep = self.separator();
        let mut out = if sep == '\\' {
            dir.replace('/', "\\")
        } else {
            dir.to_owned()
        };
        if !out.ends_with(sep) {
            out.push(sep);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProfile;

impl PlatformProfile for UnixProfile {
    fn separator(&self) -> char {
        '/'
    }

    fn executable_extension(&self) -> &'static str {
        ""
    }

    fn requires_explicit_compressor(&self) -> bool {
        false
    }

    fn quote(&self, arg: &str) -> String {
        let safe = !arg.is_empty()
            && arg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
        if safe {
            arg.to_owned()
        } else {
            format!("'{}'", arg.replace('\'', r"'\''"))
        }
    }

    fn is_executable(&self, path: &Path) -> bool {
        let Ok(meta) = path.metadata() else {
            return false;
        };
        if !meta.is_file() {
            return false;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsProfile;

impl PlatformProfile for WindowsProfile {
    fn separator(&self) -> char {
        '\\'
    }

    fn executable_extension(&self) -> &'static str {
        ".exe"
    }

    fn requires_explicit_compressor(&self) -> bool {
        true
    }

    fn quote(&self, arg: &str) -> String {
        let safe = !arg.is_empty()
            && !arg
                .chars()
                .any(|c| c.is_whitespace() || "\"&|<>^%".contains(c));
        if safe {
            arg.to_owned()
        } else {
            format!("\"{}\"", arg.replace('"', "\"\""))
        }
    }

    fn is_executable(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Profile of the platform this binary was compiled for.
pub fn native_profile() -> Arc<dyn PlatformProfile> {
    if cfg!(windows) {
        Arc::new(WindowsProfile)
    } else {
        Arc::new(UnixProfile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_dirs_become_backslash_terminated() {
        let profile = WindowsProfile;
        assert_eq!(profile.normalize_dir("C:/tools/bzip2"), r"C:\tools\bzip2\");
        assert_eq!(profile.normalize_dir(r"C:\tools\"), r"C:\tools\");
        assert_eq!(profile.normalize_dir(""), "");
    }

    #[test]
    fn unix_dirs_gain_trailing_slash() {
        let profile = UnixProfile;
        assert_eq!(profile.normalize_dir("/usr/local/mysql/bin"), "/usr/local/mysql/bin/");
        assert_eq!(profile.normalize_dir("/opt/"), "/opt/");
    }

    #[test]
    fn unix_quoting_leaves_plain_words_alone() {
        let profile = UnixProfile;
        assert_eq!(profile.quote("--host=db.local"), "--host=db.local");
        assert_eq!(profile.quote("pa ss"), "'pa ss'");
        assert_eq!(profile.quote("it's"), r"'it'\''s'");
        assert_eq!(profile.quote(""), "''");
    }

    #[test]
    fn windows_quoting_wraps_spaces_and_metacharacters() {
        let profile = WindowsProfile;
        assert_eq!(profile.quote("C:\\dumps\\a.sql"), "C:\\dumps\\a.sql");
        assert_eq!(profile.quote("a&b"), "\"a&b\"");
        assert_eq!(profile.quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[cfg(unix)]
    #[test]
    fn unix_executable_check_needs_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let tool = tmp.path().join("bzip2");
        std::fs::write(&tool, "#!/bin/sh\n").expect("write tool");
        assert!(!UnixProfile.is_executable(&tool));

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        assert!(UnixProfile.is_executable(&tool));
        assert!(!UnixProfile.is_executable(tmp.path()));
    }
}
