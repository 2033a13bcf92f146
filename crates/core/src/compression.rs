use std::path::Path;

use crate::error::{DumpError, Result};
use crate::platform::PlatformProfile;

pub const COMPRESSOR_PROGRAM: &str = "bzip2";

/// Compression requested by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Disabled,
    /// Compress with the compressor found on the search path.
    SearchPath,
    /// Compress with the compressor installed in this directory.
    Directory(String),
}

/// Compression after validation against a platform profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCompression {
    Disabled,
    Enabled { tool_dir: Option<String> },
}

impl Compression {
    /// Validates the setting once, at construction time. A supplied directory
    /// must contain an executable compressor; platforms that cannot rely on the
    /// search path reject `SearchPath` outright.
    pub fn resolve(self, profile: &dyn PlatformProfile) -> Result<ResolvedCompression> {
        let dir = match self {
            Compression::Disabled => return Ok(ResolvedCompression::Disabled),
            Compression::SearchPath => String::new(),
            Compression::Directory(dir) => profile.normalize_dir(&dir),
        };

        if dir.is_empty() {
            if profile.requires_explicit_compressor() {
                return Err(DumpError::Configuration(format!(
                    "compression requires an explicit {COMPRESSOR_PROGRAM} directory on this platform"
                )));
            }
            return Ok(ResolvedCompression::Enabled { tool_dir: None });
        }

        let program = compressor_program(Some(&dir), profile);
        if !profile.is_executable(Path::new(&program)) {
            return Err(DumpError::Configuration(format!(
                "compressor {program} is missing or not executable"
            )));
        }
        Ok(ResolvedCompression::Enabled {
            tool_dir: Some(dir),
        })
    }
}

impl ResolvedCompression {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ResolvedCompression::Enabled { .. })
    }

    pub fn tool_dir(&self) -> Option<&str> {
        match self {
            ResolvedCompression::Enabled { tool_dir } => tool_dir.as_deref(),
            ResolvedCompression::Disabled => None,
        }
    }
}

/// Full compressor program name for an already normalized tool directory.
pub fn compressor_program(tool_dir: Option<&str>, profile: &dyn PlatformProfile) -> String {
    format!(
        "{}{COMPRESSOR_PROGRAM}{}",
        tool_dir.unwrap_or_default(),
        profile.executable_extension()
    )
}
