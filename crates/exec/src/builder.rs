use std::path::Path;
use std::sync::Arc;

use dbdump_core::{
    compressor_program, is_compressed, ConnectionDescriptor, DumpError, PlatformProfile,
    ResolvedCompression, Result, COMPRESSOR_PROGRAM,
};

use crate::command::{Invocation, Pipeline};

pub const DUMP_PROGRAM: &str = "mysqldump";
pub const RESTORE_PROGRAM: &str = "mysql";
pub const OPTIMIZE_PROGRAM: &str = "mysqlcheck";

/// Composes tool invocations for one installation directory, compression
/// setting and platform.
///
/// Arguments are assumed to come from trusted configuration; nothing here
/// sanitizes them.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    tool_dir: String,
    compression: ResolvedCompression,
    profile: Arc<dyn PlatformProfile>,
}

impl CommandBuilder {
    /// `tool_dir` is where the dump, restore and optimize programs live;
    /// `None` leaves them to the search path.
    pub fn new(
        tool_dir: Option<&str>,
        compression: ResolvedCompression,
        profile: Arc<dyn PlatformProfile>,
    ) -> Self {
        let tool_dir = profile.normalize_dir(tool_dir.unwrap_or_default());
        Self {
            tool_dir,
            compression,
            profile,
        }
    }

    pub fn compression(&self) -> &ResolvedCompression {
        &self.compression
    }

    pub fn profile(&self) -> &Arc<dyn PlatformProfile> {
        &self.profile
    }

    /// `mysqldump ... > output`, or `mysqldump ... | bzip2 -c > output` when
    /// compression is enabled.
    pub fn dump_command(&self, conn: &ConnectionDescriptor, output: &Path) -> Pipeline {
        let dump = self.base(DUMP_PROGRAM, conn, &[]);
        let pipeline = match &self.compression {
            ResolvedCompression::Enabled { tool_dir } => Pipeline::new(dump).pipe(
                Invocation::new(compressor_program(tool_dir.as_deref(), self.profile.as_ref()))
                    .arg("-c"),
            ),
            ResolvedCompression::Disabled => Pipeline::new(dump),
        };
        pipeline.write_to(output)
    }

    /// `mysql ... < input`, or `bzip2 -dc input | mysql ...` when the file
    /// name marks it as compressed.
    pub fn restore_command(&self, conn: &ConnectionDescriptor, input: &Path) -> Result<Pipeline> {
        let restore = self.base(RESTORE_PROGRAM, conn, &[]);
        let compressed = input
            .file_name()
            .is_some_and(|name| is_compressed(&name.to_string_lossy()));
        if !compressed {
            return Ok(Pipeline::new(restore).read_from(input));
        }

        let decompress = Invocation::new(self.decompressor()?)
            .arg("-dc")
            .arg(input.to_string_lossy());
        Ok(Pipeline::new(decompress).pipe(restore))
    }

    pub fn optimize_command(&self, conn: &ConnectionDescriptor) -> Pipeline {
        Pipeline::new(self.base(OPTIMIZE_PROGRAM, conn, &["--optimize"]))
    }

    fn base(&self, program: &str, conn: &ConnectionDescriptor, flags: &[&str]) -> Invocation {
        let mut invocation = Invocation::new(format!("{}{program}", self.tool_dir))
            .arg(format!("--user={}", conn.user()))
            .secret_arg("--password=", conn.password())
            .arg(format!("--host={}", conn.host()));
        for flag in flags {
            invocation = invocation.arg(*flag);
        }
        invocation.arg(conn.name())
    }

    // Restoring a compressed file needs a decompressor even when dumps are
    // written uncompressed.
    fn decompressor(&self) -> Result<String> {
        match self.compression.tool_dir() {
            Some(dir) => Ok(compressor_program(Some(dir), self.profile.as_ref())),
            None if self.profile.requires_explicit_compressor() => Err(DumpError::Configuration(
                format!("restoring a compressed backup requires a configured {COMPRESSOR_PROGRAM} directory"),
            )),
            None => Ok(compressor_program(None, self.profile.as_ref())),
        }
    }
}
