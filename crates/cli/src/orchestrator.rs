use std::sync::Arc;

use chrono::Local;
use dbdump_core::{
    Compression, ConnectionDescriptor, DumpError, PlatformProfile, Result, COMPRESSED_EXTENSION,
    SQL_EXTENSION,
};
use dbdump_exec::{CommandBuilder, ProcessRunner, PipelineRunner};
use dbdump_storage::BackupRepository;
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where the external tools live and whether dumps are compressed.
#[derive(Debug, Clone, Default)]
pub struct ToolSettings {
    /// Directory holding mysqldump, mysql and mysqlcheck. `None` uses the
    /// search path.
    pub tool_dir: Option<String>,
    pub compression: Compression,
}

/// Dumps a database into the backup repository and restores it from there.
///
/// Each operation runs one external pipeline and blocks until it exits.
/// Nothing is shared between operations besides the connection and the
/// compression setting fixed at construction, and nothing coordinates
/// concurrent use of the same backup directory.
#[derive(Debug)]
pub struct Orchestrator<R = PipelineRunner> {
    conn: ConnectionDescriptor,
    builder: CommandBuilder,
    repo: BackupRepository,
    runner: R,
}

impl Orchestrator<PipelineRunner> {
    pub fn new(
        conn: ConnectionDescriptor,
        repo: BackupRepository,
        tools: ToolSettings,
        profile: Arc<dyn PlatformProfile>,
    ) -> Result<Self> {
        let runner = PipelineRunner::new(Arc::clone(&profile));
        Self::with_runner(conn, repo, tools, profile, runner)
    }
}

impl<R: ProcessRunner> Orchestrator<R> {
    /// Fails with a configuration error when the compression setting does
    /// not resolve to a usable compressor.
    pub fn with_runner(
        conn: ConnectionDescriptor,
        repo: BackupRepository,
        tools: ToolSettings,
        profile: Arc<dyn PlatformProfile>,
        runner: R,
    ) -> Result<Self> {
        let compression = tools.compression.resolve(profile.as_ref())?;
        let builder = CommandBuilder::new(tools.tool_dir.as_deref(), compression, profile);
        Ok(Self {
            conn,
            builder,
            repo,
            runner,
        })
    }

    pub fn repository(&self) -> &BackupRepository {
        &self.repo
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Dumps into `<host>-<database>-<YYYYMMDD_HHMMSS>.sql[.bz2]` and returns
    /// the filename.
    pub fn dump(&self, optimize_first: bool) -> Result<String> {
        self.dump_with(optimize_first, |host, name| {
            format!("{host}-{name}-{}", Local::now().format(TIMESTAMP_FORMAT))
        })
    }

    /// Like [`Orchestrator::dump`], with `formatter(host, database)` supplying
    /// the base name. The extensions are always appended.
    pub fn dump_with<F>(&self, optimize_first: bool, formatter: F) -> Result<String>
    where
        F: FnOnce(&str, &str) -> String,
    {
        let mut filename = formatter(self.conn.host(), self.conn.name());
        filename.push_str(SQL_EXTENSION);
        if self.builder.compression().is_enabled() {
            filename.push_str(COMPRESSED_EXTENSION);
        }
        let path = self.repo.resolve_path(&filename)?;

        if optimize_first {
            self.optimize()?;
        }

        let pipeline = self.builder.dump_command(&self.conn, &path);
        if let Err(err) = self.runner.run(&pipeline) {
            self.discard_partial(&filename);
            return Err(err);
        }

        info!(%filename, database = self.conn.name(), "dump created");
        Ok(filename)
    }

    /// Imports a file previously returned by a dump. Compressed files are
    /// decompressed on the fly.
    pub fn restore(&self, filename: &str) -> Result<()> {
        if filename.is_empty() {
            return Err(DumpError::InvalidArgument(
                "restore needs a backup filename".to_owned(),
            ));
        }
        let backup = self.repo.get(filename)?;

        let pipeline = self.builder.restore_command(&self.conn, &backup.path)?;
        self.runner.run(&pipeline)?;

        info!(filename, database = self.conn.name(), "restore finished");
        Ok(())
    }

    /// Restores the most recently created backup and returns its filename.
    pub fn restore_latest(&self) -> Result<String> {
        let latest = self
            .repo
            .latest()?
            .ok_or_else(|| DumpError::NotFound("no backups in repository".to_owned()))?;
        self.restore(&latest.filename)?;
        Ok(latest.filename)
    }

    fn discard_partial(&self, filename: &str) {
        match self.repo.remove(filename) {
            Ok(()) | Err(DumpError::NotFound(_)) => {}
            Err(e) => warn!(filename, error = %e, "failed to remove partial dump"),
        }
    }

    fn optimize(&self) -> Result<()> {
        self.runner.run(&self.builder.optimize_command(&self.conn))?;
        info!(database = self.conn.name(), "tables optimized");
        Ok(())
    }
}
