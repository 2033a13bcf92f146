use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dbdump_core::{Compression, ConnectionDescriptor};
use serde::Deserialize;

use crate::orchestrator::ToolSettings;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub compression: CompressionConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backup_dir: Option<String>,
    /// Backups kept after each dump; unset disables pruning.
    pub keep: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub tool_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ToolsConfig {
    /// Directory containing mysqldump, mysql and mysqlcheck.
    pub install_dir: Option<String>,
}

/// Everything the binary needs, after environment overrides are applied.
#[derive(Debug)]
pub struct Settings {
    pub connection: ConnectionDescriptor,
    pub backup_dir: PathBuf,
    pub keep: Option<i64>,
    pub tools: ToolSettings,
}

/// Reads a TOML config file. Unknown keys are ignored and missing sections
/// fall back to their defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read dbdump config {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw)
        .with_context(|| format!("invalid dbdump config {}", path.display()))?;
    Ok(cfg)
}

impl Config {
    /// Applies `DBDUMP_*` overrides and derives the tool directory from
    /// `MYSQL_HOME` when the file does not set one. `lookup` is read once
    /// here so nothing downstream touches the environment.
    pub fn into_settings(self, lookup: impl Fn(&str) -> Option<String>) -> Settings {
        let pick = |key: &str, fallback: Option<String>| lookup(key).or(fallback);

        let host = pick("DBDUMP_HOST", self.database.host).unwrap_or_else(|| "localhost".to_owned());
        let name = pick("DBDUMP_DATABASE", self.database.name).unwrap_or_default();
        let user = pick("DBDUMP_USER", self.database.user).unwrap_or_default();
        let password = pick("DBDUMP_PASSWORD", self.database.password).unwrap_or_default();

        let backup_dir = pick("DBDUMP_BACKUP_DIR", self.storage.backup_dir)
            .unwrap_or_else(|| "./backups".to_owned());

        let tool_dir = self.tools.install_dir.or_else(|| {
            lookup("MYSQL_HOME").map(|home| Path::new(&home).join("bin").to_string_lossy().into_owned())
        });

        let compression = match (self.compression.enabled, self.compression.tool_dir) {
            (false, _) => Compression::Disabled,
            (true, Some(dir)) => Compression::Directory(dir),
            (true, None) => Compression::SearchPath,
        };

        Settings {
            connection: ConnectionDescriptor::new(host, name, user, password),
            backup_dir: PathBuf::from(backup_dir),
            keep: self.storage.keep,
            tools: ToolSettings {
                tool_dir,
                compression,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_full_file() {
        let cfg: Config = toml::from_str(
            r#"
            [database]
            host = "db.internal"
            name = "shop"
            user = "backup"
            password = "pw"

            [storage]
            backup_dir = "/var/backups/shop"
            keep = 5

            [compression]
            enabled = true
            tool_dir = "/usr/bin"

            [tools]
            install_dir = "/opt/mysql/bin"
            "#,
        )
        .expect("parse");

        let settings = cfg.into_settings(env(&[]));
        assert_eq!(settings.connection.host(), "db.internal");
        assert_eq!(settings.connection.name(), "shop");
        assert_eq!(settings.backup_dir, PathBuf::from("/var/backups/shop"));
        assert_eq!(settings.keep, Some(5));
        assert_eq!(settings.tools.tool_dir.as_deref(), Some("/opt/mysql/bin"));
        assert_eq!(settings.tools.compression, Compression::Directory("/usr/bin".to_owned()));
    }

    #[test]
    fn environment_overrides_file_values() {
        let cfg: Config = toml::from_str("[database]\nname = \"shop\"\npassword = \"file\"\n").expect("parse");
        let settings = cfg
            .into_settings(env(&[
                ("DBDUMP_PASSWORD", "env-secret"),
                ("DBDUMP_BACKUP_DIR", "/srv/dumps"),
                ("MYSQL_HOME", "/usr/local/mysql"),
            ]));

        assert_eq!(settings.connection.password(), "env-secret");
        assert_eq!(settings.connection.host(), "localhost");
        assert_eq!(settings.backup_dir, PathBuf::from("/srv/dumps"));
        assert_eq!(
            settings.tools.tool_dir.as_deref().map(Path::new),
            Some(Path::new("/usr/local/mysql/bin"))
        );
        assert_eq!(settings.tools.compression, Compression::Disabled);
    }

    #[test]
    fn compression_without_directory_uses_search_path() {
        let cfg: Config =
            toml::from_str("[database]\nname = \"shop\"\n[compression]\nenabled = true\n").expect("parse");
        let settings = cfg.into_settings(env(&[]));
        assert_eq!(settings.tools.compression, Compression::SearchPath);
        assert_eq!(settings.keep, None);
    }

    #[test]
    fn load_config_reads_file_and_reports_bad_toml() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let good = tmp.path().join("dbdump.toml");
        std::fs::write(&good, "[database]\nname = \"shop\"\n[storage]\nkeep = 3\n").expect("write");
        let cfg = load_config(&good).expect("load");
        assert_eq!(cfg.database.name.as_deref(), Some("shop"));
        assert_eq!(cfg.storage.keep, Some(3));

        let bad = tmp.path().join("bad.toml");
        std::fs::write(&bad, "[storage]\nkeep = \"many\"\n").expect("write");
        let err = load_config(&bad).unwrap_err();
        assert!(err.to_string().starts_with("invalid dbdump config"));

        let err = load_config(&tmp.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().starts_with("read dbdump config"));
    }

    #[test]
    fn defaults_apply_without_file() {
        let settings = Config::default().into_settings(env(&[]));
        assert_eq!(settings.connection.host(), "localhost");
        assert_eq!(settings.connection.name(), "");
        assert_eq!(settings.backup_dir, PathBuf::from("./backups"));
        assert_eq!(settings.tools.tool_dir, None);
    }
}
