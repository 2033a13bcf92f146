use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use dbdump_cli::config::{self, Config, Settings};
use dbdump_cli::Orchestrator;
use dbdump_core::native_profile;
use dbdump_storage::BackupRepository;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: dbdump [--config <path>] <dump [--optimize] | restore <file> | restore-latest | list | remove <file> | prune [keep]>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (cfg, args) = parse_args()?;
    let settings = cfg.into_settings(|key| env::var(key).ok());

    let Some((command, rest)) = args.split_first() else {
        bail!(USAGE);
    };
    match command.as_str() {
        "list" => list(&settings),
        "remove" => {
            let repo = BackupRepository::new(&settings.backup_dir)?;
            repo.remove(single_arg(rest, "remove")?)?;
            Ok(())
        }
        "prune" => {
            let keep = match rest {
                [] => settings.keep.context("prune needs a keep count or storage.keep")?,
                [n] => n.parse::<i64>().with_context(|| format!("invalid keep count: {n}"))?,
                _ => bail!(USAGE),
            };
            prune(&settings, keep)
        }
        "dump" => {
            let optimize = match rest {
                [] => false,
                [flag] if flag == "--optimize" => true,
                _ => bail!(USAGE),
            };
            dump(settings, optimize)
        }
        "restore" => {
            let orchestrator = orchestrator(settings)?;
            orchestrator.restore(single_arg(rest, "restore")?)?;
            Ok(())
        }
        "restore-latest" => {
            let restored = orchestrator(settings)?.restore_latest()?;
            info!(filename = %restored, "restored latest backup");
            Ok(())
        }
        other => bail!("unknown command `{other}`\n{USAGE}"),
    }
}

/// Parse CLI args, returning the loaded config and the remaining words.
fn parse_args() -> Result<(Config, Vec<String>)> {
    let mut config_path: Option<PathBuf> = None;
    let mut rest = Vec::new();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    bail!("--config requires a path argument");
                };
                config_path = Some(PathBuf::from(path));
            }
            _ => rest.push(arg),
        }
    }

    let cfg = match config_path {
        Some(path) => {
            info!(?path, "loading config file");
            config::load_config(&path)?
        }
        None => Config::default(),
    };
    Ok((cfg, rest))
}

fn single_arg<'a>(rest: &'a [String], command: &str) -> Result<&'a str> {
    match rest {
        [one] => Ok(one.as_str()),
        _ => bail!("{command} takes exactly one backup filename\n{USAGE}"),
    }
}

fn orchestrator(settings: Settings) -> Result<Orchestrator> {
    if settings.connection.name().is_empty() {
        bail!("database name is not configured (set database.name or DBDUMP_DATABASE)");
    }
    let repo = BackupRepository::new(&settings.backup_dir)?;
    Orchestrator::new(settings.connection, repo, settings.tools, native_profile())
        .context("configure dump tooling")
}

fn dump(settings: Settings, optimize: bool) -> Result<()> {
    let keep = settings.keep;
    let orchestrator = orchestrator(settings)?;
    let filename = orchestrator.dump(optimize)?;
    println!("{filename}");

    if let Some(keep) = keep {
        orchestrator.repository().remove_old(keep)?;
    }
    Ok(())
}

fn list(settings: &Settings) -> Result<()> {
    let repo = BackupRepository::new(&settings.backup_dir)?;
    let files = repo.list()?;
    println!("{}", serde_json::to_string_pretty(&files)?);
    Ok(())
}

fn prune(settings: &Settings, keep: i64) -> Result<()> {
    let repo = BackupRepository::new(&settings.backup_dir)?;
    let removed = repo.remove_old(keep)?;
    for file in &removed {
        println!("{}", file.filename);
    }
    Ok(())
}
