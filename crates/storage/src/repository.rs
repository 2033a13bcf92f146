use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use dbdump_core::{BackupFile, DumpError, RemovalFailure, Result};
use tracing::{info, warn};

/// The single directory holding every backup file, and the retention
/// operations over it. Filenames are the only persisted state.
#[derive(Debug, Clone)]
pub struct BackupRepository {
    root: PathBuf,
}

impl BackupRepository {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| DumpError::io(format!("create backup directory {}", root.display()), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `filename` onto the backup directory. Only a single plain path
    /// component is accepted, so the result never escapes the directory.
    pub fn resolve_path(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        Ok(self.root.join(filename))
    }

    /// All regular files in the backup directory, oldest first.
    pub fn list(&self) -> Result<Vec<BackupFile>> {
        self.list_by(BackupFile::oldest_first)
    }

    /// All regular files, ordered entirely by `compare`.
    pub fn list_by<F>(&self, compare: F) -> Result<Vec<BackupFile>>
    where
        F: FnMut(&BackupFile, &BackupFile) -> Ordering,
    {
        let mut files = self.scan()?;
        files.sort_by(compare);
        Ok(files)
    }

    pub fn get(&self, filename: &str) -> Result<BackupFile> {
        let path = self.resolve_path(filename)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(record(filename.to_owned(), path, &meta)),
            Ok(_) => Err(DumpError::NotFound(filename.to_owned())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DumpError::NotFound(filename.to_owned()))
            }
            Err(e) => Err(DumpError::io(format!("stat {}", path.display()), e)),
        }
    }

    pub fn latest(&self) -> Result<Option<BackupFile>> {
        Ok(self.list_by(BackupFile::newest_first)?.into_iter().next())
    }

    pub fn remove(&self, filename: &str) -> Result<()> {
        let path = self.resolve_path(filename)?;
        if !path.is_file() {
            return Err(DumpError::NotFound(filename.to_owned()));
        }
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DumpError::NotFound(filename.to_owned()),
            _ => DumpError::io(format!("remove {}", path.display()), e),
        })?;
        info!(filename, "backup removed");
        Ok(())
    }

    /// Keeps the `keep` most recently created backups and deletes the rest.
    ///
    /// Deletion is not transactional: every surplus file is attempted, and
    /// the failures are reported together once all attempts are made, along
    /// with the files that were removed. Returns the removed records.
    pub fn remove_old(&self, keep: i64) -> Result<Vec<BackupFile>> {
        self.remove_old_with(keep, |path| fs::remove_file(path))
    }

    fn remove_old_with<F>(&self, keep: i64, mut remove: F) -> Result<Vec<BackupFile>>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let keep = usize::try_from(keep).map_err(|_| {
            DumpError::InvalidArgument(format!("retention count must not be negative, got {keep}"))
        })?;

        let files = self.list_by(BackupFile::newest_first)?;
        let mut removed = Vec::new();
        let mut failures = Vec::new();
        for file in files.into_iter().skip(keep) {
            match remove(&file.path) {
                Ok(()) => removed.push(file),
                Err(source) => {
                    warn!(filename = %file.filename, error = %source, "failed to remove old backup");
                    failures.push(RemovalFailure {
                        filename: file.filename,
                        source,
                    });
                }
            }
        }

        if !removed.is_empty() || !failures.is_empty() {
            info!(
                removed = removed.len(),
                failed = failures.len(),
                keep,
                "retention pruning finished"
            );
        }
        if !failures.is_empty() {
            return Err(DumpError::AggregateRemoval {
                removed: removed.into_iter().map(|f| f.filename).collect(),
                failures,
            });
        }
        Ok(removed)
    }

    fn scan(&self) -> Result<Vec<BackupFile>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            DumpError::io(format!("list backup directory {}", self.root.display()), e)
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                DumpError::io(format!("list backup directory {}", self.root.display()), e)
            })?;
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                // Removed between read_dir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(DumpError::io(format!("stat {}", entry.path().display()), e))
                }
            };
            if !meta.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().into_owned();
            files.push(record(filename, entry.path(), &meta));
        }
        Ok(files)
    }
}

fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(DumpError::InvalidArgument("backup filename is empty".to_owned()));
    }
    if filename == "." || filename == ".." || filename.contains(['/', '\\', '\0']) {
        return Err(DumpError::InvalidArgument(format!(
            "backup filename {filename:?} must not leave the backup directory"
        )));
    }
    Ok(())
}

fn record(filename: String, path: PathBuf, meta: &fs::Metadata) -> BackupFile {
    let created = meta
        .created()
        .or_else(|_| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    BackupFile {
        filename,
        path,
        created_at: DateTime::<Utc>::from(created),
        size_bytes: meta.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn seed(repo: &BackupRepository, names: &[&str]) {
        for name in names {
            fs::write(repo.root().join(name), name.as_bytes()).expect("write backup");
            // Distinct creation times even on coarse filesystem clocks.
            sleep(Duration::from_millis(30));
        }
    }

    fn names(files: &[BackupFile]) -> Vec<&str> {
        files.iter().map(|f| f.filename.as_str()).collect()
    }

    #[test]
    fn new_creates_missing_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("nested").join("backups");
        let repo = BackupRepository::new(&root).expect("repo");
        assert!(root.is_dir());
        assert!(repo.list().expect("list").is_empty());
    }

    #[test]
    fn resolve_path_joins_plain_names() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        let path = repo.resolve_path("snapshot.sql").expect("resolve");
        assert_eq!(path, tmp.path().join("snapshot.sql"));
    }

    #[test]
    fn resolve_path_rejects_traversal() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        for bad in ["../etc/passwd", "..", ".", "a/b.sql", r"..\x.sql", "/abs.sql", ""] {
            let err = repo.resolve_path(bad).unwrap_err();
            assert!(matches!(err, DumpError::InvalidArgument(_)), "{bad:?} accepted");
        }
    }

    #[test]
    fn list_is_oldest_first_and_skips_directories() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["c.sql", "a.sql", "b.sql.bz2"]);
        fs::create_dir(tmp.path().join("subdir")).expect("mkdir");

        let files = repo.list().expect("list");
        assert_eq!(names(&files), ["c.sql", "a.sql", "b.sql.bz2"]);
        assert_eq!(files[0].size_bytes, "c.sql".len() as u64);
    }

    #[test]
    fn custom_comparator_decides_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["b.sql", "c.sql", "a.sql"]);

        let files = repo.list_by(|x, y| x.filename.cmp(&y.filename)).expect("list");
        assert_eq!(names(&files), ["a.sql", "b.sql", "c.sql"]);
    }

    #[test]
    fn get_and_latest() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        assert!(repo.latest().expect("latest").is_none());

        seed(&repo, &["old.sql", "new.sql"]);
        assert_eq!(repo.latest().expect("latest").expect("some").filename, "new.sql");
        assert_eq!(repo.get("old.sql").expect("get").filename, "old.sql");
        assert!(matches!(repo.get("gone.sql"), Err(DumpError::NotFound(_))));
    }

    #[test]
    fn remove_deletes_or_reports_missing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["one.sql"]);

        repo.remove("one.sql").expect("remove");
        assert!(!tmp.path().join("one.sql").exists());
        assert!(matches!(repo.remove("one.sql"), Err(DumpError::NotFound(_))));
    }

    #[test]
    fn remove_old_keeps_newest() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["1.sql", "2.sql", "3.sql", "4.sql", "5.sql", "6.sql", "7.sql"]);

        let removed = repo.remove_old(5).expect("prune");
        let mut removed = names(&removed);
        removed.sort_unstable();
        assert_eq!(removed, ["1.sql", "2.sql"]);
        assert_eq!(
            names(&repo.list().expect("list")),
            ["3.sql", "4.sql", "5.sql", "6.sql", "7.sql"]
        );
    }

    #[test]
    fn remove_old_with_enough_room_removes_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["a.sql", "b.sql"]);

        assert!(repo.remove_old(2).expect("prune").is_empty());
        assert!(repo.remove_old(10).expect("prune").is_empty());
        assert_eq!(repo.list().expect("list").len(), 2);
    }

    #[test]
    fn remove_old_zero_removes_everything() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["a.sql", "b.sql", "c.sql"]);

        assert_eq!(repo.remove_old(0).expect("prune").len(), 3);
        assert!(repo.list().expect("list").is_empty());
    }

    #[test]
    fn remove_old_continues_past_failures_and_reports_them() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["1.sql", "2.sql", "3.sql", "4.sql", "5.sql"]);

        let stuck = tmp.path().join("2.sql");
        let err = repo
            .remove_old_with(2, |path| {
                if path == stuck {
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "file is locked"))
                } else {
                    fs::remove_file(path)
                }
            })
            .unwrap_err();

        match err {
            DumpError::AggregateRemoval { removed, failures } => {
                let mut removed = removed;
                removed.sort();
                assert_eq!(removed, ["1.sql", "3.sql"]);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].filename, "2.sql");
                assert_eq!(failures[0].source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(names(&repo.list().expect("list")), ["2.sql", "4.sql", "5.sql"]);
    }

    #[test]
    fn remove_old_reports_file_vanished_before_removal() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["a.sql", "b.sql", "c.sql"]);

        // Another process deletes `a.sql` after it was listed.
        let vanished = tmp.path().join("a.sql");
        let err = repo
            .remove_old_with(1, |path| {
                if path == vanished {
                    fs::remove_file(path)?;
                }
                fs::remove_file(path)
            })
            .unwrap_err();

        assert!(matches!(
            err,
            DumpError::AggregateRemoval { ref removed, ref failures }
                if removed == &["b.sql"] && failures.len() == 1 && failures[0].filename == "a.sql"
        ));
        assert_eq!(names(&repo.list().expect("list")), ["c.sql"]);
    }

    #[test]
    fn remove_old_negative_is_rejected_untouched() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = BackupRepository::new(tmp.path()).expect("repo");
        seed(&repo, &["a.sql"]);

        let err = repo.remove_old(-1).unwrap_err();
        assert!(matches!(err, DumpError::InvalidArgument(_)));
        assert_eq!(repo.list().expect("list").len(), 1);
    }
}
