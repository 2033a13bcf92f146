mod repository;

pub use repository::BackupRepository;
