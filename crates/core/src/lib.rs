pub mod backup;
pub mod compression;
pub mod connection;
pub mod error;
pub mod platform;

pub use backup::{is_compressed, BackupFile, COMPRESSED_EXTENSION, SQL_EXTENSION};
pub use compression::{compressor_program, Compression, ResolvedCompression, COMPRESSOR_PROGRAM};
pub use connection::ConnectionDescriptor;
pub use error::{DumpError, RemovalFailure, Result};
pub use platform::{native_profile, PlatformProfile, UnixProfile, WindowsProfile};
