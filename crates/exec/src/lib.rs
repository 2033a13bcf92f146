//! Command construction and execution for the external dump, restore,
//! optimize and compression tools.

pub mod builder;
pub mod command;
pub mod runner;

pub use builder::{CommandBuilder, DUMP_PROGRAM, OPTIMIZE_PROGRAM, RESTORE_PROGRAM};
pub use command::{Invocation, Pipeline};
pub use runner::{ProcessRunner, PipelineRunner};
