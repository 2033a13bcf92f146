pub mod config;
pub mod orchestrator;

pub use orchestrator::{Orchestrator, ToolSettings};
