pub mod actor;
pub mod error;
pub mod execution;
pub mod watcher;

#[cfg(test)]
mod tests;

pub use execution::pipeline::{Pipeline, PipelineParts, ScanReport};
