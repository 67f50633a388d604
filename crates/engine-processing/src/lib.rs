pub mod batching;
pub mod error;
pub mod ingest;
pub mod layout;
pub mod router;
pub mod runner;
pub mod sentiment;
pub mod transform;
pub mod writer;
