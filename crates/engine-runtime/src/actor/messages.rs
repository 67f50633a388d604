use crate::error::PipelineError;
use engine_processing::runner::RunMode;
use model::execution::{batch::TransformTrigger, run::RunSummary};
use tokio::sync::oneshot;

pub type RunReply = oneshot::Sender<Result<RunSummary, PipelineError>>;

/// Messages for a partition worker.
#[derive(Debug)]
pub enum PartitionMsg {
    /// Run one batch. The summary goes to `reply` when the caller waits for
    /// it; otherwise it is only logged.
    Run {
        trigger: TransformTrigger,
        mode: RunMode,
        reply: Option<RunReply>,
    },
}
