use crate::{
    actor::{
        actor::{Actor, ActorContext},
        messages::PartitionMsg,
    },
    error::{ActorError, PipelineError},
};
use async_trait::async_trait;
use engine_processing::runner::BatchRunner;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Runs the batches of one partition, one at a time, in mailbox order.
pub struct PartitionWorker {
    partition: String,
    runner: Arc<BatchRunner>,
    failed: u64,
}

impl PartitionWorker {
    pub fn new(partition: impl Into<String>, runner: Arc<BatchRunner>) -> Self {
        Self {
            partition: partition.into(),
            runner,
            failed: 0,
        }
    }
}

#[async_trait]
impl Actor<PartitionMsg> for PartitionWorker {
    async fn handle(&mut self, msg: PartitionMsg, ctx: &ActorContext) -> Result<(), ActorError> {
        let PartitionMsg::Run {
            trigger,
            mode,
            reply,
        } = msg;

        let result = self
            .runner
            .run(&trigger, mode)
            .await
            .map_err(PipelineError::from);

        match &result {
            Err(err) => {
                self.failed += 1;
                error!(
                    actor = ctx.name(),
                    batch_id = %trigger.batch_id,
                    error = %err,
                    "Batch could not be recorded"
                );
            }
            Ok(summary) if reply.is_none() => debug!(
                actor = ctx.name(),
                batch_id = %summary.batch_id,
                status = %summary.status,
                duplicate = summary.duplicate,
                "Batch finished"
            ),
            Ok(_) => {}
        }

        if let Some(reply) = reply {
            // The caller may have stopped waiting; the run is recorded either way.
            let _ = reply.send(result);
        }
        Ok(())
    }

    async fn on_stop(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(
            actor = ctx.name(),
            partition = %self.partition,
            batches = ctx.handled(),
            unrecorded = self.failed,
            uptime_ms = ctx.uptime_ms(),
            "Partition worker stopped"
        );
        Ok(())
    }
}
