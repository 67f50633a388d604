use crate::{
    actor::{actor::ActorRef, messages::PartitionMsg, spawn::spawn_actor, worker::PartitionWorker},
    error::{ActorError, PipelineError},
};
use async_trait::async_trait;
use engine_processing::runner::{BatchRunner, RunMode};
use model::execution::{batch::TransformTrigger, run::RunSummary};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{Mutex, oneshot},
    task::JoinHandle,
};
use tracing::{info, warn};

/// Accepts transform triggers and reports how each run ended.
#[async_trait]
pub trait TransformExecutor: Send + Sync {
    /// Runs the batch and waits for its summary.
    async fn execute(&self, trigger: TransformTrigger, mode: RunMode) -> Result<RunSummary, PipelineError>;

    /// Queues the batch without waiting for it to run.
    async fn submit(&self, trigger: TransformTrigger) -> Result<(), PipelineError>;

    /// Waits for queued batches to finish.
    async fn shutdown(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

struct Worker {
    mailbox: ActorRef<PartitionMsg>,
    handle: JoinHandle<()>,
}

/// In-process executor with one FIFO worker per partition. Runs of the same
/// partition never overlap; different partitions proceed in parallel.
pub struct PartitionedExecutor {
    runner: Arc<BatchRunner>,
    queue_capacity: usize,
    workers: Mutex<HashMap<String, Worker>>,
}

impl PartitionedExecutor {
    pub fn new(runner: Arc<BatchRunner>, queue_capacity: usize) -> Self {
        Self {
            runner,
            queue_capacity,
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub fn runner(&self) -> &Arc<BatchRunner> {
        &self.runner
    }

    /// Mailbox of the partition's worker, spawned on first use. A worker
    /// whose task has ended is replaced.
    async fn worker_for(&self, partition: &str) -> ActorRef<PartitionMsg> {
        let mut workers = self.workers.lock().await;
        match workers.get(partition) {
            Some(worker) if !worker.mailbox.is_closed() => return worker.mailbox.clone(),
            Some(_) => warn!(partition, "Partition worker ended unexpectedly, respawning"),
            None => {}
        }

        let worker = PartitionWorker::new(partition, self.runner.clone());
        let (mailbox, handle) = spawn_actor(format!("partition-{partition}"), self.queue_capacity, worker);
        info!(partition, "Spawned partition worker");
        workers.insert(
            partition.to_string(),
            Worker {
                mailbox: mailbox.clone(),
                handle,
            },
        );
        mailbox
    }
}

#[async_trait]
impl TransformExecutor for PartitionedExecutor {
    async fn execute(&self, trigger: TransformTrigger, mode: RunMode) -> Result<RunSummary, PipelineError> {
        let mailbox = self.worker_for(&trigger.partition).await;
        let batch_id = trigger.batch_id.clone();
        let (tx, rx) = oneshot::channel();
        mailbox
            .send(PartitionMsg::Run {
                trigger,
                mode,
                reply: Some(tx),
            })
            .await?;
        rx.await.map_err(|_| ActorError::ReplyDropped(batch_id))?
    }

    async fn submit(&self, trigger: TransformTrigger) -> Result<(), PipelineError> {
        let mailbox = self.worker_for(&trigger.partition).await;
        mailbox
            .send(PartitionMsg::Run {
                trigger,
                mode: RunMode::Deliver,
                reply: None,
            })
            .await?;
        Ok(())
    }

    /// Closes every mailbox and waits for the queued batches to drain.
    async fn shutdown(&self) -> Result<(), PipelineError> {
        let workers: Vec<Worker> = self.workers.lock().await.drain().map(|(_, w)| w).collect();
        let count = workers.len();
        for Worker { mailbox, handle } in workers {
            drop(mailbox);
            handle.await?;
        }
        info!(workers = count, "Partition workers drained");
        Ok(())
    }
}
