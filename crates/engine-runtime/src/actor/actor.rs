use crate::error::ActorError;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Instant};
use tokio::sync::mpsc;

/// State the mailbox loop keeps for its actor.
#[derive(Debug)]
pub struct ActorContext {
    name: Arc<str>,
    started_at: Instant,
    handled: u64,
}

impl ActorContext {
    pub(crate) fn new(name: Arc<str>) -> Self {
        Self {
            name,
            started_at: Instant::now(),
            handled: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages taken from the mailbox so far, including the current one.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub(crate) fn mark_received(&mut self) {
        self.handled += 1;
    }
}

/// A task owning one mailbox of `M` messages, handled strictly in order.
/// `on_stop` runs once after the last sender is dropped.
#[async_trait]
pub trait Actor<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    async fn handle(&mut self, msg: M, ctx: &ActorContext) -> Result<(), ActorError>;

    async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }
}

/// Sending half of an actor's mailbox.
#[derive(Debug)]
pub struct ActorRef<M> {
    name: Arc<str>,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M> ActorRef<M>
where
    M: Send + Debug + 'static,
{
    pub(crate) fn new(name: Arc<str>, tx: mpsc::Sender<M>) -> Self {
        Self { name, tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The actor's task has ended, e.g. after a panic in `handle`.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Waits for mailbox capacity, which is how backpressure reaches callers.
    pub async fn send(&self, msg: M) -> Result<(), ActorError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| ActorError::MailboxClosed(self.name.to_string()))
    }
}
