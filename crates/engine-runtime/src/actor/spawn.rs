use crate::actor::actor::{Actor, ActorContext, ActorRef};
use std::{fmt::Debug, sync::Arc};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error};

/// Spawns the mailbox loop of `actor` on the Tokio runtime. A full mailbox
/// makes senders wait; the loop ends once every [`ActorRef`] is dropped and
/// the queued messages are handled.
pub fn spawn_actor<M, A>(name: impl Into<String>, capacity: usize, mut actor: A) -> (ActorRef<M>, JoinHandle<()>)
where
    A: Actor<M>,
    M: Send + Debug + 'static,
{
    let name: Arc<str> = Arc::from(name.into());
    let (tx, mut rx) = mpsc::channel::<M>(capacity.max(1));
    let actor_ref = ActorRef::new(name.clone(), tx);

    let handle = tokio::spawn(async move {
        let mut ctx = ActorContext::new(name);
        while let Some(msg) = rx.recv().await {
            ctx.mark_received();
            if let Err(err) = actor.handle(msg, &ctx).await {
                error!(actor = ctx.name(), error = %err, "Message handling failed");
            }
        }

        if let Err(err) = actor.on_stop(&ctx).await {
            error!(actor = ctx.name(), error = %err, "Actor did not stop cleanly");
        }
        debug!(actor = ctx.name(), handled = ctx.handled(), "Mailbox drained");
    });

    (actor_ref, handle)
}
