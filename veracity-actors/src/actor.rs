use anyhow::Result;
use tokio::{sync::mpsc, task::JoinHandle};

/// Minimal actor trait. `Self: Sized` avoids object-safety issues when using `Context<Self>`.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Handle a single message. Return `Err` to stop the actor.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()>;
}

/// Runtime context for an actor instance.
///
/// The context only keeps a weak reference to the mailbox, so an actor stops
/// once every external [`Addr`] (including ones held by its own timers) is gone.
pub struct Context<A: Actor> {
    weak: mpsc::WeakSender<A::Msg>,
    stop: bool,
}

impl<A: Actor> Context<A> {
    /// A fresh `Addr` for this actor, or `None` when it is already shutting down.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use veracity_actors::actor::{self, Actor, Context};
    /// # struct SelfPing;
    /// # #[async_trait]
    /// # impl Actor for SelfPing {
    /// #     type Msg = u8;
    /// #     async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
    /// #         match (msg, ctx.addr()) {
    /// #             (0, Some(me)) => me.send(1).await.map_err(|_| anyhow::anyhow!("closed"))?,
    /// #             _ => ctx.stop(),
    /// #         }
    /// #         Ok(())
    /// #     }
    /// # }
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let actor::ActorHandle { addr, task } = actor::spawn_actor(SelfPing, 2);
    ///     addr.send(0).await.unwrap();
    ///     // The actor stops itself on the echoed message while `addr` is still held.
    ///     task.await.unwrap().unwrap();
    ///     drop(addr);
    /// });
    /// ```
    pub fn addr(&self) -> Option<Addr<A>> {
        self.weak.upgrade().map(Addr)
    }

    /// Request a graceful stop after processing the current message.
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

/// Address for sending messages to an actor.
pub struct Addr<A: Actor>(mpsc::Sender<A::Msg>);

/// Manual Clone to avoid unnecessary bounds on `A`/`A::Msg`.
impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> Addr<A> {
    /// Async send; awaits backpressure. Returns the message if the receiver is dropped.
    pub async fn send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.send(msg).await.map_err(|e| e.0)
    }

    /// Bounded mailbox capacity.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use veracity_actors::actor::{self, Actor, Context};
    /// # struct Noop;
    /// # #[async_trait]
    /// # impl Actor for Noop {
    /// #     type Msg = ();
    /// #     async fn handle(&mut self, _msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
    /// #         Ok(())
    /// #     }
    /// # }
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let actor::ActorHandle { addr, task } = actor::spawn_actor(Noop, 8);
    ///     assert_eq!(addr.capacity(), 8);
    ///     addr.send(()).await.unwrap();
    ///     drop(addr);
    ///     task.await.unwrap().unwrap();
    /// });
    /// ```
    pub fn capacity(&self) -> usize {
        self.0.max_capacity()
    }
}

/// Handle to a running actor task.
pub struct ActorHandle<A: Actor> {
    pub addr: Addr<A>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

/// Spawn an actor with a bounded mailbox.
///
/// Stop conditions:
/// - `handle` returns `Err`
/// - all senders are dropped
/// - `ctx.stop()` is called
///
/// ```
/// # use anyhow::Result;
/// # use async_trait::async_trait;
/// # use veracity_actors::actor::{self, Actor, Context};
/// # struct Accumulator(u8);
/// # #[async_trait]
/// # impl Actor for Accumulator {
/// #     type Msg = u8;
/// #     async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
/// #         self.0 += msg;
/// #         Ok(())
/// #     }
/// # }
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let actor::ActorHandle { addr, task } = actor::spawn_actor(Accumulator(0), 8);
///     addr.send(2).await.unwrap();
///     addr.send(3).await.unwrap();
///     drop(addr);
///     task.await.unwrap().unwrap();
/// });
/// ```
pub fn spawn_actor<A: Actor>(mut actor: A, capacity: usize) -> ActorHandle<A> {
    let (tx, mut rx) = mpsc::channel::<A::Msg>(capacity);
    let mut ctx = Context {
        weak: tx.downgrade(),
        stop: false,
    };
    let addr = Addr(tx);

    let task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = actor.handle(msg, &mut ctx).await {
                tracing::error!(target = "veracity-actors", error = ?e, "actor returned error; stopping");
                return Err(e);
            }
            if ctx.stop {
                break;
            }
        }
        Ok(())
    });

    ActorHandle { addr, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait::async_trait]
    impl Actor for Echo {
        type Msg = tokio::sync::oneshot::Sender<&'static str>;

        async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
            let _ = msg.send("pong");
            Ok(())
        }
    }

    struct Relay;

    #[async_trait::async_trait]
    impl Actor for Relay {
        type Msg = u8;

        async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
            match (msg, ctx.addr()) {
                (0, Some(me)) => me.send(1).await.map_err(|_| anyhow::anyhow!("closed"))?,
                _ => ctx.stop(),
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn self_addr_is_live_while_external_addr_held() {
        let ActorHandle { addr, task } = spawn_actor(Relay, 2);
        addr.send(0).await.unwrap();
        task.await.unwrap().unwrap();
        // The actor stopped on its own follow-up message, not on a closed mailbox.
        assert!(addr.send(7).await.is_err());
    }

    #[tokio::test]
    async fn self_addr_is_gone_after_external_addrs_drop() {
        let ActorHandle { addr, task } = spawn_actor(Relay, 2);
        addr.send(0).await.unwrap();
        drop(addr);
        // Either the follow-up was sent before the drop or the upgrade failed
        // and the actor stopped; it must not hang or panic.
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn actor_stops_when_last_addr_drops() {
        let ActorHandle { addr, task } = spawn_actor(Echo, 4);
        let (tx, rx) = tokio::sync::oneshot::channel();
        addr.send(tx).await.unwrap();
        assert_eq!(rx.await.unwrap(), "pong");
        drop(addr);
        task.await.unwrap().unwrap();
    }
}
