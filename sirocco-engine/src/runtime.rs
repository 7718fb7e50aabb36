//! Async driver for the single-threaded engine.
//!
//! [`FeedEngine`] itself is synchronous and single-owner. [`FeedRuntime`]
//! wraps it in a tokio task: host calls and decoded publisher messages
//! arrive over channels, a periodic interval drives `tick`, and outbound
//! requests leave through a channel the host's connection task drains. The
//! engine is touched by exactly one task, so nothing inside it needs
//! synchronisation beyond the channels on the boundary.

use crate::engine::{FeedEngine, SubscriptionHandle};
use crate::events::SubscriptionNotice;
use crate::observer::ObserverToken;
use crate::wire::RequestTransport;
use sirocco_core::error::Result;
use sirocco_core::prelude::{
    ChannelKind, DataDefinition, FeedConfig, MonoTime, OutboundRequest, PublisherMessage,
    WireError,
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Notice handler run inside the engine task.
pub type RuntimeObserver =
    Box<dyn FnMut(&mut FeedEngine<ChannelTransport>, &SubscriptionNotice) + Send>;

/// A host call routed into the engine task.
pub enum EngineCommand {
    /// Subscribe to a feed and reply with the handle.
    Subscribe {
        /// The feed being requested.
        definition: DataDefinition,
        /// Where the handle is sent back.
        reply: oneshot::Sender<SubscriptionHandle>,
    },
    /// Release one subscriber of a subscription.
    Unsubscribe {
        /// Handle returned by the subscribe call.
        handle: SubscriptionHandle,
    },
    /// Attach a notice handler to a subscription.
    AttachObserver {
        /// Subscription to observe.
        handle: SubscriptionHandle,
        /// Handler invoked for each notice.
        handler: RuntimeObserver,
        /// Where the detach token is sent back.
        reply: oneshot::Sender<ObserverToken>,
    },
    /// Detach a previously attached notice handler.
    DetachObserver {
        /// Token returned when the handler was attached.
        token: ObserverToken,
    },
    /// The publisher connection came up.
    ComeOnline,
    /// The publisher connection was lost.
    GoOffline {
        /// Human-readable reason.
        reason: String,
    },
    /// The publisher's capability improved.
    SubscribabilityIncreased,
    /// Change a channel's active limit at runtime.
    SetActiveLimit {
        /// Channel to adjust.
        kind: ChannelKind,
        /// New limit; -1 means unbounded.
        limit: i64,
    },
    /// Stop the engine task.
    Shutdown,
}

/// Transport that forwards requests onto a channel.
///
/// The host's connection task owns the receiving end, encodes each request
/// and writes it to the publisher. A dropped receiver surfaces as a wire
/// error on the next send, which makes the engine purge - the session is
/// gone either way.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundRequest>,
}

impl ChannelTransport {
    /// Creates the transport and the receiver the host drains.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RequestTransport for ChannelTransport {
    fn send(&mut self, request: &OutboundRequest) -> std::result::Result<(), WireError> {
        self.tx
            .send(request.clone())
            .map_err(|_| WireError::closed("request receiver dropped"))
    }
}

/// Cloneable handle for talking to a running [`FeedRuntime`].
#[derive(Debug, Clone)]
pub struct FeedRuntimeHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    messages: mpsc::UnboundedSender<PublisherMessage>,
}

impl FeedRuntimeHandle {
    /// Subscribes to a feed and waits for the handle.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub async fn subscribe(&self, definition: DataDefinition) -> Result<SubscriptionHandle> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(EngineCommand::Subscribe { definition, reply })
            .map_err(|_| WireError::closed("engine task stopped"))?;
        response
            .await
            .map_err(|_| WireError::closed("engine task stopped").into())
    }

    /// Releases one subscriber of a subscription.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.command(EngineCommand::Unsubscribe { handle })
    }

    /// Attaches a notice handler to a subscription and waits for its token.
    ///
    /// The handler runs inside the engine task, so it must be `Send`.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub async fn attach_observer<F>(
        &self,
        handle: SubscriptionHandle,
        handler: F,
    ) -> Result<ObserverToken>
    where
        F: FnMut(&mut FeedEngine<ChannelTransport>, &SubscriptionNotice) + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(EngineCommand::AttachObserver {
                handle,
                handler: Box::new(handler),
                reply,
            })
            .map_err(|_| WireError::closed("engine task stopped"))?;
        response
            .await
            .map_err(|_| WireError::closed("engine task stopped").into())
    }

    /// Detaches a previously attached notice handler.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub fn detach_observer(&self, token: ObserverToken) -> Result<()> {
        self.command(EngineCommand::DetachObserver { token })
    }

    /// Delivers one decoded publisher message to the engine.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub fn deliver(&self, message: PublisherMessage) -> Result<()> {
        self.messages
            .send(message)
            .map_err(|_| WireError::closed("engine task stopped").into())
    }

    /// Tells the engine the publisher connection is up.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub fn come_online(&self) -> Result<()> {
        self.command(EngineCommand::ComeOnline)
    }

    /// Tells the engine the publisher connection was lost.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub fn go_offline(&self, reason: impl Into<String>) -> Result<()> {
        self.command(EngineCommand::GoOffline {
            reason: reason.into(),
        })
    }

    /// Tells the engine the publisher's capability improved.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub fn subscribability_increased(&self) -> Result<()> {
        self.command(EngineCommand::SubscribabilityIncreased)
    }

    /// Changes a channel's active limit at runtime.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has stopped.
    pub fn set_active_limit(&self, kind: ChannelKind, limit: i64) -> Result<()> {
        self.command(EngineCommand::SetActiveLimit { kind, limit })
    }

    /// Stops the engine task.
    ///
    /// # Errors
    ///
    /// Returns a wire error when the engine task has already stopped.
    pub fn shutdown(&self) -> Result<()> {
        self.command(EngineCommand::Shutdown)
    }

    fn command(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| WireError::closed("engine task stopped").into())
    }
}

/// Owns a [`FeedEngine`] and drives it from an async event loop.
pub struct FeedRuntime {
    engine: FeedEngine<ChannelTransport>,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    messages: mpsc::UnboundedReceiver<PublisherMessage>,
    tick_interval: Duration,
    started: Instant,
}

impl FeedRuntime {
    /// Builds a runtime, its handle, and the outbound request stream.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` fails validation.
    pub fn new(
        config: FeedConfig,
        tick_interval: Duration,
    ) -> Result<(
        Self,
        FeedRuntimeHandle,
        mpsc::UnboundedReceiver<OutboundRequest>,
    )> {
        let (transport, requests) = ChannelTransport::new();
        let engine = FeedEngine::new(config, transport)?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            engine,
            commands: command_rx,
            messages: message_rx,
            tick_interval,
            started: Instant::now(),
        };
        let handle = FeedRuntimeHandle {
            commands: command_tx,
            messages: message_tx,
        };
        Ok((runtime, handle, requests))
    }

    /// Direct access to the engine before the loop starts, for attaching
    /// observers to early subscriptions.
    pub fn engine_mut(&mut self) -> &mut FeedEngine<ChannelTransport> {
        &mut self.engine
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now(&self) -> MonoTime {
        MonoTime::from_millis(self.started.elapsed().as_millis() as u64)
    }

    /// Runs the event loop until shutdown, handle drop, or a wire failure.
    ///
    /// # Errors
    ///
    /// Propagates the engine's wire error after every subscription has been
    /// purged; the host decides whether to rebuild the session.
    pub async fn run(mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick = ?self.tick_interval, "feed runtime started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => {
                        // Messages delivered before the shutdown may still
                        // sit in the channel; hand them to the engine so
                        // observers see them.
                        self.drain_messages();
                        info!("feed runtime stopping");
                        break;
                    }
                    Some(command) => self.apply(command),
                },
                message = self.messages.recv() => match message {
                    Some(message) => self.engine.handle_message(message),
                    None => {
                        info!("message stream closed, feed runtime stopping");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let now = self.now();
                    self.engine.tick(now)?;
                }
            }
        }
        Ok(())
    }

    fn drain_messages(&mut self) {
        while let Ok(message) = self.messages.try_recv() {
            self.engine.handle_message(message);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Subscribe { definition, reply } => {
                let handle = self.engine.subscribe(definition);
                // The caller may have given up waiting; nothing to do then.
                let _ = reply.send(handle);
            }
            EngineCommand::Unsubscribe { handle } => {
                if let Err(error) = self.engine.unsubscribe(&handle) {
                    warn!(%error, "unsubscribe rejected");
                }
            }
            EngineCommand::AttachObserver {
                handle,
                handler,
                reply,
            } => {
                let token = self.engine.attach_observer(&handle, handler);
                let _ = reply.send(token);
            }
            EngineCommand::DetachObserver { token } => {
                self.engine.detach_observer(&token);
            }
            EngineCommand::ComeOnline => self.engine.come_online(),
            EngineCommand::GoOffline { reason } => self.engine.go_offline(&reason),
            EngineCommand::SubscribabilityIncreased => self.engine.subscribability_increased(),
            EngineCommand::SetActiveLimit { kind, limit } => {
                self.engine.set_active_limit(kind, limit);
            }
            EngineCommand::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirocco_core::prelude::Symbol;

    fn btc_trades() -> DataDefinition {
        DataDefinition::trades(Symbol::new_unchecked("BTC-USDT"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_drives_a_subscription_to_the_wire() {
        let (runtime, handle, mut requests) =
            FeedRuntime::new(FeedConfig::default(), Duration::from_millis(10)).unwrap();
        let task = tokio::spawn(runtime.run());

        handle.come_online().unwrap();
        let sub = handle.subscribe(btc_trades()).await.unwrap();

        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = seen.clone();
        handle
            .attach_observer(sub, move |_, notice| log.lock().push(notice.clone()))
            .await
            .unwrap();

        // The next tick admits and pumps the activation.
        let request = requests.recv().await.unwrap();
        assert!(request.is_activate());
        assert_eq!(request.subscription, sub.id());

        handle
            .deliver(PublisherMessage::sync_complete(
                request.subscription,
                request.request_nr,
            ))
            .unwrap();

        handle.shutdown().unwrap();
        task.await.unwrap().unwrap();

        let seen = seen.lock();
        assert!(
            seen.iter()
                .any(|notice| matches!(notice, SubscriptionNotice::ResetData))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_request_receiver_stops_the_loop() {
        let (runtime, handle, requests) =
            FeedRuntime::new(FeedConfig::default(), Duration::from_millis(10)).unwrap();
        drop(requests);
        let task = tokio::spawn(runtime.run());

        handle.come_online().unwrap();
        let _sub = handle.subscribe(btc_trades()).await.unwrap();

        // The first pump hits the closed channel; the engine purges and the
        // loop exits with the wire error.
        let result = task.await.unwrap();
        assert!(result.is_err());
        assert!(result.unwrap_err().is_wire_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_drop_stops_the_loop() {
        let (runtime, handle, _requests) =
            FeedRuntime::new(FeedConfig::default(), Duration::from_millis(10)).unwrap();
        let task = tokio::spawn(runtime.run());
        drop(handle);
        task.await.unwrap().unwrap();
    }
}
