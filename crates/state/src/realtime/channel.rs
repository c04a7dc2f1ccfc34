//! Channel driver: connect, announce, listen, reconnect, poll.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, instrument, warn};

use super::{
    ChannelError, ChannelState, Connection, ConnectionMachine, Frame, Interest, Reconciler,
    Refetch, Transport,
};
use crate::config::RealtimeConfig;
use crate::error::add_breadcrumb;
use crate::events::{EventBus, StoreEvent};

/// The real-time reconciliation channel for one session.
pub struct RealtimeChannel {
    transport: Arc<dyn Transport>,
    refetch: Arc<dyn Refetch>,
    reconciler: Reconciler,
    interest: Interest,
    config: RealtimeConfig,
    bus: EventBus,
    state: watch::Sender<ChannelState>,
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("interest", &self.interest)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl RealtimeChannel {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        refetch: Arc<dyn Refetch>,
        reconciler: Reconciler,
        interest: Interest,
        config: RealtimeConfig,
        bus: EventBus,
    ) -> Self {
        Self {
            transport,
            refetch,
            reconciler,
            interest,
            config,
            bus,
            state: watch::Sender::new(ChannelState::Disconnected),
        }
    }

    /// Observe the channel state.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Run until `shutdown` resolves.
    ///
    /// Reconnects with backoff while the retry budget lasts, then polls every
    /// `poll_interval`. Ends in `Disconnected`.
    pub async fn run(&self, shutdown: impl Future<Output = ()> + Send) {
        tokio::select! {
            () = shutdown => debug!("Realtime channel shutting down"),
            () = self.drive() => {}
        }
        self.publish(ChannelState::Disconnected);
    }

    async fn drive(&self) {
        let mut machine = ConnectionMachine::new(&self.config);

        loop {
            self.publish(machine.connecting());

            match self.session(&mut machine).await {
                Ok(()) => info!("Event stream closed by server"),
                Err(e) => warn!(error = %e, attempt = machine.failures() + 1, "Realtime connection failed"),
            }
            self.publish(machine.disconnected());

            if let Some(delay) = machine.retry() {
                self.publish(machine.state());
                debug!(delay_ms = delay.as_millis(), "Reconnecting");
                tokio::time::sleep(delay).await;
            } else {
                self.publish(machine.state());
                warn!(
                    attempts = self.config.max_reconnect_attempts,
                    "Reconnect budget exhausted, falling back to polling"
                );
                add_breadcrumb("realtime", "Falling back to polling", None);
                self.poll().await;
                return;
            }
        }
    }

    /// One connection: open, announce, then listen until it ends.
    #[instrument(skip_all, fields(session = %self.interest.session))]
    async fn session(&self, machine: &mut ConnectionMachine) -> Result<(), ChannelError> {
        let mut connection = self.transport.connect().await?;
        connection.announce(&self.interest).await?;
        self.publish(machine.connected());
        add_breadcrumb("realtime", "Connected", None);

        self.listen(connection.as_mut()).await
    }

    async fn listen(&self, connection: &mut dyn Connection) -> Result<(), ChannelError> {
        loop {
            match timeout(self.config.stall_timeout, connection.next_event()).await {
                Err(_) => {
                    warn!(
                        timeout_secs = self.config.stall_timeout.as_secs(),
                        "Event stream stalled, refetching"
                    );
                    self.refetch_once().await;
                }
                Ok(Ok(Some(Frame::Event(raw)))) => self.reconciler.handle(&raw),
                Ok(Ok(Some(Frame::Heartbeat))) => {}
                Ok(Ok(None)) => return Ok(()),
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    async fn poll(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.refetch_once().await;
        }
    }

    /// Fetch everything the interest covers and merge it in.
    pub async fn refetch_once(&self) {
        match self.refetch.refetch(&self.interest).await {
            Ok(batch) => self.reconciler.apply_batch(batch),
            Err(e) => warn!(error = %e, "Refetch failed"),
        }
    }

    fn publish(&self, state: ChannelState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(state = %state, "Channel state");
            self.bus.publish(StoreEvent::Channel(state));
        }
    }
}
