use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{Loader, SessionConfig, session::Session};
use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Session`] with optional subscribers.
pub struct SessionBuilder {
    loader: Arc<Loader>,
    cfg: SessionConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SessionBuilder {
    /// Creates a builder over the shared `loader` with default configuration.
    pub fn new(loader: Arc<Loader>) -> Self {
        Self {
            loader,
            cfg: SessionConfig::default(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_config(mut self, cfg: SessionConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive session events (status changes, captured lines,
    /// failures) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the session.
    ///
    /// With subscribers configured this spawns their workers and a listener
    /// forwarding the bus to them, so it must be called inside a tokio runtime.
    /// The listener stops when the session is dropped.
    pub fn build(self) -> Arc<Session> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let root = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
            subscriber_listener(&bus, subs, root.clone());
        }

        Arc::new(Session::new_internal(self.cfg, self.loader, bus, root))
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
}
