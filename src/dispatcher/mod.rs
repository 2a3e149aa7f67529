//! Bounded-concurrency dispatch of decoded events to the handler chain.
//!
//! ```text
//! MessageSource → read loop → decode_event → [token pool] → spawned task → HandlerChain
//!                     │                           │
//!                     └─ backpressure: the loop   └─ one permit per event, returned
//!                        waits for a free permit     when the chain finishes
//! ```

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::Semaphore;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    event::decode_event,
    handler::{Handler, HandlerChain},
    source::{MessageSource, SourceError},
};

/// Error type for the dispatch loop.
#[derive(Debug, thiserror::Error, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchError {
    #[error("message source failed: {0}")]
    Source(#[source] SourceError),

    #[error("pool size must be at least 1")]
    InvalidPoolSize,

    #[error("concurrency pool closed")]
    PoolClosed,
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of events whose handler chains run at the same time.
    pub pool_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pool_size: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl DispatcherConfig {
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self { pool_size }
    }
}

/// Reads messages from a source and fans each decoded event out to the handlers.
///
/// At most `pool_size` events are handled concurrently. When all permits are taken
/// the read loop stops reading until one is returned. Events may finish out of read
/// order; handlers for one event always run in registration order.
pub struct Dispatcher<S> {
    source: S,
    handlers: HandlerChain,
    permits: Arc<Semaphore>,
    pool_size: usize,
    tracker: TaskTracker,
    source_closed: AtomicBool,
}

impl<S: MessageSource> Dispatcher<S> {
    pub fn new(source: S, config: DispatcherConfig) -> Result<Self, DispatchError> {
        if config.pool_size == 0 {
            return Err(DispatchError::InvalidPoolSize);
        }
        Ok(Self {
            source,
            handlers: HandlerChain::new(),
            permits: Arc::new(Semaphore::new(config.pool_size)),
            pool_size: config.pool_size,
            tracker: TaskTracker::new(),
            source_closed: AtomicBool::new(false),
        })
    }

    /// Appends a handler to the chain. Handlers registered after [`Dispatcher::start`]
    /// only apply to later calls of `start`.
    pub fn register_handler(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs the read loop until the source is exhausted, closed, a read fails or `ctx`
    /// is cancelled.
    ///
    /// Only a transport failure is returned as an error. Undecodable messages are
    /// logged and skipped, handler failures are logged by the chain. Handler chains
    /// that are already running are not cancelled; [`Dispatcher::close`] waits for them.
    #[instrument(skip_all, fields(pool_size = self.pool_size))]
    pub async fn start(&self, ctx: CancellationToken) -> Result<(), DispatchError> {
        // Keeps close() waiting until the loop has stopped scheduling work.
        let _loop_token = self.tracker.token();
        let chain = Arc::new(self.handlers.clone());
        info!(handlers = chain.len(), "Dispatcher started");

        loop {
            let payload = match self.source.read_one(&ctx).await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    info!("Message source exhausted, stopping");
                    return Ok(());
                }
                Err(err) if ctx.is_cancelled() => {
                    info!(reason = %err, "Dispatcher cancelled, stopping");
                    return Ok(());
                }
                Err(err @ (SourceError::Cancelled | SourceError::Closed)) => {
                    info!(reason = %err, "Message source stopped, stopping");
                    return Ok(());
                }
                Err(err) => {
                    error!(error_kind = err.as_ref(), error = %err, "Failed to read message");
                    return Err(DispatchError::Source(err));
                }
            };

            let event = match decode_event(&payload) {
                Ok(event) => event,
                Err(err) => {
                    warn!(
                        error_kind = err.as_ref(),
                        error = %err,
                        payload_len = payload.len(),
                        "Skipping undecodable message"
                    );
                    continue;
                }
            };

            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::PoolClosed)?;
            debug!(event_id = %event.id, "Dispatching event");

            let chain = chain.clone();
            let ctx = ctx.clone();
            self.tracker.spawn(async move {
                // Returned when the chain is done, whatever the outcome.
                let _permit = permit;
                chain.run(&ctx, &event).await;
            });
        }
    }

    /// Closes the source, then waits for every scheduled handler chain to finish.
    ///
    /// The source is closed only on the first call. Its close error, if any, is
    /// returned after the wait.
    #[instrument(skip_all)]
    pub async fn close(&self) -> Result<(), DispatchError> {
        let closed = if self.source_closed.swap(true, Ordering::AcqRel) {
            Ok(())
        } else {
            self.source.close().await
        };

        self.tracker.close();
        debug!(tracked = self.tracker.len(), "Waiting for handlers to finish");
        self.tracker.wait().await;
        info!("Dispatcher closed");

        closed.map_err(DispatchError::Source)
    }
}
