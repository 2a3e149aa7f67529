mod counting;
mod logging;

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::event::Event;

pub use counting::EventCounter;
pub use logging::LoggingHandler;

/// Why a handler gave up on an event.
#[derive(Debug, thiserror::Error, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HandlerError {
    /// The handler looked at the event and refused it.
    #[error("event rejected: {0}")]
    Rejected(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-event processing logic plugged into the dispatcher.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Name used in logs when this handler fails.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, ctx: &CancellationToken, event: &Event) -> Result<(), HandlerError>;
}

/// Handlers in registration order.
///
/// Every handler sees every event, one after another. A failing or panicking handler
/// is logged and skipped; it never stops the rest of the chain.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs all handlers on one event. Returns how many of them failed.
    #[instrument(skip_all, fields(event_id = %event.id))]
    pub async fn run(&self, ctx: &CancellationToken, event: &Event) -> usize {
        let mut failures = 0;
        for handler in &self.handlers {
            let outcome = AssertUnwindSafe(handler.handle(ctx, event))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic))));

            match outcome {
                Ok(()) => debug!(handler = handler.name(), "Handler done"),
                Err(err) => {
                    failures += 1;
                    error!(
                        handler = handler.name(),
                        event_id = %event.id,
                        error_kind = err.as_ref(),
                        error = %err,
                        "Handler failed"
                    );
                }
            }
        }
        failures
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records the order handlers ran in, optionally failing or panicking.
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        outcome: Outcome,
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Succeed,
        Fail,
        Panic,
    }

    #[async_trait::async_trait]
    impl Handler for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        async fn handle(&self, _ctx: &CancellationToken, event: &Event) -> Result<(), HandlerError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, event.id));
            match self.outcome {
                Outcome::Succeed => Ok(()),
                Outcome::Fail => Err(HandlerError::Rejected("no thanks".to_string())),
                Outcome::Panic => panic!("{} blew up", self.label),
            }
        }
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut chain = HandlerChain::new();
        for label in ["first", "second", "third"] {
            chain.push(Arc::new(Recorder {
                label,
                log: log.clone(),
                outcome: Outcome::Succeed,
            }));
        }

        let failures = chain.run(&CancellationToken::new(), &event("e1")).await;
        assert_eq!(failures, 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:e1", "second:e1", "third:e1"]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_chain() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut chain = HandlerChain::new();
        for (label, outcome) in [
            ("fails", Outcome::Fail),
            ("panics", Outcome::Panic),
            ("works", Outcome::Succeed),
        ] {
            chain.push(Arc::new(Recorder {
                label,
                log: log.clone(),
                outcome,
            }));
        }
        assert_eq!(chain.len(), 3);

        let ctx = CancellationToken::new();
        assert_eq!(chain.run(&ctx, &event("e1")).await, 2);
        assert_eq!(chain.run(&ctx, &event("e2")).await, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["fails:e1", "panics:e1", "works:e1", "fails:e2", "panics:e2", "works:e2"]
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(HandlerError::Rejected("x".to_string()).as_ref(), "REJECTED");
        assert_eq!(HandlerError::Panicked("x".to_string()).as_ref(), "PANICKED");
        assert_eq!(
            HandlerError::from(anyhow::anyhow!("boom")).as_ref(),
            "OTHER"
        );
    }
}
