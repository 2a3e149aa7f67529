mod channel;
mod lines;

use tokio_util::sync::CancellationToken;

pub use channel::ChannelSource;
pub use lines::LinesSource;

/// Why a source could not produce the next message.
#[derive(Debug, thiserror::Error, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceError {
    /// The read was interrupted by the caller's context.
    #[error("read cancelled")]
    Cancelled,

    /// The source was closed, possibly while a read was pending.
    #[error("source closed")]
    Closed,

    #[error("transport failure: {0}")]
    Transport(#[source] anyhow::Error),
}

/// An ordered stream of raw message payloads.
///
/// Messages come out in the order the underlying transport delivers them.
#[async_trait::async_trait]
pub trait MessageSource: Send + Sync + 'static {
    /// Waits for the next payload. `Ok(None)` means the source is exhausted.
    ///
    /// Must return promptly once `ctx` is cancelled or [`MessageSource::close`] is called.
    async fn read_one(&self, ctx: &CancellationToken) -> Result<Option<Vec<u8>>, SourceError>;

    async fn close(&self) -> Result<(), SourceError>;
}
