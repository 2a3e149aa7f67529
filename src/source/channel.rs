use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::source::{MessageSource, SourceError};

/// In-process source fed through a bounded channel.
///
/// The source is exhausted once every sender is dropped and the buffer is drained.
pub struct ChannelSource {
    receiver: Mutex<mpsc::Receiver<Vec<u8>>>,
    closed: CancellationToken,
}

impl ChannelSource {
    /// Creates a source and the sender that feeds it.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let source = Self {
            receiver: Mutex::new(receiver),
            closed: CancellationToken::new(),
        };
        (source, sender)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait::async_trait]
impl MessageSource for ChannelSource {
    async fn read_one(&self, ctx: &CancellationToken) -> Result<Option<Vec<u8>>, SourceError> {
        if self.closed.is_cancelled() {
            return Err(SourceError::Closed);
        }
        let mut receiver = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(SourceError::Cancelled),
            _ = self.closed.cancelled() => return Err(SourceError::Closed),
            receiver = self.receiver.lock() => receiver,
        };
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(SourceError::Cancelled),
            _ = self.closed.cancelled() => Err(SourceError::Closed),
            message = receiver.recv() => Ok(message),
        }
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.closed.cancel();
        self.receiver.lock().await.close();
        Ok(())
    }
}
