use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, Split},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use crate::source::{MessageSource, SourceError};

/// Newline-delimited messages read from any async reader, e.g. stdin or a file.
///
/// Lines are handed out as raw bytes, so a line that isn't UTF-8 is left for the
/// decoder to reject. Blank lines are skipped. End of input exhausts the source.
pub struct LinesSource<R> {
    lines: Mutex<Split<R>>,
    closed: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> LinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.split(b'\n')),
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait::async_trait]
impl<R> MessageSource for LinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn read_one(&self, ctx: &CancellationToken) -> Result<Option<Vec<u8>>, SourceError> {
        let mut lines = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(SourceError::Cancelled),
            _ = self.closed.cancelled() => return Err(SourceError::Closed),
            lines = self.lines.lock() => lines,
        };
        loop {
            let line = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(SourceError::Cancelled),
                _ = self.closed.cancelled() => return Err(SourceError::Closed),
                line = lines.next_segment() => line.map_err(|err| SourceError::Transport(err.into()))?,
            };
            match line {
                Some(line) if line.trim_ascii().is_empty() => continue,
                Some(line) => return Ok(Some(line)),
                None => return Ok(None),
            }
        }
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.closed.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_skips_blank_lines() {
        let input: &[u8] = b"{\"id\":\"1\"}\n\n   \n{\"id\":\"2\"}\n";
        let source = LinesSource::new(input);
        let ctx = CancellationToken::new();

        assert_eq!(
            source.read_one(&ctx).await.unwrap(),
            Some(br#"{"id":"1"}"#.to_vec())
        );
        assert_eq!(
            source.read_one(&ctx).await.unwrap(),
            Some(br#"{"id":"2"}"#.to_vec())
        );
        assert_eq!(source.read_one(&ctx).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_passed_through() {
        let input: &[u8] = b"{\"id\":\"a\"}\n{\"id\":\"\xff\xfe\"}\r\n{\"id\":\"c\"}";
        let source = LinesSource::new(input);
        let ctx = CancellationToken::new();

        assert_eq!(
            source.read_one(&ctx).await.unwrap(),
            Some(br#"{"id":"a"}"#.to_vec())
        );
        assert_eq!(
            source.read_one(&ctx).await.unwrap(),
            Some(b"{\"id\":\"\xff\xfe\"}\r".to_vec())
        );
        assert_eq!(
            source.read_one(&ctx).await.unwrap(),
            Some(br#"{"id":"c"}"#.to_vec())
        );
        assert_eq!(source.read_one(&ctx).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_source_stops_reading() {
        let input: &[u8] = b"first\nsecond\n";
        let source = LinesSource::new(input);
        source.close().await.unwrap();
        assert!(matches!(
            source.read_one(&CancellationToken::new()).await,
            Err(SourceError::Closed)
        ));
    }
}
