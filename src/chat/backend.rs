//! Chat backend interfaces
//!
//! The model-inference client lives outside this crate; the session only
//! relies on these trait surfaces: request a streamed reply for an ordered
//! message list, then pull chunks until the stream ends. Streams must be
//! closed on every exit path.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::messages::Message;
use crate::Result;

/// Pull-based reader over a streamed reply
#[async_trait]
pub trait ChatStream: Send {
    /// Read the next chunk of reply text, or `None` when the stream ends
    async fn next_chunk(&mut self) -> Result<Option<String>>;

    /// Release the underlying stream resource
    async fn close(&mut self);
}

/// A model backend that answers an ordered message list with a text stream
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn request_stream(&self, messages: &[Message]) -> Result<Box<dyn ChatStream>>;
}

/// Build the outbound request for a turn.
///
/// The system prompt is always the first element, whatever the log holds.
pub fn build_request(system_prompt: &str, log: &[Message]) -> Vec<Message> {
    let mut request = Vec::with_capacity(log.len() + 1);
    request.push(Message::system(system_prompt));
    request.extend(log.iter().cloned());
    request
}

/// `ChatStream` adapter over any boxed futures stream of text chunks
pub struct ChunkStream {
    inner: Option<BoxStream<'static, Result<String>>>,
}

impl ChunkStream {
    pub fn new(stream: BoxStream<'static, Result<String>>) -> Self {
        Self {
            inner: Some(stream),
        }
    }

    /// Stream a fixed chunk sequence (scripted replies, demos, tests)
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let chunks: Vec<String> = chunks.into_iter().collect();
        let stream = async_stream::stream! {
            for chunk in chunks {
                yield Ok(chunk);
            }
        };
        Self::new(stream.boxed())
    }
}

#[async_trait]
impl ChatStream for ChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<String>> {
        match self.inner.as_mut() {
            Some(stream) => stream.next().await.transpose(),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        // dropping the inner stream releases the connection it wraps
        self.inner = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Role;

    #[test]
    fn test_build_request_puts_system_first() {
        let log = vec![Message::user("Hi"), Message::assistant("Hello!")];
        let request = build_request("You are an avatar.", &log);

        assert_eq!(request.len(), 3);
        assert_eq!(request[0].role, Role::System);
        assert_eq!(request[0].content, "You are an avatar.");
        assert_eq!(request[1].role, Role::User);
        assert_eq!(request[2].role, Role::Assistant);
    }

    #[test]
    fn test_build_request_empty_log() {
        let request = build_request("prompt", &[]);
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_chunk_stream_yields_in_order() {
        let mut stream = ChunkStream::from_chunks(vec!["a".to_string(), "b".to_string()]);

        assert_eq!(stream.next_chunk().await.unwrap(), Some("a".to_string()));
        assert_eq!(stream.next_chunk().await.unwrap(), Some("b".to_string()));
        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_chunk_stream_close_ends_stream() {
        let mut stream = ChunkStream::from_chunks(vec!["a".to_string()]);
        stream.close().await;

        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }
}
