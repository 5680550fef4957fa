use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatter::chat::{ChatBackend, ChatSession, ChatStream, ChunkStream};
use chatter::messages::Message;
use chatter::settings::JsonSettingsStore;
use chatter::speech::{NullEngine, SpeechEvent};

/// Stand-in backend replaying a canned tagged reply; real model clients
/// implement `ChatBackend` and are injected in its place.
struct CannedBackend;

#[async_trait]
impl ChatBackend for CannedBackend {
    async fn request_stream(
        &self,
        _messages: &[Message],
    ) -> chatter::Result<Box<dyn ChatStream>> {
        Ok(Box::new(ChunkStream::from_chunks(vec![
            "[happy] Hi the".to_string(),
            "re! I speak one sen".to_string(),
            "tence at a time, in order.".to_string(),
        ])))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatter=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting chatter avatar chat pipeline");

    let store = Arc::new(JsonSettingsStore::new("chatter-session.json"));
    let (mut session, mut events) = ChatSession::new(
        Arc::new(CannedBackend),
        Arc::new(NullEngine::default()),
        store,
    );

    // Smoke-run the pipeline against the canned reply
    let transcript = session.send_message("Hello!").await?;
    info!("Committed assistant transcript: {}", transcript);

    loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Some(SpeechEvent::Started { caption, .. })) => info!("Speaking: {}", caption),
            Ok(Some(SpeechEvent::Finished { index, .. })) => info!("Finished segment {}", index),
            Ok(Some(SpeechEvent::Skipped { index, error, .. })) => {
                info!("Skipped segment {}: {}", index, error);
            }
            Ok(None) | Err(_) => break,
        }
    }

    Ok(())
}
