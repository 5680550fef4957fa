//! Chat session driving one response turn at a time
//!
//! Owns the conversation log and the speech dispatcher. A turn appends the
//! user message, streams the reply through the segmenter, hands every ready
//! segment to the dispatcher, and commits the assembled assistant message
//! when the stream ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chat::backend::{build_request, ChatBackend};
use crate::chat::screenplay::Screenplay;
use crate::chat::segmenter::{Segment, SentenceSegmenter};
use crate::messages::{ConversationLog, Message};
use crate::settings::{PersistedSession, SettingsStore, DEFAULT_SYSTEM_PROMPT};
use crate::speech::{SpeechDispatcher, SpeechEngine, SpeechEvent};
use crate::{ChatterError, Result};

/// Handle for aborting an in-flight response from outside the turn call
#[derive(Clone)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// One user's conversation with the avatar
pub struct ChatSession {
    system_prompt: String,
    log: ConversationLog,
    backend: Arc<dyn ChatBackend>,
    dispatcher: SpeechDispatcher,
    store: Arc<dyn SettingsStore>,
    processing: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl ChatSession {
    /// Create a session, restoring persisted state when available.
    ///
    /// Returns the session and the receiver for speech playback events.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        engine: Arc<dyn SpeechEngine>,
        store: Arc<dyn SettingsStore>,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let persisted = store.load().unwrap_or_else(|e| {
            warn!("Could not load persisted session, starting fresh: {}", e);
            None
        });

        let (system_prompt, log) = match persisted {
            Some(session) => {
                info!("Restored session with {} messages", session.log.len());
                (
                    session.system_prompt,
                    ConversationLog::from_messages(session.log),
                )
            }
            None => (DEFAULT_SYSTEM_PROMPT.to_string(), ConversationLog::new()),
        };

        let (dispatcher, events) = SpeechDispatcher::new(engine);

        let session = Self {
            system_prompt,
            log,
            backend,
            dispatcher,
            store,
            processing: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        (session, events)
    }

    /// Send a user message and voice the streamed reply.
    ///
    /// Returns the committed assistant transcript (possibly partial after a
    /// mid-stream failure, empty if nothing speakable arrived). A failure to
    /// even open the stream leaves the log without an assistant entry.
    pub async fn send_message(&mut self, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(String::new());
        }

        self.processing.store(true, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);

        // cancel-and-replace: nothing from a prior reply may keep playing
        let response_id = Uuid::new_v4();
        self.dispatcher.begin_response(response_id);

        self.log.append(Message::user(text));
        self.persist();

        let request = build_request(&self.system_prompt, &self.log.snapshot());

        let mut stream = match self.backend.request_stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Chat stream init failed: {}", e);
                self.processing.store(false, Ordering::SeqCst);
                return Err(ChatterError::StreamInitError(e.to_string()));
            }
        };

        let mut segmenter = SentenceSegmenter::new();
        let mut transcript = String::new();
        let mut spoken_bodies: Vec<String> = Vec::new();

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                debug!("Response {} aborted mid-stream", response_id);
                self.dispatcher.cancel();
                break;
            }

            match stream.next_chunk().await {
                Ok(Some(chunk)) => {
                    for segment in segmenter.feed(&chunk) {
                        self.speak(&segment, &mut transcript, &mut spoken_bodies);
                    }
                }
                Ok(None) => {
                    if let Some(segment) = segmenter.flush() {
                        self.speak(&segment, &mut transcript, &mut spoken_bodies);
                    }
                    break;
                }
                Err(e) => {
                    warn!("Chat stream read failed, keeping partial reply: {}", e);
                    break;
                }
            }
        }

        // released on every exit path
        stream.close().await;

        if !transcript.is_empty() {
            self.log.append(Message::assistant(transcript.clone()));
            self.persist();
        }

        self.processing.store(false, Ordering::SeqCst);
        Ok(transcript)
    }

    fn speak(&self, segment: &Segment, transcript: &mut String, spoken_bodies: &mut Vec<String>) {
        transcript.push_str(&segment.spoken_text());
        spoken_bodies.push(segment.body.clone());

        let caption = spoken_bodies.join(" ");
        let screenplay = Screenplay::from_segment(segment);
        if let Err(e) = self.dispatcher.dispatch(screenplay, segment.index, caption) {
            warn!("Segment {} not dispatched: {}", segment.index, e);
        }
    }

    /// Flag an in-flight turn for abort; usable from another task
    pub fn cancel_handle(&self) -> CancelFlag {
        CancelFlag {
            flag: Arc::clone(&self.cancelled),
        }
    }

    /// Clear the conversation and silence any queued speech
    pub fn reset(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.dispatcher.cancel();
        self.log.reset();
        self.persist();
    }

    /// Point-edit a logged message (user correction between turns)
    pub fn edit_message(&mut self, index: usize, content: impl Into<String>) {
        self.log.edit(index, content);
        self.persist();
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
        self.persist();
    }

    pub fn reset_system_prompt(&mut self) {
        self.set_system_prompt(DEFAULT_SYSTEM_PROMPT);
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Shared read handle onto the conversation log
    pub fn log(&self) -> ConversationLog {
        self.log.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Caption reflecting speaking progress for display
    pub fn live_caption(&self) -> String {
        self.dispatcher.live_caption()
    }

    fn persist(&self) {
        let session = PersistedSession {
            system_prompt: self.system_prompt.clone(),
            log: self.log.snapshot(),
        };
        if let Err(e) = self.store.save(&session) {
            warn!("Failed to persist session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::backend::{ChatStream, ChunkStream};
    use crate::messages::Role;
    use crate::settings::MemorySettingsStore;
    use crate::speech::SynthesizedSpeech;
    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;

    /// Backend that replays one scripted chunk sequence per request
    struct ScriptedBackend {
        replies: Mutex<Vec<Vec<String>>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Vec<&str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|chunks| chunks.into_iter().map(String::from).collect())
                        .collect(),
                ),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn request_stream(&self, messages: &[Message]) -> Result<Box<dyn ChatStream>> {
            self.requests.lock().push(messages.to_vec());
            let mut replies = self.replies.lock();
            if replies.is_empty() {
                return Err(ChatterError::StreamInitError("no reply scripted".into()));
            }
            Ok(Box::new(ChunkStream::from_chunks(replies.remove(0))))
        }
    }

    /// Backend whose stream fails after a few chunks
    struct FlakyBackend;

    #[async_trait]
    impl ChatBackend for FlakyBackend {
        async fn request_stream(&self, _messages: &[Message]) -> Result<Box<dyn ChatStream>> {
            let stream = async_stream::stream! {
                yield Ok("[sad] First bit. and".to_string());
                yield Err(ChatterError::StreamReadError("connection dropped".into()));
            };
            Ok(Box::new(ChunkStream::new(stream.boxed())))
        }
    }

    /// Engine that voices everything instantly
    struct InstantEngine;

    #[async_trait]
    impl SpeechEngine for InstantEngine {
        async fn synthesize(&self, _screenplay: &Screenplay) -> Result<SynthesizedSpeech> {
            Ok(SynthesizedSpeech {
                samples: vec![0.0; 8],
                sample_rate: 22050,
            })
        }

        async fn play(&self, _speech: SynthesizedSpeech) -> Result<()> {
            Ok(())
        }
    }

    fn session_with(
        backend: Arc<dyn ChatBackend>,
    ) -> (ChatSession, mpsc::UnboundedReceiver<SpeechEvent>) {
        ChatSession::new(
            backend,
            Arc::new(InstantEngine),
            Arc::new(MemorySettingsStore::new()),
        )
    }

    #[tokio::test]
    async fn test_turn_commits_tagged_transcript() {
        let backend = Arc::new(ScriptedBackend::new(vec![vec![
            "[Neutral] Hel",
            "lo there. How are",
            " you?",
        ]]));
        let (mut session, _events) = session_with(backend.clone());

        let transcript = session.send_message("Hi!").await.unwrap();
        assert_eq!(transcript, "[Neutral] Hello there.[Neutral] How are you?");

        let log = session.log().snapshot();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[0].content, "Hi!");
        assert_eq!(log[1].role, Role::Assistant);
        assert_eq!(log[1].content, transcript);
    }

    #[tokio::test]
    async fn test_request_has_system_prompt_first() {
        let backend = Arc::new(ScriptedBackend::new(vec![vec!["[happy] Hey."]]));
        let (mut session, _events) = session_with(backend.clone());
        session.set_system_prompt("Be terse.");

        session.send_message("Hi").await.unwrap();

        let requests = backend.requests.lock();
        let request = &requests[0];
        assert_eq!(request[0].role, Role::System);
        assert_eq!(request[0].content, "Be terse.");
        assert_eq!(request[1].role, Role::User);
        assert_eq!(request[1].content, "Hi");
    }

    #[tokio::test]
    async fn test_init_failure_leaves_no_assistant_message() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let (mut session, _events) = session_with(backend);

        let result = session.send_message("Hi").await;
        assert!(matches!(result, Err(ChatterError::StreamInitError(_))));
        assert!(!session.is_processing());

        let log = session.log().snapshot();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial() {
        let (mut session, _events) = session_with(Arc::new(FlakyBackend));

        let transcript = session.send_message("Hi").await.unwrap();
        assert_eq!(transcript, "[sad] First bit.");

        let log = session.log().snapshot();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].content, "[sad] First bit.");
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn test_trailing_text_is_flushed() {
        let backend = Arc::new(ScriptedBackend::new(vec![vec![
            "[relaxed] Sure. no punctuation tail",
        ]]));
        let (mut session, _events) = session_with(backend);

        let transcript = session.send_message("Hi").await.unwrap();
        assert_eq!(
            transcript,
            "[relaxed] Sure.[relaxed] no punctuation tail"
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_ignored() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let (mut session, _events) = session_with(backend.clone());

        let transcript = session.send_message("   ").await.unwrap();
        assert!(transcript.is_empty());
        assert!(session.log().is_empty());
        assert!(backend.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_playback_events_in_order_with_captions() {
        let backend = Arc::new(ScriptedBackend::new(vec![vec![
            "[happy] One. Two. Three.",
        ]]));
        let (mut session, mut events) = session_with(backend);

        session.send_message("count").await.unwrap();

        let mut captions = Vec::new();
        for _ in 0..3 {
            loop {
                match events.recv().await.unwrap() {
                    SpeechEvent::Started { caption, .. } => {
                        captions.push(caption);
                        break;
                    }
                    SpeechEvent::Finished { .. } => continue,
                    SpeechEvent::Skipped { .. } => panic!("unexpected skip"),
                }
            }
        }

        assert_eq!(captions, vec!["One.", "One. Two.", "One. Two. Three."]);
    }

    #[tokio::test]
    async fn test_session_persists_and_restores() {
        let store = Arc::new(MemorySettingsStore::new());
        let backend = Arc::new(ScriptedBackend::new(vec![vec!["[happy] Hello!"]]));

        {
            let (mut session, _events) = ChatSession::new(
                backend.clone(),
                Arc::new(InstantEngine),
                store.clone(),
            );
            session.send_message("Hi").await.unwrap();
        }

        let (session, _events) =
            ChatSession::new(backend, Arc::new(InstantEngine), store);
        let log = session.log().snapshot();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].content, "[happy] Hello!");
    }

    #[tokio::test]
    async fn test_reset_clears_log_and_persists() {
        let store = Arc::new(MemorySettingsStore::new());
        let backend = Arc::new(ScriptedBackend::new(vec![vec!["[happy] Hello!"]]));
        let (mut session, _events) =
            ChatSession::new(backend, Arc::new(InstantEngine), store.clone());

        session.send_message("Hi").await.unwrap();
        session.reset();

        assert!(session.log().is_empty());
        let persisted = store.load().unwrap().unwrap();
        assert!(persisted.log.is_empty());
    }

    #[tokio::test]
    async fn test_edit_message_by_index() {
        let backend = Arc::new(ScriptedBackend::new(vec![vec!["[happy] Hello!"]]));
        let (mut session, _events) = session_with(backend);

        session.send_message("Helo").await.unwrap();
        session.edit_message(0, "Hello");

        assert_eq!(session.log().snapshot()[0].content, "Hello");
    }
}
