//! Ordered speech dispatch
//!
//! Segments arrive in generation order but synthesize with variable latency.
//! The dispatcher starts synthesis immediately for every dispatched segment
//! and drives playback from a FIFO queue with a single active slot: a
//! later segment never becomes audible before an earlier one has finished,
//! even if its synthesis completes first.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chat::screenplay::Screenplay;
use crate::speech::{SpeechEngine, SynthesizedSpeech};
use crate::{ChatterError, Result};

/// Playback progress events for one response
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    /// A segment's audio began playing; `caption` is the live caption to
    /// display (all bodies spoken so far this response, space-joined)
    Started {
        response_id: Uuid,
        index: usize,
        caption: String,
    },

    /// A segment finished playing
    Finished { response_id: Uuid, index: usize },

    /// Synthesis or playback failed for a segment; the queue continues
    Skipped {
        response_id: Uuid,
        index: usize,
        error: String,
    },
}

/// A dispatched segment waiting for its playback turn
struct PendingUtterance {
    index: usize,
    caption: String,
    synth_rx: oneshot::Receiver<Result<SynthesizedSpeech>>,
}

/// Queue state for the response currently being voiced
struct ActiveResponse {
    response_id: Uuid,
    queue_tx: mpsc::UnboundedSender<PendingUtterance>,
    driver: JoinHandle<()>,
    synth_tasks: Vec<JoinHandle<()>>,
}

/// FIFO speech dispatcher with speculative synthesis
pub struct SpeechDispatcher {
    engine: Arc<dyn SpeechEngine>,
    event_tx: mpsc::UnboundedSender<SpeechEvent>,
    caption: Arc<RwLock<String>>,
    active: Mutex<Option<ActiveResponse>>,
}

impl SpeechDispatcher {
    /// Create a dispatcher and the receiver for its playback events
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let dispatcher = Self {
            engine,
            event_tx,
            caption: Arc::new(RwLock::new(String::new())),
            active: Mutex::new(None),
        };

        (dispatcher, event_rx)
    }

    /// Start a new response queue, cancelling any prior response still
    /// voicing. No stale audio from the old response may play over the new
    /// one.
    pub fn begin_response(&self, response_id: Uuid) {
        self.cancel();

        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<PendingUtterance>();
        let engine = Arc::clone(&self.engine);
        let event_tx = self.event_tx.clone();
        let caption = Arc::clone(&self.caption);

        // Single active playback slot: the driver awaits each utterance's
        // synthesis and its full playback before touching the next one.
        let driver = tokio::spawn(async move {
            while let Some(pending) = queue_rx.recv().await {
                let PendingUtterance {
                    index,
                    caption: segment_caption,
                    synth_rx,
                } = pending;

                let speech = match synth_rx.await {
                    Ok(Ok(speech)) => speech,
                    Ok(Err(e)) => {
                        warn!("Synthesis failed for segment {}: {}", index, e);
                        let _ = event_tx.send(SpeechEvent::Skipped {
                            response_id,
                            index,
                            error: e.to_string(),
                        });
                        continue;
                    }
                    Err(_) => {
                        debug!("Synthesis task for segment {} went away", index);
                        continue;
                    }
                };

                *caption.write() = segment_caption.clone();
                let _ = event_tx.send(SpeechEvent::Started {
                    response_id,
                    index,
                    caption: segment_caption,
                });

                match engine.play(speech).await {
                    Ok(()) => {
                        let _ = event_tx.send(SpeechEvent::Finished { response_id, index });
                    }
                    Err(e) => {
                        warn!("Playback failed for segment {}: {}", index, e);
                        let _ = event_tx.send(SpeechEvent::Skipped {
                            response_id,
                            index,
                            error: e.to_string(),
                        });
                    }
                }
            }
        });

        *self.caption.write() = String::new();
        *self.active.lock() = Some(ActiveResponse {
            response_id,
            queue_tx,
            driver,
            synth_tasks: Vec::new(),
        });

        debug!("Speech queue opened for response {}", response_id);
    }

    /// Enqueue a segment for synthesis and ordered playback.
    ///
    /// Returns immediately; synthesis starts speculatively while earlier
    /// segments are still playing.
    pub fn dispatch(&self, screenplay: Screenplay, index: usize, caption: String) -> Result<()> {
        let mut guard = self.active.lock();
        let active = guard
            .as_mut()
            .ok_or_else(|| ChatterError::DispatchError("no active response".into()))?;

        let (synth_tx, synth_rx) = oneshot::channel();
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move {
            let result = engine.synthesize(&screenplay).await;
            let _ = synth_tx.send(result);
        });
        active.synth_tasks.push(task);

        active
            .queue_tx
            .send(PendingUtterance {
                index,
                caption,
                synth_rx,
            })
            .map_err(|_| ChatterError::DispatchError("playback queue closed".into()))
    }

    /// Cancel all queued and in-flight work for the current response
    pub fn cancel(&self) {
        if let Some(active) = self.active.lock().take() {
            debug!("Cancelling speech queue for response {}", active.response_id);
            active.driver.abort();
            for task in active.synth_tasks {
                task.abort();
            }
        }
        self.caption.write().clear();
    }

    /// The caption reflecting speaking progress, not network arrival
    pub fn live_caption(&self) -> String {
        self.caption.read().clone()
    }
}

impl Drop for SpeechDispatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}
