use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kisan_core::LocaleTag;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    #[error("speech capability is unavailable")]
    Unavailable,
    #[error("speech recognition failed: {0}")]
    Recognition(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

/// Text-to-speech engine provided by the platform.
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Resolves when the utterance has finished playing.
    fn speak(
        &self,
        text: &str,
        locale: LocaleTag,
    ) -> impl Future<Output = Result<(), SpeechError>> + Send;

    /// Cuts off whatever the engine is currently playing.
    fn cancel(&self);
}

/// Single-shot speech-to-text provided by the platform.
pub trait SpeechRecognizer: Send + Sync {
    fn listen(&self, locale: LocaleTag)
        -> impl Future<Output = Result<String, SpeechError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started { utterance: u64 },
    Ended { utterance: u64 },
    Interrupted { utterance: u64 },
    Failed { utterance: u64, message: String },
}

struct InFlight {
    utterance: u64,
    handle: JoinHandle<()>,
}

/// Single-flight speech output: starting an utterance interrupts the one
/// still playing. Must be used inside a tokio runtime.
pub struct SpeechOutput<T> {
    engine: Arc<T>,
    in_flight: Mutex<Option<InFlight>>,
    next_utterance: AtomicU64,
    events: broadcast::Sender<SpeechEvent>,
}

impl<T> SpeechOutput<T>
where
    T: SpeechSynthesizer,
{
    pub fn new(engine: T) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            engine: Arc::new(engine),
            in_flight: Mutex::new(None),
            next_utterance: AtomicU64::new(0),
            events,
        }
    }

    pub fn engine(&self) -> &T {
        &self.engine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.events.subscribe()
    }

    /// Starts speaking `text` and returns its utterance id.
    pub fn speak(&self, text: impl Into<String>, locale: LocaleTag) -> u64 {
        let utterance = self.next_utterance.fetch_add(1, Ordering::Relaxed) + 1;
        let mut guard = self.in_flight.lock();
        self.interrupt(guard.take());

        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let text = text.into();
        let handle = tokio::spawn(async move {
            let _ = events.send(SpeechEvent::Started { utterance });
            let event = match engine.speak(&text, locale).await {
                Ok(()) => SpeechEvent::Ended { utterance },
                Err(err) => SpeechEvent::Failed {
                    utterance,
                    message: err.to_string(),
                },
            };
            let _ = events.send(event);
        });

        debug!(utterance, locale = %locale, "utterance started");
        *guard = Some(InFlight { utterance, handle });
        utterance
    }

    /// Returns `true` if an utterance was cut off.
    pub fn stop(&self) -> bool {
        let in_flight = self.in_flight.lock().take();
        self.interrupt(in_flight)
    }

    pub fn is_speaking(&self) -> bool {
        self.in_flight
            .lock()
            .as_ref()
            .is_some_and(|in_flight| !in_flight.handle.is_finished())
    }

    fn interrupt(&self, in_flight: Option<InFlight>) -> bool {
        let Some(in_flight) = in_flight else {
            return false;
        };
        if in_flight.handle.is_finished() {
            return false;
        }

        in_flight.handle.abort();
        self.engine.cancel();
        let _ = self.events.send(SpeechEvent::Interrupted {
            utterance: in_flight.utterance,
        });
        debug!(utterance = in_flight.utterance, "utterance interrupted");
        true
    }
}

impl<T> Drop for SpeechOutput<T> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.get_mut().take() {
            in_flight.handle.abort();
        }
    }
}
