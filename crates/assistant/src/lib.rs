mod resolver;
pub mod speech;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use kisan_core::{Answer, IntentRouter, Language, LocaleTag, QueryKind, Route, Rulebook};
use kisan_llm::AnswerService;
use kisan_observability::AppMetrics;
use serde::Serialize;
use tracing::{info, instrument};

pub use resolver::ResponseResolver;
pub use speech::{SpeechError, SpeechEvent, SpeechOutput, SpeechRecognizer, SpeechSynthesizer};

/// Everything produced for one transcript.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantTurn {
    /// Increases with every handled transcript; see [`VoiceAssistant::is_latest`].
    pub turn: u64,
    pub transcript: String,
    pub language: Language,
    pub locale: LocaleTag,
    pub route: Option<Route>,
    pub answer: Answer,
}

/// Runs the intent router and the response resolver over the same transcript.
/// The two results are independent of each other.
pub struct VoiceAssistant<S> {
    router: IntentRouter,
    resolver: ResponseResolver<S>,
    metrics: Arc<AppMetrics>,
    turns: AtomicU64,
}

impl<S> VoiceAssistant<S>
where
    S: AnswerService,
{
    pub fn new(rulebook: &Rulebook, remote: S, metrics: Arc<AppMetrics>) -> Self {
        Self {
            router: rulebook.router(),
            resolver: ResponseResolver::new(remote, rulebook.fallback_table(), metrics.clone()),
            metrics,
            turns: AtomicU64::new(0),
        }
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn resolver(&self) -> &ResponseResolver<S> {
        &self.resolver
    }

    pub fn resolve_route(&self, transcript: &str) -> Option<Route> {
        let route = self.router.resolve_route(transcript).cloned();
        if route.is_some() {
            self.metrics.inc_route_match();
        }
        route
    }

    pub async fn handle(&self, transcript: &str, language: Language) -> AssistantTurn {
        self.handle_as(QueryKind::Chat, transcript, language).await
    }

    #[instrument(skip(self, transcript), fields(kind = kind.as_str(), language = %language))]
    pub async fn handle_as(
        &self,
        kind: QueryKind,
        transcript: &str,
        language: Language,
    ) -> AssistantTurn {
        let started = Instant::now();
        let turn = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.inc_request();

        let route = self.resolve_route(transcript);
        let answer = self.resolver.answer_as(kind, transcript, language).await;

        self.metrics.observe_latency(started.elapsed());
        info!(
            turn,
            route = route.as_ref().map(Route::as_str).unwrap_or("-"),
            source = ?answer.source(),
            "transcript handled"
        );

        AssistantTurn {
            turn,
            transcript: transcript.to_string(),
            language,
            locale: LocaleTag::for_language(language),
            route,
            answer,
        }
    }

    /// Handles the transcript and speaks the answer, interrupting any
    /// utterance still playing.
    pub async fn handle_and_speak<T>(
        &self,
        transcript: &str,
        language: Language,
        speech: &SpeechOutput<T>,
    ) -> AssistantTurn
    where
        T: SpeechSynthesizer,
    {
        let turn = self.handle(transcript, language).await;
        speech.speak(turn.answer.text(), turn.locale);
        turn
    }

    /// Listens once and handles whatever was heard.
    pub async fn listen_and_handle<R>(
        &self,
        recognizer: &R,
        language: Language,
    ) -> Result<AssistantTurn, SpeechError>
    where
        R: SpeechRecognizer,
    {
        let transcript = recognizer.listen(LocaleTag::for_language(language)).await?;
        Ok(self.handle(&transcript, language).await)
    }

    /// Whether `turn` is the most recent one started. Callers use this to drop
    /// results of a slower, older turn that completes late.
    pub fn is_latest(&self, turn: u64) -> bool {
        self.turns.load(Ordering::SeqCst) == turn
    }
}
