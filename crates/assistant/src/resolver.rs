use std::sync::Arc;

use kisan_core::rulebook::HELP_KEYWORD;
use kisan_core::{Answer, FallbackTable, Language, QueryKind};
use kisan_llm::{AnswerRequest, AnswerService};
use kisan_observability::AppMetrics;
use tracing::{debug, instrument, warn};

/// Remote answer first, then the keyword-indexed fallback table, then the
/// generic message. Never fails.
pub struct ResponseResolver<S> {
    remote: S,
    table: FallbackTable,
    metrics: Arc<AppMetrics>,
}

impl<S> ResponseResolver<S>
where
    S: AnswerService,
{
    pub fn new(remote: S, table: FallbackTable, metrics: Arc<AppMetrics>) -> Self {
        Self {
            remote,
            table,
            metrics,
        }
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub fn table(&self) -> &FallbackTable {
        &self.table
    }

    pub async fn answer(&self, transcript: &str, language: Language) -> Answer {
        self.answer_as(QueryKind::Chat, transcript, language).await
    }

    #[instrument(skip(self, transcript), fields(kind = kind.as_str(), language = %language))]
    pub async fn answer_as(&self, kind: QueryKind, transcript: &str, language: Language) -> Answer {
        if transcript.trim().is_empty() {
            debug!("empty transcript, answering with help");
            self.metrics.inc_fallback();
            return self.local_answer(HELP_KEYWORD, language);
        }

        let request = AnswerRequest::new(transcript, kind, language);
        match self.remote.ask(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                self.metrics.inc_remote_answer();
                return Answer::Remote {
                    text: text.trim().to_string(),
                };
            }
            Ok(_) => {
                warn!("remote answer was blank, using local fallback");
                self.metrics.inc_remote_failure();
            }
            Err(err) => {
                warn!(error = %err, "remote answer failed, using local fallback");
                self.metrics.inc_remote_failure();
            }
        }

        self.metrics.inc_fallback();
        self.local_answer(transcript, language)
    }

    /// Fallback stage alone. Same input always gives the same answer.
    pub fn local_answer(&self, transcript: &str, language: Language) -> Answer {
        let hit = self.table.lookup(transcript, language);
        Answer::Local {
            text: hit.text.to_string(),
            keyword: hit.keyword.map(ToString::to_string),
        }
    }
}
