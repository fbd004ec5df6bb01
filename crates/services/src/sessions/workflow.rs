use std::sync::Arc;

use storage::repository::{CheckpointRepository, DeckRepository, WrongLogRepository};
use tokio::task::JoinHandle;
use voca_core::hint::Hint;
use voca_core::model::{SessionCheckpoint, WordPair};

use super::engine::{NextStep, SessionEngine, SessionSummary, SubmitOutcome};
use super::plan::{SessionMode, select_indices};
use crate::Clock;
use crate::assets::{AssetPayload, AssetPipeline};
use crate::error::SessionError;

/// A running quiz over the stored deck.
pub struct QuizSession {
    deck_name: String,
    mode: SessionMode,
    engine: SessionEngine,
}

impl QuizSession {
    #[must_use]
    pub fn deck_name(&self) -> &str {
        &self.deck_name
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.engine.is_finished()
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        self.engine.summary()
    }

    /// Hint for the active question based on how often it was missed.
    #[must_use]
    pub fn hint(&self) -> Option<Hint> {
        let pair = self.engine.current_pair()?;
        Some(Hint::for_tier(
            pair.meaning(),
            self.engine.wrong_count_for_current(),
        ))
    }
}

/// Outcome of answering one question, with any asset that was already on hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub outcome: SubmitOutcome,
    /// Persisted wrong count for the word after this answer, when it was wrong.
    pub wrong_count: Option<u32>,
    pub image: Option<AssetPayload>,
    /// An image is being produced and will arrive as a notification.
    pub image_pending: bool,
}

/// Orchestrates session start, answering, and end-of-session persistence.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    decks: Arc<dyn DeckRepository>,
    wrong_log: Arc<dyn WrongLogRepository>,
    checkpoints: Arc<dyn CheckpointRepository>,
    images: AssetPipeline,
    audio: Option<AssetPipeline>,
}

impl SessionLoopService {
    /// `images` records wrong answers (and their stats) and supplies mnemonic
    /// images.
    #[must_use]
    pub fn new(
        clock: Clock,
        decks: Arc<dyn DeckRepository>,
        wrong_log: Arc<dyn WrongLogRepository>,
        checkpoints: Arc<dyn CheckpointRepository>,
        images: AssetPipeline,
    ) -> Self {
        Self {
            clock,
            decks,
            wrong_log,
            checkpoints,
            images,
            audio: None,
        }
    }

    /// Prefetch pronunciation audio whenever a question is shown.
    #[must_use]
    pub fn with_audio(mut self, audio: AssetPipeline) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Start a session over the stored deck.
    ///
    /// A wrong-only session consumes the persisted wrong log.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoDeck` when nothing was imported,
    /// `SessionError::Empty` when the mode selects no words, and
    /// `SessionError::Storage` for store failures.
    pub async fn start_session(&self, mode: SessionMode) -> Result<QuizSession, SessionError> {
        let deck = self.decks.current_deck().await?.ok_or(SessionError::NoDeck)?;

        let wrong_log = match mode {
            SessionMode::WrongOnly => self.wrong_log.wrong_log().await?,
            SessionMode::All | SessionMode::Short => Vec::new(),
        };
        let indices = select_indices(mode, &deck, &wrong_log, &mut rand::rng());
        if indices.is_empty() {
            return Err(SessionError::Empty);
        }
        if mode == SessionMode::WrongOnly {
            self.wrong_log.clear_wrong_log().await?;
        }

        let deck_name = deck.name().to_owned();
        let mut engine = SessionEngine::new();
        engine.load(deck.into_words());
        engine.start(Some(&indices));
        tracing::info!(
            deck = %deck_name,
            mode = mode.as_str(),
            words = indices.len(),
            "session started"
        );

        Ok(QuizSession {
            deck_name,
            mode,
            engine,
        })
    }

    /// Next question, or the summary once the session is exhausted.
    ///
    /// Showing a question kicks off background audio fetching and image
    /// preloading; those never fail the call.
    pub async fn next_prompt(&self, session: &mut QuizSession) -> NextStep {
        let step = session.engine.next_prompt();
        if let NextStep::Prompt(prompt) = &step {
            let word = prompt.question_text.as_str();
            if let Some(audio) = &self.audio {
                audio.acquire_in_background(word, false);
            }
            if let Err(e) = self.images.preload_if_needed(word).await {
                tracing::warn!(word, error = %e, "image preload check failed");
            }
        }
        step
    }

    /// Grade an answer. Wrong answers bump the word's persisted wrong count.
    ///
    /// Returns `Ok(None)` when there is no active question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Asset` when the wrong count cannot be stored.
    pub async fn answer(
        &self,
        session: &mut QuizSession,
        answer: &str,
    ) -> Result<Option<AnswerResult>, SessionError> {
        let Some(outcome) = session.engine.submit(answer) else {
            return Ok(None);
        };

        if outcome.is_correct {
            return Ok(Some(AnswerResult {
                outcome,
                wrong_count: None,
                image: None,
                image_pending: false,
            }));
        }

        let record = self.images.record_wrong_answer(&outcome.word).await?;
        Ok(Some(AnswerResult {
            wrong_count: Some(record.stat.wrong_count()),
            image: record.asset,
            image_pending: record.generating,
            outcome,
        }))
    }

    /// Generate an image for the active question now, regardless of how often
    /// it was missed. The result also arrives as an `AssetReady` notification.
    ///
    /// Returns `None` when no question is active.
    pub fn request_image(
        &self,
        session: &QuizSession,
    ) -> Option<JoinHandle<Option<AssetPayload>>> {
        let pair = session.engine.current_pair()?;
        Some(self.images.acquire_in_background(pair.word(), true))
    }

    /// Pronunciation for the active question, fetched if not cached.
    ///
    /// `Ok(None)` when no question is active, no audio source is configured,
    /// or every source came back empty.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Asset` when the audio cache cannot be read.
    pub async fn replay_audio(
        &self,
        session: &QuizSession,
    ) -> Result<Option<AssetPayload>, SessionError> {
        let (Some(pair), Some(audio)) = (session.engine.current_pair(), &self.audio) else {
            return Ok(None);
        };
        Ok(audio.acquire(pair.word(), false).await?)
    }

    /// Persist the session's wrong list for a later wrong-only session.
    ///
    /// An empty wrong list leaves the stored log untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` if questions remain and
    /// `SessionError::Storage` when the log cannot be written.
    pub async fn finish(&self, session: &QuizSession) -> Result<SessionSummary, SessionError> {
        if !session.is_finished() {
            return Err(SessionError::NotFinished);
        }

        let wrong = session.engine.export_wrong();
        if !wrong.is_empty() {
            self.wrong_log
                .replace_wrong_log(&wrong, self.clock.now())
                .await?;
        }

        let summary = session.summary();
        tracing::info!(
            deck = %session.deck_name,
            score = summary.score,
            total = summary.total,
            wrong = summary.wrong_count,
            "session finished"
        );
        Ok(summary)
    }

    /// Record that the user left mid-session. Only the deck name survives;
    /// queue position is not saved.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the checkpoint cannot be written.
    pub async fn save_and_quit(
        &self,
        session: QuizSession,
    ) -> Result<SessionCheckpoint, SessionError> {
        let checkpoint = SessionCheckpoint::new(session.deck_name, self.clock.now());
        self.checkpoints.save_checkpoint(&checkpoint).await?;
        Ok(checkpoint)
    }

    /// Checkpoint left by the last [`save_and_quit`](Self::save_and_quit).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the checkpoint cannot be read.
    pub async fn resumable(&self) -> Result<Option<SessionCheckpoint>, SessionError> {
        Ok(self.checkpoints.checkpoint().await?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the checkpoint cannot be cleared.
    pub async fn discard_checkpoint(&self) -> Result<(), SessionError> {
        Ok(self.checkpoints.clear_checkpoint().await?)
    }

    /// Words queued for the next wrong-only session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the log cannot be read.
    pub async fn pending_wrong(&self) -> Result<Vec<WordPair>, SessionError> {
        Ok(self.wrong_log.wrong_log().await?)
    }
}
