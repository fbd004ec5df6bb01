use std::collections::{HashMap, HashSet, VecDeque};

use voca_core::answer::is_correct;
use voca_core::model::WordPair;

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

/// First-pass progress: correct first attempts out of the initial set size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// A question ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Index of the word in the loaded pool.
    pub question_id: usize,
    pub question_text: String,
    /// One more than the number of times this question was already missed.
    pub attempt: u32,
    pub from_retry: bool,
    pub progress: Progress,
}

/// Scores for a session, finished or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub score: usize,
    pub total: usize,
    pub wrong_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Prompt(Prompt),
    Finished(SessionSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    RetrySame,
    NextQuestion,
    ShowSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub is_correct: bool,
    pub word: String,
    pub correct_answer: String,
    pub next_action: NextAction,
    /// Failed attempts on this question so far this session.
    pub wrong_attempts: u32,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
struct Question {
    index: usize,
    pair: WordPair,
    from_retry: bool,
}

/// Quiz state machine over a loaded word pool.
///
/// Missed questions go to the back of a retry queue that is always drained
/// before the next fresh word. Every transition is synchronous.
#[derive(Debug, Default)]
pub struct SessionEngine {
    words: Vec<WordPair>,
    remaining: VecDeque<usize>,
    retry_queue: VecDeque<Question>,
    current: Option<Question>,
    score: usize,
    total: usize,
    wrong_list: Vec<WordPair>,
    wrong_seen: HashSet<String>,
    wrong_attempts: HashMap<WordPair, u32>,
}

impl SessionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the word pool and return how many words it holds.
    ///
    /// Any running session is discarded; call [`start`](Self::start) next.
    pub fn load(&mut self, words: Vec<WordPair>) -> usize {
        self.words = words;
        self.reset(VecDeque::new());
        self.words.len()
    }

    #[must_use]
    pub fn words(&self) -> &[WordPair] {
        &self.words
    }

    /// Begin a session over every word, or over `indices` in the given order.
    /// Indices outside the pool are skipped.
    pub fn start(&mut self, indices: Option<&[usize]>) {
        let remaining = match indices {
            Some(indices) => indices
                .iter()
                .copied()
                .filter(|&i| i < self.words.len())
                .collect(),
            None => (0..self.words.len()).collect(),
        };
        self.reset(remaining);
    }

    fn reset(&mut self, remaining: VecDeque<usize>) {
        self.total = remaining.len();
        self.remaining = remaining;
        self.retry_queue.clear();
        self.current = None;
        self.score = 0;
        self.wrong_list.clear();
        self.wrong_seen.clear();
        self.wrong_attempts.clear();
    }

    /// The active question, pulling the next one in if none is active.
    ///
    /// Repeated calls without a submit return the same question.
    pub fn next_prompt(&mut self) -> NextStep {
        if self.current.is_none() {
            self.current = self.pull_next();
        }

        match &self.current {
            Some(question) => NextStep::Prompt(Prompt {
                question_id: question.index,
                question_text: question.pair.word().to_owned(),
                attempt: self.attempts_for(&question.pair) + 1,
                from_retry: question.from_retry,
                progress: Progress {
                    done: self.score,
                    total: self.total,
                },
            }),
            None => NextStep::Finished(self.summary()),
        }
    }

    fn pull_next(&mut self) -> Option<Question> {
        if let Some(mut retry) = self.retry_queue.pop_front() {
            retry.from_retry = true;
            return Some(retry);
        }
        let index = self.remaining.pop_front()?;
        Some(Question {
            index,
            pair: self.words[index].clone(),
            from_retry: false,
        })
    }

    /// Grade `answer` against the active question.
    ///
    /// Returns `None` when no question is active; that is not an error so a
    /// duplicated submit event does nothing.
    pub fn submit(&mut self, answer: &str) -> Option<SubmitOutcome> {
        let question = self.current.take()?;
        let word = question.pair.word().to_owned();
        let correct_answer = question.pair.meaning().to_owned();

        if !is_correct(answer, &correct_answer) {
            let attempts = self.wrong_attempts.entry(question.pair.clone()).or_insert(0);
            *attempts += 1;
            let wrong_attempts = *attempts;

            if self.wrong_seen.insert(question.pair.word().to_owned()) {
                self.wrong_list.push(question.pair.clone());
            }
            self.retry_queue.push_back(question);

            return Some(SubmitOutcome {
                is_correct: false,
                word,
                correct_answer,
                next_action: NextAction::RetrySame,
                wrong_attempts,
            });
        }

        if !question.from_retry {
            self.score += 1;
        }
        let next_action = if self.queues_empty() {
            NextAction::ShowSummary
        } else {
            NextAction::NextQuestion
        };

        Some(SubmitOutcome {
            is_correct: true,
            word,
            correct_answer,
            next_action,
            wrong_attempts: self.attempts_for(&question.pair),
        })
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            score: self.score,
            total: self.total,
            wrong_count: self.wrong_list.len(),
        }
    }

    /// Missed words in the order they were first missed.
    #[must_use]
    pub fn export_wrong(&self) -> Vec<WordPair> {
        self.wrong_list.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current.is_none() && self.queues_empty()
    }

    /// Failed attempts on the active question, for picking a hint tier.
    #[must_use]
    pub fn wrong_count_for_current(&self) -> u32 {
        self.current
            .as_ref()
            .map_or(0, |question| self.attempts_for(&question.pair))
    }

    #[must_use]
    pub fn wrong_count_for(&self, pair: &WordPair) -> u32 {
        self.attempts_for(pair)
    }

    /// The active question's word pair, if any.
    #[must_use]
    pub fn current_pair(&self) -> Option<&WordPair> {
        self.current.as_ref().map(|question| &question.pair)
    }

    fn attempts_for(&self, pair: &WordPair) -> u32 {
        self.wrong_attempts.get(pair).copied().unwrap_or(0)
    }

    fn queues_empty(&self) -> bool {
        self.remaining.is_empty() && self.retry_queue.is_empty()
    }
}
