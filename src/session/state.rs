use std::collections::HashMap;
use std::sync::Arc;

use crate::schemas::exam::{AnswerEntry, ExamContent, OptionKey, Question, SubmitRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Loading,
    Active,
    Submitting,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitTrigger {
    Manual,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    /// Countdown is not running: session inactive or the exam has no duration.
    Idle,
    /// One second elapsed, time still remains.
    Counting,
    /// The countdown just hit zero; fire the timeout submission.
    Expired,
}

/// One timed attempt at one exam. Content is fetched exactly once, answers
/// accumulate only while the session is active, and exactly one submission
/// leaves it, whichever of the manual and timeout triggers comes first.
#[derive(Debug)]
pub(crate) struct ExamSession {
    exam_id: i64,
    title: String,
    duration_seconds: u64,
    remaining_seconds: u64,
    questions: Arc<Vec<Question>>,
    answers: HashMap<i64, OptionKey>,
    state: SessionState,
    fetch_started: bool,
    auto_submitted: bool,
}

impl ExamSession {
    pub(crate) fn new(exam_id: i64) -> Self {
        Self {
            exam_id,
            title: String::new(),
            duration_seconds: 0,
            remaining_seconds: 0,
            questions: Arc::new(Vec::new()),
            answers: HashMap::new(),
            state: SessionState::Loading,
            fetch_started: false,
            auto_submitted: false,
        }
    }

    pub(crate) fn exam_id(&self) -> i64 {
        self.exam_id
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub(crate) fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub(crate) fn questions(&self) -> &Arc<Vec<Question>> {
        &self.questions
    }

    pub(crate) fn answers(&self) -> &HashMap<i64, OptionKey> {
        &self.answers
    }

    /// At-most-once fetch guard. The flag is set before the caller suspends on
    /// the network call, so a re-entrant `start` can never fetch twice.
    pub(crate) fn begin_fetch(&mut self) -> bool {
        if self.state != SessionState::Loading || self.fetch_started {
            return false;
        }
        self.fetch_started = true;
        true
    }

    pub(crate) fn activate(&mut self, content: ExamContent) {
        if self.state != SessionState::Loading {
            return;
        }
        self.title = content.title;
        self.duration_seconds = u64::from(content.duration_minutes) * 60;
        self.remaining_seconds = self.duration_seconds;
        self.questions = Arc::new(content.questions);
        self.state = SessionState::Active;
    }

    pub(crate) fn fail(&mut self) {
        if self.state == SessionState::Loading {
            self.state = SessionState::Failed;
        }
    }

    /// Last write wins. Outside `Active`, or for a question or option the exam
    /// does not offer, this is a silent no-op: a stray click after expiry is
    /// normal UI traffic, not an error.
    pub(crate) fn select_option(&mut self, question_id: i64, option: OptionKey) {
        if self.state != SessionState::Active {
            return;
        }
        let offered = self.questions.iter().any(|q| q.id == question_id && q.offers(option));
        if !offered {
            return;
        }
        self.answers.insert(question_id, option);
    }

    /// One countdown second. `remaining_seconds` only ever decreases, clamps
    /// at zero, and expiry is reported exactly once.
    pub(crate) fn tick(&mut self) -> Tick {
        if self.state != SessionState::Active || self.duration_seconds == 0 {
            return Tick::Idle;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return Tick::Counting;
        }
        if self.auto_submitted {
            return Tick::Idle;
        }
        self.auto_submitted = true;
        Tick::Expired
    }

    /// The single-submission gate: consumes `Active` into `Submitting` and
    /// builds the payload, at most once per session lifetime. The losing
    /// trigger gets `None` and must treat it as a no-op.
    pub(crate) fn take_submission(&mut self) -> Option<SubmitRequest> {
        if self.state != SessionState::Active {
            return None;
        }
        self.state = SessionState::Submitting;

        let mut answers: Vec<AnswerEntry> = self
            .answers
            .iter()
            .map(|(&question_id, &selected_option)| AnswerEntry { question_id, selected_option })
            .collect();
        // Payload order is not significant to the service; sort for a stable
        // wire shape.
        answers.sort_by_key(|entry| entry.question_id);

        Some(SubmitRequest { exam_id: self.exam_id, answers })
    }

    pub(crate) fn complete(&mut self) {
        if self.state == SessionState::Submitting {
            self.state = SessionState::Completed;
        }
    }
}
