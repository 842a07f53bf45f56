use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

use crate::schemas::exam::{OptionKey, Question};
use crate::services::exam_api::{ExamService, FetchError};
use crate::session::state::{ExamSession, SessionState, SubmitTrigger, Tick};

/// Mutating entry points the owning view can send into a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    SelectOption { question_id: i64, option: OptionKey },
    Submit,
}

/// User-visible session events; the view renders these as toasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionNotice {
    FetchFailed { message: String },
    Submitted,
    AutoSubmitted,
    SubmitFailed { message: String },
}

impl fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionNotice::FetchFailed { message } => write!(f, "{message}"),
            SessionNotice::Submitted => f.write_str("Exam submitted successfully."),
            SessionNotice::AutoSubmitted => {
                f.write_str("Time is up: your answers were submitted automatically.")
            }
            SessionNotice::SubmitFailed { message } => {
                write!(f, "Submission failed: {message}. The attempt is closed; contact your instructor.")
            }
        }
    }
}

/// Everything the view needs to render one frame of the session.
#[derive(Debug, Clone)]
pub(crate) struct SessionSnapshot {
    pub(crate) state: SessionState,
    pub(crate) title: String,
    pub(crate) remaining_seconds: u64,
    pub(crate) questions: Arc<Vec<Question>>,
    pub(crate) answers: HashMap<i64, OptionKey>,
}

/// Drives one [`ExamSession`] against an [`ExamService`]: single fetch on
/// start, countdown while active, at-most-once submission on whichever of the
/// manual and timeout triggers fires first.
pub(crate) struct ExamSessionController<S: ExamService> {
    service: Arc<S>,
    session: ExamSession,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
}

impl<S: ExamService> ExamSessionController<S> {
    pub(crate) fn new(
        service: Arc<S>,
        exam_id: i64,
    ) -> (Self, watch::Receiver<SessionSnapshot>, mpsc::UnboundedReceiver<SessionNotice>) {
        let session = ExamSession::new(exam_id);
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot_of(&session));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        (Self { service, session, snapshot_tx, notice_tx }, snapshot_rx, notice_rx)
    }

    /// Fetch the exam content. At most one network call per session no matter
    /// how many times the owning view calls this.
    pub(crate) async fn start(&mut self) {
        if !self.session.begin_fetch() {
            return;
        }

        let exam_id = self.session.exam_id();
        match self.service.fetch_exam(exam_id).await {
            Ok(content) => {
                tracing::info!(
                    exam_id,
                    duration_minutes = content.duration_minutes,
                    questions = content.questions.len(),
                    "Exam session active"
                );
                self.session.activate(content);
            }
            Err(err) => {
                tracing::error!(exam_id, error = %err, "Failed to start exam session");
                self.session.fail();
                self.notify(SessionNotice::FetchFailed { message: fetch_failure_message(&err) });
            }
        }
        self.publish();
    }

    pub(crate) fn select_option(&mut self, question_id: i64, option: OptionKey) {
        self.session.select_option(question_id, option);
        self.publish();
    }

    /// At-most-once submission; the state machine arbitrates between the
    /// manual and timeout triggers, so the loser is a silent no-op.
    pub(crate) async fn submit(&mut self, trigger: SubmitTrigger) {
        let Some(request) = self.session.take_submission() else {
            return;
        };
        self.publish();

        let exam_id = request.exam_id;
        match self.service.submit_exam(&request).await {
            Ok(ack) => {
                tracing::info!(
                    exam_id,
                    answers = request.answers.len(),
                    trigger = ?trigger,
                    "Exam submitted"
                );
                if let Some(message) = ack.message {
                    tracing::debug!(exam_id, message, "Submission acknowledgment");
                }
                self.session.complete();
                self.notify(match trigger {
                    SubmitTrigger::Manual => SessionNotice::Submitted,
                    SubmitTrigger::Timeout => SessionNotice::AutoSubmitted,
                });
            }
            Err(err) => {
                tracing::error!(exam_id, error = %err, trigger = ?trigger, "Exam submission failed");
                // There is no retry path: the attempt is spent whether or not
                // the service accepted the payload.
                self.session.complete();
                self.notify(SessionNotice::SubmitFailed { message: err.to_string() });
            }
        }
        self.publish();
    }

    /// One countdown second; fires the timeout submission when it expires.
    pub(crate) async fn handle_tick(&mut self) {
        match self.session.tick() {
            Tick::Expired => {
                tracing::info!(exam_id = self.session.exam_id(), "Exam time expired");
                self.publish();
                self.submit(SubmitTrigger::Timeout).await;
            }
            Tick::Counting => self.publish(),
            Tick::Idle => {}
        }
    }

    /// Event loop for one attempt. The countdown interval exists only while
    /// the session is active and the exam carries a duration, and it is
    /// dropped on every exit from `Active`, so an expired timer can never fire
    /// into a finished session. Closing the command channel tears the session
    /// down without submitting (the attempt is abandoned).
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> SessionState {
        self.start().await;

        let mut countdown = self.countdown();
        while self.session.is_active() {
            match countdown.as_mut() {
                Some(ticker) => {
                    tokio::select! {
                        command = commands.recv() => match command {
                            Some(command) => self.handle_command(command).await,
                            None => break,
                        },
                        _ = ticker.tick() => self.handle_tick().await,
                    }
                }
                None => match commands.recv().await {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }

            if !self.session.is_active() {
                countdown = None;
            }
        }

        self.session.state()
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SelectOption { question_id, option } => {
                self.select_option(question_id, option);
            }
            SessionCommand::Submit => self.submit(SubmitTrigger::Manual).await,
        }
    }

    fn countdown(&self) -> Option<Interval> {
        if !self.session.is_active() || self.session.duration_seconds() == 0 {
            return None;
        }
        let mut ticker =
            interval_at(Instant::now() + Duration::from_secs(1), Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(ticker)
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(snapshot_of(&self.session));
    }

    fn notify(&self, notice: SessionNotice) {
        // The view may already be gone during teardown.
        let _ = self.notice_tx.send(notice);
    }
}

fn snapshot_of(session: &ExamSession) -> SessionSnapshot {
    SessionSnapshot {
        state: session.state(),
        title: session.title().to_string(),
        remaining_seconds: session.remaining_seconds(),
        questions: Arc::clone(session.questions()),
        answers: session.answers().clone(),
    }
}

fn fetch_failure_message(err: &FetchError) -> String {
    match err {
        FetchError::NotStartable(detail) => format!(
            "Unable to start the exam. It may already have been started or submitted. ({detail})"
        ),
        FetchError::Transport(detail) => format!("Could not load the exam: {detail}"),
    }
}
