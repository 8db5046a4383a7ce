use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use validator::Validate;

use crate::config::Config;
use crate::error::EngineError;
use crate::metrics::{
    ANSWERS_RECORDED_TOTAL, AUTO_ADVANCE_TOTAL, INDEX_PERSIST_FAILURES_TOTAL, RECONCILE_TOTAL,
    SESSIONS_ACTIVE, SESSIONS_TOTAL,
};
use crate::models::results::{RankEstimate, TestResults};
use crate::models::{
    AnswerValue, KeyInput, PhaseName, Question, SessionSnapshot, TestConfig,
};
use crate::remote::SessionToken;
use crate::services::clock::{ClockSignal, DualClock};
use crate::services::ledger::{AnswerLedger, RecordOutcome};
use crate::services::scoring;
use crate::services::Collaborators;

/// Everything owned while the exam is running.
#[derive(Debug)]
pub struct ActiveSession {
    token: SessionToken,
    questions: Vec<Question>,
    current_index: usize,
    ledger: AnswerLedger,
    clock: DualClock,
}

/// Terminal state: the paper, the final ledger and the results derived
/// from them exactly once. The session token is gone, so no further
/// authority calls can be issued.
#[derive(Debug)]
pub struct FinishedSession {
    questions: Vec<Question>,
    ledger: AnswerLedger,
    results: TestResults,
}

/// Session phase as a tagged variant so illegal states (e.g. ledger
/// mutation during setup) are unrepresentable.
#[derive(Debug)]
pub enum Phase {
    Setup,
    Active(ActiveSession),
    Finished(FinishedSession),
}

/// The exam-session state machine. All mutation happens through these
/// methods; the event-loop driver (`EngineHandle`) serializes callers.
pub struct SessionEngine {
    phase: Phase,
    config: Config,
    collaborators: Arc<Collaborators>,
}

impl SessionEngine {
    pub fn new(config: Config, collaborators: Arc<Collaborators>) -> Self {
        Self {
            phase: Phase::Setup,
            config,
            collaborators,
        }
    }

    pub fn phase_name(&self) -> PhaseName {
        match self.phase {
            Phase::Setup => PhaseName::Setup,
            Phase::Active(_) => PhaseName::Active,
            Phase::Finished(_) => PhaseName::Finished,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// Start a test: fetch the paper and open the authoritative
    /// session. Both must succeed or the phase stays `Setup` with no
    /// partial state. On success the clock is initialized and an
    /// immediate reconcile is issued.
    pub async fn start(&mut self, test_config: TestConfig) -> Result<(), EngineError> {
        if !matches!(self.phase, Phase::Setup) {
            return Err(EngineError::AlreadyActive);
        }

        test_config
            .validate()
            .context("invalid test configuration")
            .map_err(EngineError::SetupFailed)?;

        let (questions, token) = tokio::try_join!(
            self.collaborators
                .questions
                .fetch(&test_config.subject, test_config.duration_seconds),
            self.collaborators
                .authority
                .open(&test_config.subject, test_config.duration_seconds),
        )
        .map_err(EngineError::SetupFailed)?;

        // An active session always has a valid current index, so a
        // paper with no questions can never become active, whatever
        // the question source returned.
        if questions.is_empty() {
            return Err(EngineError::SetupFailed(anyhow!(
                "question source returned an empty paper"
            )));
        }

        tracing::info!(
            "Test session started: token={}, subject={}, questions={}",
            token.as_str(),
            test_config.subject,
            questions.len()
        );

        self.phase = Phase::Active(ActiveSession {
            token,
            questions,
            current_index: 0,
            ledger: AnswerLedger::new(),
            clock: DualClock::new(test_config.duration_seconds, self.config.question_seconds),
        });

        SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        SESSIONS_ACTIVE.inc();

        // Initial drift correction straight away; periodic cycles
        // follow on the reconcile cadence.
        self.reconcile().await;

        Ok(())
    }

    /// Record or overwrite an answer, subject to the section-B cap.
    pub fn select_option(
        &mut self,
        question_id: u32,
        value: AnswerValue,
    ) -> Result<RecordOutcome, EngineError> {
        let active = self.active_mut()?;

        let question = active
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned()
            .ok_or(EngineError::UnknownQuestion(question_id))?;

        let outcome = active.ledger.record(&active.questions, &question, value);
        match &outcome {
            RecordOutcome::Recorded => {
                ANSWERS_RECORDED_TOTAL.with_label_values(&["accepted"]).inc();
            }
            RecordOutcome::Rejected { subsection, cap } => {
                ANSWERS_RECORDED_TOTAL.with_label_values(&["rejected"]).inc();
                tracing::info!(
                    "Answer rejected by section-B cap: question={}, subsection={}, cap={}",
                    question_id,
                    subsection,
                    cap
                );
            }
        }

        Ok(outcome)
    }

    /// Remove a recorded answer, freeing one slot under the cap.
    pub fn clear_answer(&mut self, question_id: u32) -> Result<Option<AnswerValue>, EngineError> {
        let active = self.active_mut()?;
        Ok(active.ledger.clear(question_id))
    }

    /// Move to the next question, or finish when already on the last
    /// one. `auto` marks exhaustion-triggered navigation; behavior is
    /// identical, the flag is observability only.
    pub fn advance(&mut self, auto: bool) -> Result<(), EngineError> {
        let active = self.active_mut()?;

        let trigger = if auto { "auto" } else { "manual" };
        AUTO_ADVANCE_TOTAL.with_label_values(&[trigger]).inc();

        if active.current_index + 1 < active.questions.len() {
            active.current_index += 1;
            active.clock.reset_question();
            let new_index = active.current_index;
            tracing::debug!("Advanced to question {} ({})", new_index, trigger);
            self.persist_index(new_index);
        } else {
            self.finish();
        }

        Ok(())
    }

    /// Move to the previous question. No-op at index zero.
    pub fn retreat(&mut self) -> Result<(), EngineError> {
        let active = self.active_mut()?;

        if active.current_index > 0 {
            active.current_index -= 1;
            active.clock.reset_question();
            let new_index = active.current_index;
            self.persist_index(new_index);
        }

        Ok(())
    }

    /// Keyboard facade over selection and navigation. Option letters
    /// are no-ops on subjective questions.
    pub fn handle_key(&mut self, key: KeyInput) -> Result<Option<RecordOutcome>, EngineError> {
        match key {
            KeyInput::Prev => {
                self.retreat()?;
                Ok(None)
            }
            KeyInput::Next => {
                self.advance(false)?;
                Ok(None)
            }
            KeyInput::Option(label) => {
                let active = self.active_mut()?;
                let question = &active.questions[active.current_index];
                if question.is_subjective() {
                    return Ok(None);
                }
                let id = question.id;
                self.select_option(id, AnswerValue::Choice(label)).map(Some)
            }
        }
    }

    /// Local 1-second tick. Ignored outside `active`.
    pub fn handle_tick(&mut self) {
        let signals = match &mut self.phase {
            Phase::Active(active) => active.clock.tick(),
            _ => return,
        };
        self.process_signals(signals);
    }

    /// Periodic drift correction against the authoritative clock.
    /// Failures are logged and otherwise ignored; local ticking stays
    /// the source of truth until the next successful cycle.
    pub async fn reconcile(&mut self) {
        let token = match &self.phase {
            Phase::Active(active) => active.token.clone(),
            _ => return,
        };

        match self.collaborators.authority.status(&token).await {
            Ok(report) => {
                RECONCILE_TOTAL.with_label_values(&["success"]).inc();
                let signals = match &mut self.phase {
                    Phase::Active(active) => active.clock.apply_status(&report),
                    _ => return,
                };
                self.process_signals(signals);
            }
            Err(e) => {
                RECONCILE_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!("Clock reconciliation failed: {:#}", e);
            }
        }
    }

    /// Transition to `finished` and derive results exactly once.
    /// Idempotent; the token is dropped so no further authority calls
    /// are issued.
    pub fn finish(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Setup);
        match phase {
            Phase::Active(active) => {
                let results = scoring::score(&active.questions, &active.ledger);
                tracing::info!(
                    "Test finished: score={}/{}, correct={}, wrong={}, unattempted={}",
                    results.total_score,
                    results.possible_marks,
                    results.correct,
                    results.wrong,
                    results.unattempted
                );
                SESSIONS_TOTAL.with_label_values(&["finished"]).inc();
                SESSIONS_ACTIVE.dec();
                self.phase = Phase::Finished(FinishedSession {
                    questions: active.questions,
                    ledger: active.ledger,
                    results,
                });
            }
            other => self.phase = other,
        }
    }

    pub fn results(&self) -> Result<&TestResults, EngineError> {
        match &self.phase {
            Phase::Finished(finished) => Ok(&finished.results),
            _ => Err(EngineError::NotFinished),
        }
    }

    /// Hand the final score/total pair to the external rank estimator.
    pub async fn rank_estimate(&self) -> Result<RankEstimate, EngineError> {
        let results = self.results()?;
        self.collaborators
            .ranks
            .estimate(results.total_score, results.possible_marks)
            .await
            .map_err(EngineError::RankUnavailable)
    }

    /// Read model for presentation.
    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.phase {
            Phase::Setup => SessionSnapshot::empty(PhaseName::Setup),
            Phase::Active(active) => {
                let question = active.questions.get(active.current_index);
                SessionSnapshot {
                    phase: PhaseName::Active,
                    current_index: active.current_index,
                    question_count: active.questions.len(),
                    current_question: question.cloned(),
                    current_answer: question
                        .and_then(|q| active.ledger.answer(q.id))
                        .cloned(),
                    remaining_exam_seconds: active.clock.exam_remaining(),
                    remaining_question_seconds: active.clock.question_remaining(),
                }
            }
            Phase::Finished(finished) => SessionSnapshot {
                phase: PhaseName::Finished,
                current_index: 0,
                question_count: finished.questions.len(),
                current_question: None,
                current_answer: None,
                remaining_exam_seconds: 0,
                remaining_question_seconds: 0,
            },
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveSession, EngineError> {
        match &mut self.phase {
            Phase::Active(active) => Ok(active),
            _ => Err(EngineError::NotActive),
        }
    }

    /// One advance or finish per exhaustion event, never more. A
    /// finish consumes any remaining signals since the phase has left
    /// `active`.
    fn process_signals(&mut self, signals: Vec<ClockSignal>) {
        for signal in signals {
            if !self.is_active() {
                return;
            }
            match signal {
                ClockSignal::ExamExhausted => {
                    tracing::info!("Exam time exhausted, finishing session");
                    self.finish();
                }
                ClockSignal::QuestionTimeExhausted => {
                    tracing::debug!("Question time exhausted, auto-advancing");
                    // Cannot fail: the phase was checked above.
                    let _ = self.advance(true);
                }
            }
        }
    }

    /// Best-effort persistence of the advisory question index.
    /// Fire-and-forget: local navigation already succeeded.
    fn persist_index(&self, new_index: usize) {
        let token = match &self.phase {
            Phase::Active(active) => active.token.clone(),
            _ => return,
        };
        let authority = Arc::clone(&self.collaborators.authority);

        tokio::spawn(async move {
            if let Err(e) = authority.advance_index(&token, new_index).await {
                INDEX_PERSIST_FAILURES_TOTAL
                    .with_label_values(&["request_error"])
                    .inc();
                tracing::warn!(
                    "Failed to persist question index {} (will drift until next success): {:#}",
                    new_index,
                    e
                );
            }
        });
    }
}

enum Command {
    Start(TestConfig, oneshot::Sender<Result<(), EngineError>>),
    SelectOption {
        question_id: u32,
        value: AnswerValue,
        reply: oneshot::Sender<Result<RecordOutcome, EngineError>>,
    },
    ClearAnswer {
        question_id: u32,
        reply: oneshot::Sender<Result<Option<AnswerValue>, EngineError>>,
    },
    Key(
        KeyInput,
        oneshot::Sender<Result<Option<RecordOutcome>, EngineError>>,
    ),
    Advance(oneshot::Sender<Result<(), EngineError>>),
    Retreat(oneshot::Sender<Result<(), EngineError>>),
    Finish(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Results(oneshot::Sender<Result<TestResults, EngineError>>),
    RankEstimate(oneshot::Sender<Result<RankEstimate, EngineError>>),
}

/// Cloneable handle to the spawned engine task. Every trigger — timer
/// tick, reconciliation, user input — funnels through one mpsc queue,
/// so state mutations are serialized without locks.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Spawn the engine event loop on the current tokio runtime.
    pub fn spawn(config: Config, collaborators: Arc<Collaborators>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let engine = SessionEngine::new(config, collaborators);
        tokio::spawn(run_engine(engine, rx));
        Self { tx }
    }

    pub async fn start(&self, test_config: TestConfig) -> Result<(), EngineError> {
        self.request(|reply| Command::Start(test_config, reply))
            .await?
    }

    pub async fn select_option(
        &self,
        question_id: u32,
        value: AnswerValue,
    ) -> Result<RecordOutcome, EngineError> {
        self.request(|reply| Command::SelectOption {
            question_id,
            value,
            reply,
        })
        .await?
    }

    pub async fn clear_answer(
        &self,
        question_id: u32,
    ) -> Result<Option<AnswerValue>, EngineError> {
        self.request(|reply| Command::ClearAnswer { question_id, reply })
            .await?
    }

    pub async fn key(&self, key: KeyInput) -> Result<Option<RecordOutcome>, EngineError> {
        self.request(|reply| Command::Key(key, reply)).await?
    }

    pub async fn advance(&self) -> Result<(), EngineError> {
        self.request(Command::Advance).await?
    }

    pub async fn retreat(&self) -> Result<(), EngineError> {
        self.request(Command::Retreat).await?
    }

    pub async fn finish(&self) -> Result<(), EngineError> {
        self.request(Command::Finish).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, EngineError> {
        self.request(Command::Snapshot).await
    }

    pub async fn results(&self) -> Result<TestResults, EngineError> {
        self.request(Command::Results).await?
    }

    pub async fn rank_estimate(&self) -> Result<RankEstimate, EngineError> {
        self.request(Command::RankEstimate).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::Closed)?;
        reply_rx.await.map_err(|_| EngineError::Closed)
    }
}

/// Single-consumer event loop. The periodic branches are guarded on
/// the active phase and their intervals are reset when a session
/// starts, so no stray tick can mutate a `setup` or `finished`
/// session.
async fn run_engine(mut engine: SessionEngine, mut rx: mpsc::Receiver<Command>) {
    let mut tick = tokio::time::interval(engine.config.tick_interval());
    let mut sync = tokio::time::interval(engine.config.sync_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    sync.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            maybe_cmd = rx.recv() => {
                let Some(cmd) = maybe_cmd else {
                    tracing::debug!("Engine handle dropped, shutting down event loop");
                    break;
                };

                let started = handle_command(&mut engine, cmd).await;
                if started {
                    // First periodic ticks land one full period after
                    // the session begins.
                    tick.reset();
                    sync.reset();
                }
            }
            _ = tick.tick(), if engine.is_active() => {
                engine.handle_tick();
            }
            _ = sync.tick(), if engine.is_active() => {
                engine.reconcile().await;
            }
        }
    }
}

/// Returns true when the command transitioned the engine into the
/// active phase.
async fn handle_command(engine: &mut SessionEngine, cmd: Command) -> bool {
    match cmd {
        Command::Start(test_config, reply) => {
            let result = engine.start(test_config).await;
            let started = result.is_ok();
            let _ = reply.send(result);
            started
        }
        Command::SelectOption {
            question_id,
            value,
            reply,
        } => {
            let _ = reply.send(engine.select_option(question_id, value));
            false
        }
        Command::ClearAnswer { question_id, reply } => {
            let _ = reply.send(engine.clear_answer(question_id));
            false
        }
        Command::Key(key, reply) => {
            let _ = reply.send(engine.handle_key(key));
            false
        }
        Command::Advance(reply) => {
            let _ = reply.send(engine.advance(false));
            false
        }
        Command::Retreat(reply) => {
            let _ = reply.send(engine.retreat());
            false
        }
        Command::Finish(reply) => {
            engine.finish();
            let _ = reply.send(());
            false
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(engine.snapshot());
            false
        }
        Command::Results(reply) => {
            let _ = reply.send(engine.results().cloned());
            false
        }
        Command::RankEstimate(reply) => {
            let _ = reply.send(engine.rank_estimate().await);
            false
        }
    }
}
