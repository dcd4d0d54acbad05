//! The session orchestrator.
//!
//! One [`Session`] owns all mutable session state behind a single mutex
//! and drives at most one background run at a time: the join window,
//! then the question/score loop, then the end grace. Concurrent request
//! contexts (registration, answers, status reads, listener management)
//! reach that state only through the lock.
//!
//! Runs are cancellable. [`Session::reset`] cancels the run token and
//! bumps the run epoch; a superseded run notices at its next phase
//! boundary and abandons itself, so a reset mid-game can never corrupt
//! the state of the game that follows.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bank::{QuestionBank, QuestionPrompt, QuestionReport};
use crate::dispatch::{Channel, Dispatcher, Listener, ListenerHandle, SessionEvent};
use crate::roster::{Roster, Standing};
use crate::session::phase::Phase;
use crate::session::scoring;

/// Fixed pause between the final score fire and the end fire.
const END_GRACE: Duration = Duration::from_secs(2);

/// The timing/size quadruple a session runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Questions played per session (clamped to the bank size).
    pub total_questions: usize,
    /// Length of each answer window.
    pub question_time: Duration,
    /// Pause on the standings between questions.
    pub score_time: Duration,
    /// Length of the join window.
    pub register_wait_time: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            total_questions: 10,
            question_time: Duration::from_secs(30),
            score_time: Duration::from_secs(10),
            register_wait_time: Duration::from_secs(10),
        }
    }
}

/// A player's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    /// Identifier of the question being answered.
    pub question_id: String,
    /// The chosen option label.
    pub option: String,
}

/// Read-only snapshot served to status queries.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// Current phase.
    pub phase: Phase,
    /// Whole seconds left in the current timed window, floored at zero.
    pub remaining_secs: u64,
    /// 1-based number of the question in play, when one is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    /// Questions per session.
    pub total: usize,
    /// True while the join window is open.
    pub waiting: bool,
    /// True once the session is over.
    pub ended: bool,
}

/// The `{opened_at, duration}` pair published by every timed wait; the
/// basis of the remaining-time query.
#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: Instant,
    duration: Duration,
}

impl Window {
    fn closed(now: Instant) -> Self {
        Self {
            opened_at: now,
            duration: Duration::ZERO,
        }
    }

    fn remaining(&self, now: Instant) -> Duration {
        (self.opened_at + self.duration).saturating_duration_since(now)
    }
}

#[derive(Debug)]
struct SessionInner {
    phase: Phase,
    current: Option<usize>,
    window: Window,
    settings: SessionSettings,
    // bumped by reset; a run only mutates state while its epoch matches
    epoch: u64,
    run_cancel: Option<CancellationToken>,
}

/// The session orchestrator.
///
/// Construct with [`Session::new`] inside a tokio runtime, wrap in an
/// [`Arc`], and share it with every request context. All mutating
/// operations take `&self`.
pub struct Session {
    // std::sync::Mutex is intentional: held briefly for field access,
    // never across .await points.
    inner: Mutex<SessionInner>,
    roster: Roster,
    bank: QuestionBank,
    dispatcher: Dispatcher,
}

impl Session {
    /// Builds a session over `bank`. The requested question count is
    /// clamped to the bank size. Must be called inside a tokio runtime
    /// (the dispatcher spawns its graphic worker here).
    #[must_use]
    pub fn new(bank: QuestionBank, settings: SessionSettings) -> Self {
        let mut settings = settings;
        settings.total_questions = settings.total_questions.min(bank.len());
        Self {
            inner: Mutex::new(SessionInner {
                phase: Phase::New,
                current: None,
                window: Window::closed(Instant::now()),
                settings,
                epoch: 0,
                run_cancel: None,
            }),
            roster: Roster::new(),
            bank,
            dispatcher: Dispatcher::new(),
        }
    }

    // ========================================================================
    // Run control
    // ========================================================================

    /// Begins the session.
    ///
    /// No-op returning `false` unless the phase is `New`. The flip to
    /// `Register` happens under the state lock before the run task is
    /// spawned, so of any number of concurrent callers exactly one wins
    /// and exactly one run ever executes per session lifetime.
    pub fn start(self: &Arc<Self>) -> bool {
        let (epoch, cancel, settings) = {
            let mut inner = self.lock_inner();
            if inner.phase != Phase::New {
                return false;
            }
            inner.phase = Phase::Register;
            let cancel = CancellationToken::new();
            inner.run_cancel = Some(cancel.clone());
            (inner.epoch, cancel, inner.settings)
        };
        note_transition(Phase::New, Phase::Register);
        info!(
            total = settings.total_questions,
            register_wait = ?settings.register_wait_time,
            "session starting"
        );

        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.run(epoch, cancel, settings).await;
        });
        true
    }

    /// Ends whatever run is in flight and returns the session to `New`
    /// with `settings` installed.
    ///
    /// Cancels the run token and bumps the run epoch, empties the
    /// question, graphic, and wait listener channels (score and end
    /// subscriptions survive), clears the roster, zeroes question
    /// tallies up to the outgoing question count, reshuffles the bank,
    /// and clamps the new total to the bank size. Returns the settings
    /// as applied.
    pub fn reset(&self, settings: SessionSettings) -> SessionSettings {
        let (outgoing_total, applied) = {
            let mut inner = self.lock_inner();
            if let Some(cancel) = inner.run_cancel.take() {
                cancel.cancel();
            }
            inner.epoch += 1;
            let outgoing_total = inner.settings.total_questions;
            inner.phase = Phase::New;
            inner.current = None;
            inner.window = Window::closed(Instant::now());

            let mut applied = settings;
            applied.total_questions = applied.total_questions.min(self.bank.len());
            inner.settings = applied;
            (outgoing_total, applied)
        };

        self.dispatcher.clear_transient();
        self.roster.clear();
        self.bank.reset_tallies(outgoing_total);
        info!(total = applied.total_questions, "session reset");
        applied
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Read-only status snapshot from one lock acquisition.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let inner = self.lock_inner();
        SessionStatus {
            phase: inner.phase,
            remaining_secs: inner.window.remaining(Instant::now()).as_secs(),
            current: inner.current.map(|i| i + 1),
            total: inner.settings.total_questions,
            waiting: inner.phase == Phase::Register,
            ended: inner.phase.is_terminal(),
        }
    }

    /// Wall-clock time left in the current timed window, floored at
    /// zero. Recomputed on demand, never cached.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.lock_inner().window.remaining(Instant::now())
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock_inner().phase
    }

    /// True once the session is over.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.lock_inner().phase.is_terminal()
    }

    /// True only while the join window is open.
    #[must_use]
    pub fn waiting_for_players(&self) -> bool {
        self.lock_inner().phase == Phase::Register
    }

    /// Prompt of the question in play, or `None` outside the loop.
    #[must_use]
    pub fn current_question(&self) -> Option<QuestionPrompt> {
        let index = self.lock_inner().current?;
        self.bank.prompt(index)
    }

    /// The settings currently installed.
    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.lock_inner().settings
    }

    /// The question bank backing this session.
    #[must_use]
    pub const fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    // ========================================================================
    // Player operations
    // ========================================================================

    /// Registers a player; `false` when the nickname is taken. Callers
    /// gate on [`Session::waiting_for_players`] separately.
    pub fn register_player(&self, nickname: &str, avatar: Option<String>) -> bool {
        let accepted = self.roster.register(nickname, avatar);
        if accepted {
            counter!("quizroom_players_registered_total").increment(1);
            debug!(nickname, "player registered");
        } else {
            debug!(nickname, "nickname already taken");
        }
        accepted
    }

    /// Ranked standings, best first.
    #[must_use]
    pub fn standings(&self) -> Vec<Standing> {
        self.roster.standings()
    }

    /// Evaluates one answer submission.
    ///
    /// Silent no-op returning `None` when the player is unknown, no
    /// question is in play, the submitted question id does not match
    /// the active question (stale/late submission), or this player
    /// already had a submission consumed for the question. Otherwise
    /// the chosen option is tallied, a correct answer earns
    /// latency-weighted points, the graphic channel fires off the
    /// calling context, and the updated snapshot is returned.
    pub fn evaluate(&self, player: &str, submission: &AnswerSubmission) -> Option<QuestionReport> {
        if !self.roster.contains(player) {
            debug!(player, "submission from unknown player");
            counter!("quizroom_answers_total", "outcome" => "unknown_player").increment(1);
            return None;
        }

        // One locked read: the index and the timing window must come
        // from the same instant or a phase flip between them could
        // score an answer against the wrong window.
        let (index, remaining, question_time) = {
            let inner = self.lock_inner();
            (
                inner.current,
                inner.window.remaining(Instant::now()),
                inner.settings.question_time,
            )
        };
        let Some(index) = index else {
            debug!(player, "submission with no question in play");
            counter!("quizroom_answers_total", "outcome" => "stale").increment(1);
            return None;
        };

        if !self.bank.matches(index, &submission.question_id) {
            debug!(
                player,
                question = %submission.question_id,
                "stale submission for a question no longer in play"
            );
            counter!("quizroom_answers_total", "outcome" => "stale").increment(1);
            return None;
        }
        if !self.roster.mark_answered(player, &submission.question_id) {
            debug!(player, question = %submission.question_id, "repeat submission ignored");
            counter!("quizroom_answers_total", "outcome" => "repeat").increment(1);
            return None;
        }

        let record = self
            .bank
            .record_answer(index, &submission.question_id, &submission.option)?;
        if record.correct {
            let points = scoring::award(remaining, question_time);
            self.roster.award(player, points);
            debug!(player, points, "correct answer");
            counter!("quizroom_answers_total", "outcome" => "correct").increment(1);
        } else {
            debug!(player, "wrong answer");
            counter!("quizroom_answers_total", "outcome" => "wrong").increment(1);
        }

        self.dispatcher.enqueue_graphic(record.report.clone());
        Some(record.report)
    }

    // ========================================================================
    // Listener operations
    // ========================================================================

    /// Registers a listener on a channel; `None` when this exact
    /// callback is already registered there.
    pub fn listen(&self, callback: Listener, channel: Channel) -> Option<ListenerHandle> {
        self.dispatcher.register(callback, channel)
    }

    /// Removes a listener registration.
    pub fn unlisten(&self, handle: &ListenerHandle) -> bool {
        self.dispatcher.unregister(handle)
    }

    // ========================================================================
    // The background run
    // ========================================================================

    async fn run(self: Arc<Self>, epoch: u64, cancel: CancellationToken, settings: SessionSettings) {
        let SessionSettings {
            total_questions,
            question_time,
            score_time,
            register_wait_time,
        } = settings;

        // join window (the flip to Register already happened in start)
        if !self
            .wait_window(epoch, &cancel, register_wait_time, true)
            .await
        {
            return;
        }
        if !self.transition(epoch, Phase::Running) {
            return;
        }

        for round in 0..total_questions {
            let Some(index) = self.enter_question(epoch) else {
                return;
            };
            if let Some(prompt) = self.bank.prompt(index) {
                self.dispatcher.fire(
                    Channel::Question,
                    &SessionEvent::Question {
                        question: prompt,
                        seconds: question_time.as_secs(),
                    },
                );
            } else {
                warn!(index, "no question at the active index; nothing fired");
            }

            if !self.wait_window(epoch, &cancel, question_time, true).await {
                return;
            }
            if !self.transition(epoch, Phase::Running) {
                return;
            }
            self.fire_score(epoch);

            // the score pause is skipped after the last question
            if round + 1 < total_questions
                && !self.wait_window(epoch, &cancel, score_time, false).await
            {
                return;
            }
        }

        if !self.transition(epoch, Phase::End) {
            return;
        }
        self.fire_score(epoch);
        if !self.wait_window(epoch, &cancel, END_GRACE, true).await {
            return;
        }
        self.dispatcher.fire(Channel::End, &SessionEvent::End);
        info!("session finished");
    }

    /// Advances the question index and enters the question phase.
    ///
    /// Returns the new index, or `None` when this run was superseded or
    /// the advance would run past the session's question count. The
    /// loop bound in [`Session::run`] keeps the latter branch
    /// unreachable; if it ever fires the session closes out instead of
    /// reading past the bank.
    fn enter_question(&self, epoch: u64) -> Option<usize> {
        let mut inner = self.lock_inner();
        if inner.epoch != epoch {
            return None;
        }

        let next = match inner.current {
            None => Some(0),
            Some(i) if i + 1 < inner.settings.total_questions => Some(i + 1),
            Some(_) => None,
        };
        match next {
            Some(index) => {
                let from = inner.phase;
                inner.current = Some(index);
                inner.phase = Phase::Question;
                drop(inner);
                note_transition(from, Phase::Question);
                Some(index)
            }
            None => {
                warn!(
                    current = ?inner.current,
                    total = inner.settings.total_questions,
                    "question advance past the end; forcing the session closed"
                );
                let from = inner.phase;
                inner.phase = Phase::End;
                drop(inner);
                note_transition(from, Phase::End);
                None
            }
        }
    }

    /// Fires the score channel with the ranked standings and progress.
    fn fire_score(&self, epoch: u64) {
        let (current, total, phase) = {
            let inner = self.lock_inner();
            if inner.epoch != epoch {
                return;
            }
            (
                inner.current.map_or(0, |i| i + 1),
                inner.settings.total_questions,
                inner.phase,
            )
        };
        let standings = self.roster.standings();
        self.dispatcher.fire(
            Channel::Score,
            &SessionEvent::Score {
                standings,
                current,
                total,
                phase,
            },
        );
    }

    /// Sets the phase, fenced by the run epoch.
    fn transition(&self, epoch: u64, to: Phase) -> bool {
        let mut inner = self.lock_inner();
        if inner.epoch != epoch {
            return false;
        }
        let from = inner.phase;
        inner.phase = to;
        drop(inner);
        note_transition(from, to);
        true
    }

    /// Publishes a timing window, then sleeps `duration` racing the run
    /// token. Returns `false` when cancelled or superseded.
    ///
    /// With `advertised` false the window is published with zero length:
    /// the pause still takes its full time, but `remaining` reads 0
    /// throughout. The score display pauses this way, so a late answer
    /// to the still-current question tallies without scoring.
    async fn wait_window(
        &self,
        epoch: u64,
        cancel: &CancellationToken,
        duration: Duration,
        advertised: bool,
    ) -> bool {
        {
            let mut inner = self.lock_inner();
            if inner.epoch != epoch {
                return false;
            }
            inner.window = Window {
                opened_at: Instant::now(),
                duration: if advertised { duration } else { Duration::ZERO },
            };
        }

        tokio::select! {
            () = cancel.cancelled() => {
                info!("session run cancelled");
                false
            }
            () = tokio::time::sleep(duration) => true,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session state lock poisoned")
    }
}

fn note_transition(from: Phase, to: Phase) {
    debug!(from = from.as_str(), to = to.as_str(), "phase transition");
    counter!("quizroom_phase_transitions_total", "phase" => to.as_str()).increment(1);
}
