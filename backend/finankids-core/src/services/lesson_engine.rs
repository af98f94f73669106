//! Lesson session state machine.
//!
//! [`reduce`] is the pure transition function `(session, action) -> session`;
//! [`LessonEngine`] owns one session, applies actions through it, publishes
//! every snapshot on a `watch` channel and fires the lesson callbacks.
//!
//! ```text
//! InProgress(index, lives, errors) --lives == 0--> Locked --Restart--> InProgress(0, 5, 0)
//! InProgress --Continue past last activity--> Completed
//! ```

use std::collections::HashSet;

use thiserror::Error;
use tokio::sync::watch;

use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, LESSONS_FINISHED_TOTAL};
use crate::models::activity::{Activity, MatchPair};
use crate::services::reward::{LessonReward, RewardPolicy};

pub const INITIAL_LIVES: u8 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LessonError {
    #[error("lesson has no activities")]
    EmptyLesson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    InProgress,
    /// Out of lives; only a restart leaves this state
    Locked,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Incorrect,
}

/// Transient answer state of the current activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Teaching,
    Choice(Option<String>),
    Matches(Vec<MatchPair>),
    Placements(Vec<Option<String>>),
    Words(Vec<Option<String>>),
}

impl Selection {
    pub fn empty_for(activity: &Activity) -> Self {
        match activity {
            Activity::Teaching { .. } => Selection::Teaching,
            Activity::MultipleChoice { .. } | Activity::FillBlank { .. } => Selection::Choice(None),
            Activity::Matching { .. } => Selection::Matches(Vec::new()),
            Activity::DragPairs { items, .. } => Selection::Placements(vec![None; items.len()]),
            Activity::SentenceBuilder { correct_order, .. } => {
                Selection::Words(vec![None; correct_order.len()])
            }
        }
    }
}

/// Immutable snapshot of one lesson attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSession {
    pub index: usize,
    pub lives: u8,
    pub errors: u32,
    pub status: SessionStatus,
    pub feedback: Option<Feedback>,
    pub selection: Selection,
    /// Set once the session completes
    pub reward: Option<LessonReward>,
}

impl LessonSession {
    /// Fresh session positioned on the first activity.
    pub fn start(activities: &[Activity]) -> Self {
        Self {
            index: 0,
            lives: INITIAL_LIVES,
            errors: 0,
            status: SessionStatus::InProgress,
            feedback: None,
            selection: activities
                .first()
                .map(Selection::empty_for)
                .unwrap_or(Selection::Teaching),
            reward: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == SessionStatus::Locked
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonAction {
    /// Multiple choice and fill-in-the-blank answer
    SelectAnswer(String),
    /// Pairs a left item with a right item, or unpairs it when already matched
    ToggleMatch(MatchPair),
    PlaceToken { slot: usize, token: String },
    PlaceWord { slot: usize, word: String },
    /// Empties a drag or sentence slot
    ClearSlot { slot: usize },
    Submit,
    Continue,
    Restart,
}

/// What a transition did, used by the engine to pick side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    SelectionChanged,
    Answered { correct: bool },
    Advanced,
    Locked,
    Completed(LessonReward),
    Restarted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: LessonSession,
    pub outcome: Outcome,
}

impl Transition {
    fn ignored(session: LessonSession) -> Self {
        Self {
            session,
            outcome: Outcome::Ignored,
        }
    }
}

/// Checks the current selection against the activity's expected answer.
pub fn validate(activity: &Activity, selection: &Selection) -> bool {
    match (activity, selection) {
        (Activity::Teaching { .. }, _) => true,
        (
            Activity::MultipleChoice { correct_answer, .. }
            | Activity::FillBlank { correct_answer, .. },
            Selection::Choice(selected),
        ) => selected.as_deref() == Some(correct_answer.as_str()),
        (Activity::Matching { pairs }, Selection::Matches(matched)) => {
            let required: HashSet<&MatchPair> = pairs.iter().collect();
            let submitted: HashSet<&MatchPair> = matched.iter().collect();
            submitted.len() == matched.len() && submitted == required
        }
        (Activity::DragPairs { items, .. }, Selection::Placements(placed)) => {
            placed.len() == items.len()
                && items
                    .iter()
                    .zip(placed)
                    .all(|(item, token)| token.as_deref() == Some(item.correct_token.as_str()))
        }
        (Activity::SentenceBuilder { correct_order, .. }, Selection::Words(slots)) => {
            slots.len() == correct_order.len()
                && slots
                    .iter()
                    .zip(correct_order)
                    .all(|(slot, word)| slot.as_deref() == Some(word.as_str()))
        }
        _ => false,
    }
}

fn apply_selection(selection: &Selection, action: LessonAction) -> Option<Selection> {
    match (selection, action) {
        (Selection::Choice(_), LessonAction::SelectAnswer(answer)) => {
            Some(Selection::Choice(Some(answer)))
        }
        (Selection::Matches(matched), LessonAction::ToggleMatch(pair)) => {
            let mut matched = matched.clone();
            if let Some(pos) = matched.iter().position(|p| *p == pair) {
                matched.remove(pos);
            } else {
                matched.retain(|p| p.left != pair.left && p.right != pair.right);
                matched.push(pair);
            }
            Some(Selection::Matches(matched))
        }
        (Selection::Placements(placed), LessonAction::PlaceToken { slot, token }) => {
            fill_slot(placed, slot, Some(token)).map(Selection::Placements)
        }
        (Selection::Placements(placed), LessonAction::ClearSlot { slot }) => {
            fill_slot(placed, slot, None).map(Selection::Placements)
        }
        (Selection::Words(slots), LessonAction::PlaceWord { slot, word }) => {
            fill_slot(slots, slot, Some(word)).map(Selection::Words)
        }
        (Selection::Words(slots), LessonAction::ClearSlot { slot }) => {
            fill_slot(slots, slot, None).map(Selection::Words)
        }
        _ => None,
    }
}

fn fill_slot(
    slots: &[Option<String>],
    slot: usize,
    value: Option<String>,
) -> Option<Vec<Option<String>>> {
    if slot >= slots.len() {
        return None;
    }
    let mut slots = slots.to_vec();
    slots[slot] = value;
    Some(slots)
}

fn advance(activities: &[Activity], rewards: &RewardPolicy, mut session: LessonSession) -> Transition {
    session.index += 1;
    session.feedback = None;

    match activities.get(session.index) {
        Some(next) => {
            session.selection = Selection::empty_for(next);
            Transition {
                session,
                outcome: Outcome::Advanced,
            }
        }
        None => {
            let reward = rewards.compute(activities.len(), session.errors);
            session.status = SessionStatus::Completed;
            session.reward = Some(reward);
            Transition {
                session,
                outcome: Outcome::Completed(reward),
            }
        }
    }
}

/// Pure transition function of a lesson session.
pub fn reduce(
    activities: &[Activity],
    rewards: &RewardPolicy,
    session: LessonSession,
    action: LessonAction,
) -> Transition {
    if action == LessonAction::Restart {
        return Transition {
            session: LessonSession::start(activities),
            outcome: Outcome::Restarted,
        };
    }

    if session.status != SessionStatus::InProgress {
        return Transition::ignored(session);
    }

    let Some(activity) = activities.get(session.index) else {
        return Transition::ignored(session);
    };
    let teaching = matches!(activity, Activity::Teaching { .. });
    let awaiting_continue = session.feedback == Some(Feedback::Correct);

    match action {
        LessonAction::Submit | LessonAction::Continue if teaching => {
            advance(activities, rewards, session)
        }
        LessonAction::Continue if awaiting_continue => advance(activities, rewards, session),
        LessonAction::Continue => Transition::ignored(session),
        LessonAction::Submit if awaiting_continue => Transition::ignored(session),
        LessonAction::Submit => {
            let mut session = session;
            if validate(activity, &session.selection) {
                session.feedback = Some(Feedback::Correct);
                return Transition {
                    session,
                    outcome: Outcome::Answered { correct: true },
                };
            }

            session.lives = session.lives.saturating_sub(1);
            session.errors += 1;
            session.selection = Selection::empty_for(activity);

            if session.lives == 0 {
                session.status = SessionStatus::Locked;
                session.feedback = None;
                Transition {
                    session,
                    outcome: Outcome::Locked,
                }
            } else {
                session.feedback = Some(Feedback::Incorrect);
                Transition {
                    session,
                    outcome: Outcome::Answered { correct: false },
                }
            }
        }
        _ if awaiting_continue => Transition::ignored(session),
        action => match apply_selection(&session.selection, action) {
            Some(selection) => Transition {
                session: LessonSession {
                    selection,
                    feedback: None,
                    ..session
                },
                outcome: Outcome::SelectionChanged,
            },
            None => Transition::ignored(session),
        },
    }
}

pub type ExitCallback = Box<dyn FnMut() + Send>;
pub type CompleteCallback = Box<dyn FnMut(LessonReward) + Send>;

/// Hooks the presentation layer passes in when a lesson starts.
pub struct LessonCallbacks {
    pub on_exit: ExitCallback,
    pub on_complete: CompleteCallback,
}

impl LessonCallbacks {
    pub fn new<E, C>(on_exit: E, on_complete: C) -> Self
    where
        E: FnMut() + Send + 'static,
        C: FnMut(LessonReward) + Send + 'static,
    {
        Self {
            on_exit: Box::new(on_exit),
            on_complete: Box::new(on_complete),
        }
    }

    pub fn noop() -> Self {
        Self::new(|| {}, |_| {})
    }
}

pub struct LessonEngine {
    activities: Vec<Activity>,
    rewards: RewardPolicy,
    callbacks: LessonCallbacks,
    state: watch::Sender<LessonSession>,
}

impl LessonEngine {
    pub fn new(
        activities: Vec<Activity>,
        rewards: RewardPolicy,
        callbacks: LessonCallbacks,
    ) -> Result<Self, LessonError> {
        if activities.is_empty() {
            return Err(LessonError::EmptyLesson);
        }

        let (state, _) = watch::channel(LessonSession::start(&activities));
        Ok(Self {
            activities,
            rewards,
            callbacks,
            state,
        })
    }

    pub fn session(&self) -> LessonSession {
        self.state.borrow().clone()
    }

    /// Receives a snapshot after every applied action.
    pub fn subscribe(&self) -> watch::Receiver<LessonSession> {
        self.state.subscribe()
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn current_activity(&self) -> Option<&Activity> {
        let index = self.state.borrow().index;
        self.activities.get(index)
    }

    pub fn dispatch(&mut self, action: LessonAction) -> Outcome {
        let current = self.session();
        let kind = self.activities.get(current.index).map(Activity::kind);
        let Transition { session, outcome } =
            reduce(&self.activities, &self.rewards, current, action);

        if outcome == Outcome::Ignored {
            tracing::debug!(index = session.index, status = ?session.status, "Lesson action ignored");
            return outcome;
        }

        let lives = session.lives;
        let errors = session.errors;
        self.state.send_replace(session);

        match &outcome {
            Outcome::Answered { correct } => {
                let kind = kind.map(|k| k.as_str()).unwrap_or("unknown");
                ANSWERS_SUBMITTED_TOTAL
                    .with_label_values(&[kind, if *correct { "true" } else { "false" }])
                    .inc();
                tracing::debug!(activity = kind, correct, lives, errors, "Answer checked");
            }
            Outcome::Locked => {
                ANSWERS_SUBMITTED_TOTAL
                    .with_label_values(&[kind.map(|k| k.as_str()).unwrap_or("unknown"), "false"])
                    .inc();
                LESSONS_FINISHED_TOTAL.with_label_values(&["locked"]).inc();
                tracing::info!(errors, "Lesson locked, no lives left");
            }
            Outcome::Completed(reward) => {
                let label = if reward.perfect { "perfect" } else { "completed" };
                LESSONS_FINISHED_TOTAL.with_label_values(&[label]).inc();
                tracing::info!(
                    exp = reward.exp,
                    money = reward.money,
                    errors = reward.errors,
                    perfect = reward.perfect,
                    "Lesson completed"
                );
                (self.callbacks.on_complete)(*reward);
            }
            Outcome::Restarted => tracing::info!("Lesson restarted"),
            Outcome::Advanced | Outcome::SelectionChanged | Outcome::Ignored => {}
        }

        outcome
    }

    pub fn select_answer(&mut self, answer: impl Into<String>) -> Outcome {
        self.dispatch(LessonAction::SelectAnswer(answer.into()))
    }

    pub fn toggle_match(&mut self, left: impl Into<String>, right: impl Into<String>) -> Outcome {
        self.dispatch(LessonAction::ToggleMatch(MatchPair::new(left, right)))
    }

    pub fn place_token(&mut self, slot: usize, token: impl Into<String>) -> Outcome {
        self.dispatch(LessonAction::PlaceToken {
            slot,
            token: token.into(),
        })
    }

    pub fn place_word(&mut self, slot: usize, word: impl Into<String>) -> Outcome {
        self.dispatch(LessonAction::PlaceWord {
            slot,
            word: word.into(),
        })
    }

    pub fn clear_slot(&mut self, slot: usize) -> Outcome {
        self.dispatch(LessonAction::ClearSlot { slot })
    }

    pub fn submit(&mut self) -> Outcome {
        self.dispatch(LessonAction::Submit)
    }

    pub fn continue_lesson(&mut self) -> Outcome {
        self.dispatch(LessonAction::Continue)
    }

    pub fn restart(&mut self) -> Outcome {
        self.dispatch(LessonAction::Restart)
    }

    /// Leaves the lesson without completing it.
    pub fn exit(&mut self) {
        if !self.state.borrow().is_completed() {
            LESSONS_FINISHED_TOTAL.with_label_values(&["exited"]).inc();
        }
        tracing::info!(index = self.state.borrow().index, "Lesson exited");
        (self.callbacks.on_exit)();
    }
}
