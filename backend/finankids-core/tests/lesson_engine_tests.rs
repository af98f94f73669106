mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use finankids_core::services::lesson_engine::{
    reduce, Feedback, LessonAction, LessonCallbacks, LessonEngine, LessonSession, Outcome,
    SessionStatus, INITIAL_LIVES,
};
use finankids_core::services::reward::{LessonReward, RewardPolicy};
use proptest::prelude::*;

use common::{budgeting_lesson, choice, init_test_tracing};

fn engine_for(activities: Vec<finankids_core::models::Activity>) -> LessonEngine {
    LessonEngine::new(activities, RewardPolicy::new(100, 50), LessonCallbacks::noop()).unwrap()
}

#[test]
fn four_wrong_answers_then_right_leaves_one_life() {
    init_test_tracing();
    let mut engine = engine_for(vec![choice("B")]);

    for _ in 0..4 {
        engine.select_answer("A");
        assert_eq!(engine.submit(), Outcome::Answered { correct: false });
    }
    engine.select_answer("B");
    assert_eq!(engine.submit(), Outcome::Answered { correct: true });

    let session = engine.session();
    assert_eq!(session.lives, 1);
    assert_eq!(session.errors, 4);
    assert!(!session.is_locked());
    assert_eq!(session.feedback, Some(Feedback::Correct));
}

#[test]
fn perfect_run_through_every_activity_kind() {
    let rewards = Arc::new(Mutex::new(Vec::<LessonReward>::new()));
    let sink = rewards.clone();
    let mut engine = LessonEngine::new(
        budgeting_lesson().activities,
        RewardPolicy::new(100, 50),
        LessonCallbacks::new(
            || {},
            move |reward| sink.lock().unwrap().push(reward),
        ),
    )
    .unwrap();

    assert_eq!(engine.continue_lesson(), Outcome::Advanced);

    engine.select_answer("B");
    assert_eq!(engine.submit(), Outcome::Answered { correct: true });
    assert_eq!(engine.continue_lesson(), Outcome::Advanced);

    engine.select_answer("savings");
    engine.submit();
    engine.continue_lesson();

    engine.toggle_match("Bread", "Need");
    engine.toggle_match("Toy", "Want");
    assert_eq!(engine.submit(), Outcome::Answered { correct: true });
    engine.continue_lesson();

    engine.place_token(0, "Need");
    engine.place_token(1, "Want");
    assert_eq!(engine.submit(), Outcome::Answered { correct: true });
    engine.continue_lesson();

    for (slot, word) in ["Save", "first", "spend", "later"].iter().enumerate() {
        engine.place_word(slot, *word);
    }
    assert_eq!(engine.submit(), Outcome::Answered { correct: true });

    let expected = LessonReward {
        exp: 120,
        money: 60,
        errors: 0,
        perfect: true,
    };
    assert_eq!(engine.continue_lesson(), Outcome::Completed(expected));
    assert!(engine.session().is_completed());
    assert_eq!(*rewards.lock().unwrap(), vec![expected]);
}

#[test]
fn wrong_matching_costs_a_life_and_clears_pairs() {
    let mut engine = engine_for(budgeting_lesson().activities.split_off(3));

    engine.toggle_match("Bread", "Want");
    engine.toggle_match("Toy", "Need");
    assert_eq!(engine.submit(), Outcome::Answered { correct: false });

    let session = engine.session();
    assert_eq!(session.lives, INITIAL_LIVES - 1);
    assert_eq!(
        session.selection,
        finankids_core::services::lesson_engine::Selection::Matches(Vec::new())
    );
}

#[test]
fn locked_lesson_ignores_everything_but_restart() {
    let mut engine = engine_for(vec![choice("B"), choice("C")]);
    for _ in 0..INITIAL_LIVES {
        engine.select_answer("A");
        engine.submit();
    }

    assert!(engine.session().is_locked());
    assert_eq!(engine.select_answer("B"), Outcome::Ignored);
    assert_eq!(engine.submit(), Outcome::Ignored);
    assert_eq!(engine.continue_lesson(), Outcome::Ignored);

    assert_eq!(engine.restart(), Outcome::Restarted);
    let session = engine.session();
    assert_eq!(session.index, 0);
    assert_eq!(session.lives, INITIAL_LIVES);
    assert_eq!(session.errors, 0);
    assert_eq!(session.status, SessionStatus::InProgress);
}

#[test]
fn exit_runs_the_exit_callback() {
    let exits = Arc::new(AtomicU32::new(0));
    let counter = exits.clone();
    let mut engine = LessonEngine::new(
        vec![choice("B")],
        RewardPolicy::new(10, 5),
        LessonCallbacks::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        ),
    )
    .unwrap();

    engine.exit();
    assert_eq!(exits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subscribers_see_each_snapshot() {
    let mut engine = engine_for(vec![choice("B")]);
    let mut snapshots = engine.subscribe();

    engine.select_answer("A");
    engine.submit();

    snapshots.changed().await.unwrap();
    let seen = snapshots.borrow_and_update().clone();
    assert_eq!(seen.lives, INITIAL_LIVES - 1);
    assert_eq!(seen.feedback, Some(Feedback::Incorrect));
}

fn any_action() -> impl Strategy<Value = LessonAction> {
    prop_oneof![
        prop_oneof![Just("A"), Just("B"), Just("C")]
            .prop_map(|answer| LessonAction::SelectAnswer(answer.to_string())),
        Just(LessonAction::Submit),
        Just(LessonAction::Continue),
    ]
}

proptest! {
    #[test]
    fn lives_drop_by_one_per_wrong_answer(wrong in 0usize..12) {
        let activities = vec![choice("B"), choice("C")];
        let rewards = RewardPolicy::new(100, 50);
        let mut session = LessonSession::start(&activities);

        for _ in 0..wrong {
            let before = session.lives;
            session = reduce(&activities, &rewards, session, LessonAction::SelectAnswer("A".into())).session;
            session = reduce(&activities, &rewards, session, LessonAction::Submit).session;
            prop_assert_eq!(session.lives, before.saturating_sub(1));
            prop_assert_eq!(session.is_locked(), session.lives == 0);
        }
        prop_assert_eq!(usize::from(session.lives), usize::from(INITIAL_LIVES).saturating_sub(wrong));
    }

    #[test]
    fn restart_always_gives_a_fresh_session(actions in prop::collection::vec(any_action(), 0..30)) {
        let activities = vec![choice("B"), choice("C"), choice("A")];
        let rewards = RewardPolicy::new(100, 50);
        let mut session = LessonSession::start(&activities);

        for action in actions {
            session = reduce(&activities, &rewards, session, action).session;
        }
        let restarted = reduce(&activities, &rewards, session, LessonAction::Restart).session;
        prop_assert_eq!(restarted, LessonSession::start(&activities));
    }
}
