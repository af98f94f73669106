#![allow(dead_code)]

use std::sync::Arc;

use finankids_core::models::{Activity, DragItem, Lesson, MatchPair};
use finankids_core::services::AppState;
use finankids_core::stores::InMemoryStore;
use finankids_core::Config;

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Config for tests: no auto-dismiss so notifications can be inspected.
pub fn test_config() -> Config {
    Config {
        dismiss_after_ms: 0,
        seed_catalog: false,
        ..Config::default()
    }
}

pub fn create_test_app() -> (AppState, Arc<InMemoryStore>) {
    init_test_tracing();
    AppState::in_memory(test_config())
}

pub fn choice(correct: &str) -> Activity {
    Activity::MultipleChoice {
        question: "Which jar is for saving?".into(),
        options: vec!["A".into(), "B".into(), "C".into()],
        correct_answer: correct.into(),
    }
}

/// One activity of every kind, in the order a typical lesson uses them.
pub fn budgeting_lesson() -> Lesson {
    Lesson {
        id: "budget-101".into(),
        title: "Your first budget".into(),
        category: "budgeting".into(),
        base_exp: 100,
        base_money: 50,
        activities: vec![
            Activity::Teaching {
                title: "Needs and wants".into(),
                body: "A budget splits money between what you need and what you want.".into(),
            },
            choice("B"),
            Activity::FillBlank {
                sentence: "Money you put aside is called ___.".into(),
                options: vec!["savings".into(), "debt".into()],
                correct_answer: "savings".into(),
            },
            Activity::Matching {
                pairs: vec![
                    MatchPair::new("Bread", "Need"),
                    MatchPair::new("Toy", "Want"),
                ],
            },
            Activity::DragPairs {
                items: vec![
                    DragItem {
                        label: "Rent".into(),
                        correct_token: "Need".into(),
                    },
                    DragItem {
                        label: "Candy".into(),
                        correct_token: "Want".into(),
                    },
                ],
                tokens: vec!["Need".into(), "Want".into()],
            },
            Activity::SentenceBuilder {
                parts: vec!["first".into(), "Save".into(), "spend".into(), "later".into()],
                correct_order: vec!["Save".into(), "first".into(), "spend".into(), "later".into()],
            },
        ],
    }
}
