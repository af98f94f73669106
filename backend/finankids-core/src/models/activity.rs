use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::ValidationError;

/// A left/right pair of a matching exercise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

impl MatchPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// One draggable row: the label shown on the left and the token that belongs in its slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragItem {
    pub label: String,
    pub correct_token: String,
}

/// One gradable step of a lesson, as stored in the `lessons` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activity {
    Teaching {
        title: String,
        body: String,
    },
    MultipleChoice {
        question: String,
        options: Vec<String>,
        correct_answer: String,
    },
    FillBlank {
        /// Sentence with a `___` marker where the answer goes
        sentence: String,
        options: Vec<String>,
        correct_answer: String,
    },
    Matching {
        pairs: Vec<MatchPair>,
    },
    DragPairs {
        items: Vec<DragItem>,
        tokens: Vec<String>,
    },
    SentenceBuilder {
        parts: Vec<String>,
        correct_order: Vec<String>,
    },
}

/// Payload-free activity label used for logging and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Teaching,
    MultipleChoice,
    FillBlank,
    Matching,
    DragPairs,
    SentenceBuilder,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Teaching => "teaching",
            ActivityKind::MultipleChoice => "multiple_choice",
            ActivityKind::FillBlank => "fill_blank",
            ActivityKind::Matching => "matching",
            ActivityKind::DragPairs => "drag_pairs",
            ActivityKind::SentenceBuilder => "sentence_builder",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match self {
            Activity::Teaching { .. } => ActivityKind::Teaching,
            Activity::MultipleChoice { .. } => ActivityKind::MultipleChoice,
            Activity::FillBlank { .. } => ActivityKind::FillBlank,
            Activity::Matching { .. } => ActivityKind::Matching,
            Activity::DragPairs { .. } => ActivityKind::DragPairs,
            Activity::SentenceBuilder { .. } => ActivityKind::SentenceBuilder,
        }
    }

    /// Checks that the payload can actually be answered.
    ///
    /// Used by the lesson document validation before a lesson reaches the engine.
    pub fn check(&self) -> Result<(), ValidationError> {
        match self {
            Activity::Teaching { title, .. } => {
                if title.trim().is_empty() {
                    return Err(invalid("teaching_title", "Teaching title must not be empty"));
                }
            }
            Activity::MultipleChoice {
                options,
                correct_answer,
                ..
            }
            | Activity::FillBlank {
                options,
                correct_answer,
                ..
            } => {
                if options.len() < 2 {
                    return Err(invalid("options", "At least two options are required"));
                }
                if !options.contains(correct_answer) {
                    return Err(invalid(
                        "correct_answer",
                        "Correct answer must be one of the options",
                    ));
                }
            }
            Activity::Matching { pairs } => {
                if pairs.is_empty() {
                    return Err(invalid("pairs", "Matching requires at least one pair"));
                }
                let lefts: HashSet<&str> = pairs.iter().map(|p| p.left.as_str()).collect();
                let rights: HashSet<&str> = pairs.iter().map(|p| p.right.as_str()).collect();
                if lefts.len() != pairs.len() || rights.len() != pairs.len() {
                    return Err(invalid("pairs", "Matching sides must not repeat"));
                }
            }
            Activity::DragPairs { items, tokens } => {
                if items.is_empty() {
                    return Err(invalid("items", "Drag pairs require at least one item"));
                }
                if let Some(item) = items.iter().find(|i| !tokens.contains(&i.correct_token)) {
                    return Err(invalid_owned(
                        "tokens",
                        format!("Token '{}' is missing from the token bank", item.correct_token),
                    ));
                }
            }
            Activity::SentenceBuilder {
                parts,
                correct_order,
            } => {
                if correct_order.is_empty() {
                    return Err(invalid("correct_order", "Correct order must not be empty"));
                }
                if let Some(word) = correct_order.iter().find(|w| !parts.contains(w)) {
                    return Err(invalid_owned(
                        "parts",
                        format!("Word '{}' is missing from the sentence parts", word),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn invalid_owned(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}
