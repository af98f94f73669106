use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::AchievementTrigger;
use crate::services::event_bus::TriggerEmitter;
use crate::services::lesson_engine::{LessonCallbacks, LessonEngine, LessonError};
use crate::services::reward::{LessonReward, PerfectBonus, RewardPolicy};
use crate::stores::{LessonStore, StoreError};

#[derive(Debug, Error)]
pub enum LessonServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lesson(#[from] LessonError),
}

/// Sent to the caller's sink when a lesson is finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedLesson {
    pub user_id: String,
    pub lesson_id: String,
    pub category: String,
    pub reward: LessonReward,
}

/// Starts lessons stored in a [`LessonStore`] and wires their completion into the achievement bus.
#[derive(Clone)]
pub struct LessonService {
    store: Arc<dyn LessonStore>,
    emitter: TriggerEmitter,
    bonus: PerfectBonus,
}

impl LessonService {
    pub fn new(store: Arc<dyn LessonStore>, emitter: TriggerEmitter, bonus: PerfectBonus) -> Self {
        Self {
            store,
            emitter,
            bonus,
        }
    }

    /// `completed_before` is how many lessons the user had finished before this one.
    pub async fn start<E>(
        &self,
        user_id: &str,
        lesson_id: &str,
        completed_before: u32,
        on_exit: E,
        completions: mpsc::UnboundedSender<CompletedLesson>,
    ) -> Result<LessonEngine, LessonServiceError>
    where
        E: FnMut() + Send + 'static,
    {
        let lesson = self.store.lesson(lesson_id).await?;
        let rewards = RewardPolicy::new(lesson.base_exp, lesson.base_money).with_bonus(self.bonus);

        let emitter = self.emitter.clone();
        let user = user_id.to_string();
        let id = lesson.id.clone();
        let category = lesson.category.clone();
        let mut total_completed = completed_before;

        let on_complete = move |reward: LessonReward| {
            total_completed = total_completed.saturating_add(1);
            emitter.emit(AchievementTrigger::LessonCompleted {
                user_id: user.clone(),
                lesson_id: id.clone(),
                category: category.clone(),
                perfect: reward.perfect,
                total_completed,
            });

            let completed = CompletedLesson {
                user_id: user.clone(),
                lesson_id: id.clone(),
                category: category.clone(),
                reward,
            };
            if completions.send(completed).is_err() {
                tracing::warn!(user_id = %user, lesson_id = %id, "Lesson completion sink closed");
            }
        };

        tracing::info!(
            user_id,
            lesson_id,
            activities = lesson.activities.len(),
            "Lesson started"
        );
        let engine = LessonEngine::new(
            lesson.activities,
            rewards,
            LessonCallbacks::new(on_exit, on_complete),
        )?;
        Ok(engine)
    }
}
