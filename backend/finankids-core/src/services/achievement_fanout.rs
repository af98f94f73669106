//! Translates achievement triggers into progress updates.
//!
//! [`plan`] maps one trigger to its independent store operations;
//! [`AchievementFanout::run`] consumes the bus one trigger at a time and
//! applies each plan in order. Operations of one trigger are not atomic:
//! a failure is recorded and the remaining operations still run.

use std::sync::Arc;

use crate::metrics::ACHIEVEMENT_TRIGGERS_TOTAL;
use crate::models::achievement::{ids, LEVEL_MILESTONES, STREAK_MILESTONES};
use crate::models::AchievementTrigger;
use crate::services::achievement_service::{AchievementError, AchievementService};
use crate::services::event_bus::TriggerReceiver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Increment { achievement_id: String, amount: u32 },
    Unlock { achievement_id: String },
    /// Increment only when the catalog has this achievement
    IncrementIfDefined { achievement_id: String, amount: u32 },
}

impl Operation {
    fn increment(achievement_id: &str, amount: u32) -> Self {
        Operation::Increment {
            achievement_id: achievement_id.to_string(),
            amount,
        }
    }

    fn unlock(achievement_id: &str) -> Self {
        Operation::Unlock {
            achievement_id: achievement_id.to_string(),
        }
    }

    pub fn achievement_id(&self) -> &str {
        match self {
            Operation::Increment { achievement_id, .. }
            | Operation::Unlock { achievement_id }
            | Operation::IncrementIfDefined { achievement_id, .. } => achievement_id,
        }
    }
}

/// Operations a trigger fans out to, in the order they are applied.
pub fn plan(trigger: &AchievementTrigger) -> Vec<Operation> {
    match trigger {
        AchievementTrigger::LessonCompleted {
            category,
            perfect,
            total_completed,
            ..
        } => {
            let mut ops = vec![
                Operation::increment(ids::LESSONS_5, 1),
                Operation::increment(ids::LESSONS_25, 1),
            ];
            if *total_completed <= 1 {
                ops.push(Operation::unlock(ids::FIRST_LESSON));
            }
            if *perfect {
                ops.push(Operation::unlock(ids::PERFECT_LESSON));
            }
            ops.push(Operation::IncrementIfDefined {
                achievement_id: ids::category(category),
                amount: 1,
            });
            ops
        }
        AchievementTrigger::StreakChanged { streak_days, .. } => STREAK_MILESTONES
            .iter()
            .filter(|(days, _)| streak_days >= days)
            .map(|(_, id)| Operation::unlock(id))
            .collect(),
        AchievementTrigger::LevelChanged { level, .. } => LEVEL_MILESTONES
            .iter()
            .filter(|(min_level, _)| level >= min_level)
            .map(|(_, id)| Operation::unlock(id))
            .collect(),
        AchievementTrigger::BankBalanceChanged { deposited, .. } => {
            if *deposited <= 0 {
                return Vec::new();
            }
            let amount = u32::try_from(*deposited).unwrap_or(u32::MAX);
            vec![
                Operation::unlock(ids::FIRST_DEPOSIT),
                Operation::increment(ids::SAVER_1000, amount),
            ]
        }
        AchievementTrigger::AvatarPurchased { .. } => vec![
            Operation::unlock(ids::FIRST_AVATAR),
            Operation::increment(ids::AVATAR_COLLECTOR, 1),
        ],
        AchievementTrigger::ProfileOpenedFirstTime { .. } => vec![Operation::unlock(ids::WELCOME)],
        AchievementTrigger::ManualProgress {
            achievement_id,
            amount,
            ..
        } => vec![Operation::increment(achievement_id, *amount)],
    }
}

/// Outcome of handling one trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerReport {
    pub applied: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

impl TriggerReport {
    fn status(&self) -> &'static str {
        match (self.failed.is_empty(), self.applied + self.skipped) {
            (true, _) => "success",
            (false, 0) => "error",
            (false, _) => "partial",
        }
    }
}

pub struct AchievementFanout {
    service: Arc<AchievementService>,
}

impl AchievementFanout {
    pub fn new(service: Arc<AchievementService>) -> Self {
        Self { service }
    }

    /// Consumes triggers until every emitter is dropped.
    pub async fn run(self, mut receiver: TriggerReceiver) {
        tracing::info!("Achievement fan-out started");
        while let Some(trigger) = receiver.recv().await {
            self.handle(&trigger).await;
        }
        tracing::info!("Achievement bus closed, fan-out shutting down");
    }

    pub async fn handle(&self, trigger: &AchievementTrigger) -> TriggerReport {
        let user_id = trigger.user_id();
        let mut report = TriggerReport::default();

        for operation in plan(trigger) {
            match self.apply(user_id, &operation).await {
                Ok(true) => report.applied += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!(
                        trigger = trigger.name(),
                        user_id,
                        achievement_id = operation.achievement_id(),
                        error = %err,
                        "Achievement operation failed"
                    );
                    report.failed.push(operation.achievement_id().to_string());
                }
            }
        }

        ACHIEVEMENT_TRIGGERS_TOTAL
            .with_label_values(&[trigger.name(), report.status()])
            .inc();
        tracing::debug!(
            trigger = trigger.name(),
            user_id,
            applied = report.applied,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Achievement trigger handled"
        );

        report
    }

    /// `Ok(false)` means nothing needed to change.
    async fn apply(&self, user_id: &str, operation: &Operation) -> Result<bool, AchievementError> {
        match operation {
            Operation::Increment {
                achievement_id,
                amount,
            } => self
                .service
                .increment_progress(user_id, achievement_id, *amount)
                .await
                .map(|_| true),
            Operation::Unlock { achievement_id } => {
                self.service.unlock_instant(user_id, achievement_id).await
            }
            Operation::IncrementIfDefined {
                achievement_id,
                amount,
            } => self
                .service
                .increment_if_defined(user_id, achievement_id, *amount)
                .await
                .map(|update| update.is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_completion_fans_out() {
        let ops = plan(&AchievementTrigger::LessonCompleted {
            user_id: "kid-1".into(),
            lesson_id: "saving-101".into(),
            category: "saving".into(),
            perfect: true,
            total_completed: 1,
        });

        let ids: Vec<&str> = ops.iter().map(Operation::achievement_id).collect();
        assert_eq!(
            ids,
            vec![
                "lessons_5",
                "lessons_25",
                "first_lesson",
                "perfect_lesson",
                "category_saving"
            ]
        );
    }

    #[test]
    fn later_imperfect_lesson_only_counts() {
        let ops = plan(&AchievementTrigger::LessonCompleted {
            user_id: "kid-1".into(),
            lesson_id: "budget-2".into(),
            category: "budgeting".into(),
            perfect: false,
            total_completed: 4,
        });
        assert_eq!(ops.len(), 3);
        assert!(ops.iter().all(|op| !matches!(op, Operation::Unlock { .. })));
    }

    #[test]
    fn streak_unlocks_every_reached_milestone() {
        let ops = plan(&AchievementTrigger::StreakChanged {
            user_id: "kid-1".into(),
            streak_days: 8,
        });
        assert_eq!(
            ops,
            vec![Operation::unlock("streak_3"), Operation::unlock("streak_7")]
        );
    }

    #[test]
    fn withdrawals_do_not_count_as_saving() {
        let ops = plan(&AchievementTrigger::BankBalanceChanged {
            user_id: "kid-1".into(),
            balance: 200,
            deposited: -50,
        });
        assert!(ops.is_empty());
    }

    #[test]
    fn report_status_reflects_partial_failures() {
        let report = TriggerReport {
            applied: 1,
            skipped: 0,
            failed: vec!["lessons_25".into()],
        };
        assert_eq!(report.status(), "partial");
        assert_eq!(TriggerReport::default().status(), "success");
    }
}
