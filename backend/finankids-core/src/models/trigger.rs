use serde::{Deserialize, Serialize};

/// Domain event relevant to achievement progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum AchievementTrigger {
    LessonCompleted {
        user_id: String,
        lesson_id: String,
        category: String,
        perfect: bool,
        /// Lessons the user has completed including this one
        total_completed: u32,
    },
    StreakChanged {
        user_id: String,
        streak_days: u32,
    },
    LevelChanged {
        user_id: String,
        level: u32,
    },
    BankBalanceChanged {
        user_id: String,
        balance: i64,
        /// Signed change; withdrawals are negative
        deposited: i64,
    },
    AvatarPurchased {
        user_id: String,
        item_id: String,
    },
    ProfileOpenedFirstTime {
        user_id: String,
    },
    ManualProgress {
        user_id: String,
        achievement_id: String,
        amount: u32,
    },
}

impl AchievementTrigger {
    pub fn user_id(&self) -> &str {
        match self {
            AchievementTrigger::LessonCompleted { user_id, .. }
            | AchievementTrigger::StreakChanged { user_id, .. }
            | AchievementTrigger::LevelChanged { user_id, .. }
            | AchievementTrigger::BankBalanceChanged { user_id, .. }
            | AchievementTrigger::AvatarPurchased { user_id, .. }
            | AchievementTrigger::ProfileOpenedFirstTime { user_id }
            | AchievementTrigger::ManualProgress { user_id, .. } => user_id,
        }
    }

    /// Stable name used for log fields and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            AchievementTrigger::LessonCompleted { .. } => "lesson_completed",
            AchievementTrigger::StreakChanged { .. } => "streak_changed",
            AchievementTrigger::LevelChanged { .. } => "level_changed",
            AchievementTrigger::BankBalanceChanged { .. } => "bank_balance_changed",
            AchievementTrigger::AvatarPurchased { .. } => "avatar_purchased",
            AchievementTrigger::ProfileOpenedFirstTime { .. } => "profile_opened_first_time",
            AchievementTrigger::ManualProgress { .. } => "manual_progress",
        }
    }
}
