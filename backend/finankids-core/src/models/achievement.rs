use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Global catalog entry from the `achievements` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AchievementDefinition {
    #[serde(rename = "_id")]
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 80))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    /// Progress needed to unlock
    #[validate(range(min = 1))]
    pub required: u32,
    /// Money credited when the reward is claimed
    pub reward: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl AchievementDefinition {
    pub fn new(id: &str, title: &str, icon: &str, required: u32, reward: u32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            icon: icon.to_string(),
            required,
            reward,
            category: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}

/// Per-user record in `user_achievements`, keyed by `<user>:<achievement>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAchievementProgress {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub achievement_id: String,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub claimed: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl UserAchievementProgress {
    pub fn document_id(user_id: &str, achievement_id: &str) -> String {
        format!("{}:{}", user_id, achievement_id)
    }

    /// Fresh record for a user that has not progressed yet.
    pub fn empty(user_id: &str, achievement_id: &str) -> Self {
        Self {
            id: Self::document_id(user_id, achievement_id),
            user_id: user_id.to_string(),
            achievement_id: achievement_id.to_string(),
            progress: 0,
            unlocked: false,
            claimed: false,
            unlocked_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Applies a merge patch the same way the document store `$set` does.
    pub fn apply(&mut self, patch: &ProgressPatch) {
        if let Some(progress) = patch.progress {
            self.progress = progress;
        }
        if let Some(unlocked) = patch.unlocked {
            self.unlocked = unlocked;
        }
        if let Some(claimed) = patch.claimed {
            self.claimed = claimed;
        }
        if let Some(unlocked_at) = patch.unlocked_at {
            self.unlocked_at = unlocked_at;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update merged into a progress record; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressPatch {
    pub progress: Option<u32>,
    pub unlocked: Option<bool>,
    pub claimed: Option<bool>,
    /// `Some(None)` clears the unlock time
    pub unlocked_at: Option<Option<DateTime<Utc>>>,
}

/// Catalog entry joined with the user's record, as shown on the achievements screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementEntry {
    pub definition: AchievementDefinition,
    pub progress: u32,
    pub unlocked: bool,
    pub claimed: bool,
}

impl AchievementEntry {
    pub fn new(definition: AchievementDefinition, record: Option<&UserAchievementProgress>) -> Self {
        Self {
            definition,
            progress: record.map(|r| r.progress).unwrap_or(0),
            unlocked: record.map(|r| r.unlocked).unwrap_or(false),
            claimed: record.map(|r| r.claimed).unwrap_or(false),
        }
    }

    pub fn claimable(&self) -> bool {
        self.unlocked && !self.claimed
    }
}

pub mod ids {
    pub const WELCOME: &str = "welcome";
    pub const FIRST_LESSON: &str = "first_lesson";
    pub const LESSONS_5: &str = "lessons_5";
    pub const LESSONS_25: &str = "lessons_25";
    pub const PERFECT_LESSON: &str = "perfect_lesson";
    pub const STREAK_3: &str = "streak_3";
    pub const STREAK_7: &str = "streak_7";
    pub const STREAK_30: &str = "streak_30";
    pub const LEVEL_5: &str = "level_5";
    pub const LEVEL_10: &str = "level_10";
    pub const FIRST_DEPOSIT: &str = "first_deposit";
    pub const SAVER_1000: &str = "saver_1000";
    pub const FIRST_AVATAR: &str = "first_avatar";
    pub const AVATAR_COLLECTOR: &str = "avatar_collector";

    pub fn category(category: &str) -> String {
        format!("category_{}", category)
    }
}

/// Streak length that unlocks each streak achievement.
pub const STREAK_MILESTONES: &[(u32, &str)] = &[
    (3, ids::STREAK_3),
    (7, ids::STREAK_7),
    (30, ids::STREAK_30),
];

/// Player level that unlocks each level achievement.
pub const LEVEL_MILESTONES: &[(u32, &str)] = &[(5, ids::LEVEL_5), (10, ids::LEVEL_10)];

/// Catalog seeded into an empty store.
pub fn default_catalog() -> Vec<AchievementDefinition> {
    vec![
        AchievementDefinition::new(ids::WELCOME, "Hello, FinanKid!", "wave", 1, 10)
            .with_description("Open your profile for the first time"),
        AchievementDefinition::new(ids::FIRST_LESSON, "First Steps", "book", 1, 50)
            .with_description("Complete your first lesson"),
        AchievementDefinition::new(ids::LESSONS_5, "Eager Learner", "books", 5, 100)
            .with_description("Complete 5 lessons"),
        AchievementDefinition::new(ids::LESSONS_25, "Money Scholar", "graduation_cap", 25, 300)
            .with_description("Complete 25 lessons"),
        AchievementDefinition::new(ids::PERFECT_LESSON, "Flawless", "star", 1, 75)
            .with_description("Finish a lesson without mistakes"),
        AchievementDefinition::new(ids::STREAK_3, "On a Roll", "flame", 1, 30)
            .with_description("Keep a 3 day streak"),
        AchievementDefinition::new(ids::STREAK_7, "Week Warrior", "flame", 1, 100)
            .with_description("Keep a 7 day streak"),
        AchievementDefinition::new(ids::STREAK_30, "Unstoppable", "fire", 1, 500)
            .with_description("Keep a 30 day streak"),
        AchievementDefinition::new(ids::LEVEL_5, "Rising Star", "medal", 1, 100)
            .with_description("Reach level 5"),
        AchievementDefinition::new(ids::LEVEL_10, "Finance Hero", "trophy", 1, 250)
            .with_description("Reach level 10"),
        AchievementDefinition::new(ids::FIRST_DEPOSIT, "First Deposit", "piggy_bank", 1, 25)
            .with_description("Put money in your bank for the first time"),
        AchievementDefinition::new(ids::SAVER_1000, "Super Saver", "vault", 1000, 200)
            .with_description("Deposit 1000 coins in total"),
        AchievementDefinition::new(ids::FIRST_AVATAR, "New Look", "shirt", 1, 30)
            .with_description("Buy your first avatar item"),
        AchievementDefinition::new(ids::AVATAR_COLLECTOR, "Fashionista", "crown", 5, 120)
            .with_description("Buy 5 avatar items"),
        AchievementDefinition::new(&ids::category("saving"), "Saving Expert", "coins", 5, 150)
            .with_description("Complete 5 saving lessons")
            .with_category("saving"),
        AchievementDefinition::new(&ids::category("budgeting"), "Budget Boss", "chart", 5, 150)
            .with_description("Complete 5 budgeting lessons")
            .with_category("budgeting"),
        AchievementDefinition::new(&ids::category("investing"), "Little Investor", "seed", 5, 150)
            .with_description("Complete 5 investing lessons")
            .with_category("investing"),
    ]
}
