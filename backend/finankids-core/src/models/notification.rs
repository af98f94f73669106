use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::achievement::AchievementDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Unlocked,
    RewardClaimed,
}

/// Transient toast shown when an achievement unlocks or its reward is claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementNotification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub user_id: String,
    pub achievement_id: String,
    pub title: String,
    pub reward: u32,
    pub icon: String,
    pub created_at: DateTime<Utc>,
}

impl AchievementNotification {
    pub fn new(kind: NotificationKind, user_id: &str, definition: &AchievementDefinition) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            user_id: user_id.to_string(),
            achievement_id: definition.id.clone(),
            title: definition.title.clone(),
            reward: definition.reward,
            icon: definition.icon.clone(),
            created_at: Utc::now(),
        }
    }
}
