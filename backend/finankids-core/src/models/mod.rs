pub mod achievement;
pub mod activity;
pub mod lesson;
pub mod notification;
pub mod trigger;

pub use achievement::{
    AchievementDefinition, AchievementEntry, ProgressPatch, UserAchievementProgress,
};
pub use activity::{Activity, ActivityKind, DragItem, MatchPair};
pub use lesson::Lesson;
pub use notification::{AchievementNotification, NotificationKind};
pub use trigger::AchievementTrigger;
