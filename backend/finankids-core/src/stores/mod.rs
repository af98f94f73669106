//! Persistence facade over the remote document store.
//!
//! The services only see [`AchievementStore`] and [`LessonStore`]. Production
//! uses [`MongoStore`]; tests and offline runs use [`InMemoryStore`].

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AchievementDefinition, Lesson, ProgressPatch, UserAchievementProgress};

pub mod memory;
pub mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

pub const ACHIEVEMENTS_COLLECTION: &str = "achievements";
pub const USER_ACHIEVEMENTS_COLLECTION: &str = "user_achievements";
pub const LESSONS_COLLECTION: &str = "lessons";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("{collection} document '{id}' not found")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    #[error("invalid document '{id}': {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AchievementStore: Send + Sync {
    async fn definitions(&self) -> Result<Vec<AchievementDefinition>, StoreError>;

    async fn definition(&self, id: &str) -> Result<Option<AchievementDefinition>, StoreError>;

    async fn progress(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<Option<UserAchievementProgress>, StoreError>;

    async fn list_progress(&self, user_id: &str)
        -> Result<Vec<UserAchievementProgress>, StoreError>;

    /// Merges the patch into the record, creating it when missing. Never replaces the whole document.
    async fn merge_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        patch: ProgressPatch,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait LessonStore: Send + Sync {
    /// Loads a lesson and checks it is playable.
    async fn lesson(&self, id: &str) -> Result<Lesson, StoreError>;
}
