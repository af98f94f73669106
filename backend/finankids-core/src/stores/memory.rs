use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use validator::Validate;

use super::{AchievementStore, LessonStore, StoreError, LESSONS_COLLECTION};
use crate::models::achievement::default_catalog;
use crate::models::{AchievementDefinition, Lesson, ProgressPatch, UserAchievementProgress};

/// Process-local store with the same merge semantics as [`MongoStore`](super::MongoStore).
#[derive(Default)]
pub struct InMemoryStore {
    definitions: RwLock<Vec<AchievementDefinition>>,
    progress: RwLock<HashMap<String, UserAchievementProgress>>,
    lessons: RwLock<HashMap<String, Lesson>>,
    failing_merges: RwLock<HashSet<String>>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(definitions: Vec<AchievementDefinition>) -> Self {
        Self {
            definitions: RwLock::new(definitions),
            ..Self::default()
        }
    }

    pub fn with_default_catalog() -> Self {
        Self::with_catalog(default_catalog())
    }

    pub async fn insert_lesson(&self, lesson: Lesson) {
        self.lessons.write().await.insert(lesson.id.clone(), lesson);
    }

    /// Makes every merge into `achievement_id` fail.
    pub async fn fail_merges_for(&self, achievement_id: &str) {
        self.failing_merges
            .write()
            .await
            .insert(achievement_id.to_string());
    }

    /// Makes every operation fail while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AchievementStore for InMemoryStore {
    async fn definitions(&self) -> Result<Vec<AchievementDefinition>, StoreError> {
        self.check_online()?;
        Ok(self.definitions.read().await.clone())
    }

    async fn definition(&self, id: &str) -> Result<Option<AchievementDefinition>, StoreError> {
        self.check_online()?;
        Ok(self
            .definitions
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn progress(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<Option<UserAchievementProgress>, StoreError> {
        self.check_online()?;
        let key = UserAchievementProgress::document_id(user_id, achievement_id);
        Ok(self.progress.read().await.get(&key).cloned())
    }

    async fn list_progress(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserAchievementProgress>, StoreError> {
        self.check_online()?;
        let mut records: Vec<_> = self
            .progress
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.achievement_id.cmp(&b.achievement_id));
        Ok(records)
    }

    async fn merge_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        patch: ProgressPatch,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        if self.failing_merges.read().await.contains(achievement_id) {
            return Err(StoreError::Unavailable(format!(
                "merge into '{}' rejected",
                achievement_id
            )));
        }

        let key = UserAchievementProgress::document_id(user_id, achievement_id);
        self.progress
            .write()
            .await
            .entry(key)
            .or_insert_with(|| UserAchievementProgress::empty(user_id, achievement_id))
            .apply(&patch);
        Ok(())
    }
}

#[async_trait]
impl LessonStore for InMemoryStore {
    async fn lesson(&self, id: &str) -> Result<Lesson, StoreError> {
        self.check_online()?;
        let lesson = self
            .lessons
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: LESSONS_COLLECTION,
                id: id.to_string(),
            })?;

        lesson.validate().map_err(|e| StoreError::InvalidDocument {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(lesson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merge_creates_then_updates() {
        let store = InMemoryStore::with_default_catalog();

        store
            .merge_progress(
                "kid-1",
                "lessons_5",
                ProgressPatch {
                    progress: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .merge_progress(
                "kid-1",
                "lessons_5",
                ProgressPatch {
                    unlocked: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.progress("kid-1", "lessons_5").await.unwrap().unwrap();
        assert_eq!(record.progress, 2);
        assert!(record.unlocked);
        assert_eq!(record.id, "kid-1:lessons_5");
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        let err = store.definitions().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn missing_lesson_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.lesson("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
