use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_document, Document};
use mongodb::{Collection, Database};
use validator::Validate;

use super::{
    AchievementStore, LessonStore, StoreError, ACHIEVEMENTS_COLLECTION, LESSONS_COLLECTION,
    USER_ACHIEVEMENTS_COLLECTION,
};
use crate::metrics::track_store_operation;
use crate::models::{AchievementDefinition, Lesson, ProgressPatch, UserAchievementProgress};
use crate::utils::time::chrono_to_bson;

/// MongoDB-backed store for lesson content and achievement progress.
#[derive(Clone)]
pub struct MongoStore {
    mongo: Database,
}

impl MongoStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn definitions_collection(&self) -> Collection<AchievementDefinition> {
        self.mongo.collection(ACHIEVEMENTS_COLLECTION)
    }

    fn progress_collection(&self) -> Collection<UserAchievementProgress> {
        self.mongo.collection(USER_ACHIEVEMENTS_COLLECTION)
    }

    /// Inserts catalog entries that do not exist yet; existing entries are left as edited.
    pub async fn seed_catalog(
        &self,
        definitions: &[AchievementDefinition],
    ) -> Result<u64, StoreError> {
        let collection = self.mongo.collection::<Document>(ACHIEVEMENTS_COLLECTION);
        let mut inserted = 0;

        for definition in definitions {
            let mut fields = to_document(definition).map_err(|e| StoreError::InvalidDocument {
                id: definition.id.clone(),
                reason: e.to_string(),
            })?;
            fields.remove("_id");

            let result = track_store_operation(
                "seed",
                ACHIEVEMENTS_COLLECTION,
                async {
                    collection
                        .update_one(
                            doc! { "_id": &definition.id },
                            doc! { "$setOnInsert": fields },
                        )
                        .upsert(true)
                        .await
                },
            )
            .await?;

            if result.upserted_id.is_some() {
                inserted += 1;
            }
        }

        tracing::info!(inserted, total = definitions.len(), "Achievement catalog seeded");
        Ok(inserted)
    }
}

fn merge_document(user_id: &str, achievement_id: &str, patch: &ProgressPatch) -> Document {
    let mut set = doc! {
        "user_id": user_id,
        "achievement_id": achievement_id,
        "updated_at": chrono_to_bson(Utc::now()),
    };
    if let Some(progress) = patch.progress {
        set.insert("progress", i64::from(progress));
    }
    if let Some(unlocked) = patch.unlocked {
        set.insert("unlocked", unlocked);
    }
    if let Some(claimed) = patch.claimed {
        set.insert("claimed", claimed);
    }
    match patch.unlocked_at {
        Some(Some(unlocked_at)) => {
            set.insert("unlocked_at", chrono_to_bson(unlocked_at));
        }
        Some(None) => return doc! { "$set": set, "$unset": { "unlocked_at": "" } },
        None => {}
    }
    doc! { "$set": set }
}

#[async_trait]
impl AchievementStore for MongoStore {
    async fn definitions(&self) -> Result<Vec<AchievementDefinition>, StoreError> {
        let collection = self.definitions_collection();
        let definitions = track_store_operation("find", ACHIEVEMENTS_COLLECTION, async {
            collection.find(doc! {}).await?.try_collect::<Vec<_>>().await
        })
        .await?;
        Ok(definitions)
    }

    async fn definition(&self, id: &str) -> Result<Option<AchievementDefinition>, StoreError> {
        let definition = track_store_operation(
            "find_one",
            ACHIEVEMENTS_COLLECTION,
            async { self.definitions_collection().find_one(doc! { "_id": id }).await },
        )
        .await?;
        Ok(definition)
    }

    async fn progress(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<Option<UserAchievementProgress>, StoreError> {
        let id = UserAchievementProgress::document_id(user_id, achievement_id);
        let record = track_store_operation(
            "find_one",
            USER_ACHIEVEMENTS_COLLECTION,
            async { self.progress_collection().find_one(doc! { "_id": id }).await },
        )
        .await?;
        Ok(record)
    }

    async fn list_progress(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserAchievementProgress>, StoreError> {
        let collection = self.progress_collection();
        let records = track_store_operation("find", USER_ACHIEVEMENTS_COLLECTION, async {
            collection
                .find(doc! { "user_id": user_id })
                .sort(doc! { "achievement_id": 1 })
                .await?
                .try_collect::<Vec<_>>()
                .await
        })
        .await?;
        Ok(records)
    }

    async fn merge_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        patch: ProgressPatch,
    ) -> Result<(), StoreError> {
        let id = UserAchievementProgress::document_id(user_id, achievement_id);
        let update = merge_document(user_id, achievement_id, &patch);

        track_store_operation(
            "merge",
            USER_ACHIEVEMENTS_COLLECTION,
            async {
                self.progress_collection()
                    .update_one(doc! { "_id": &id }, update)
                    .upsert(true)
                    .await
            },
        )
        .await?;

        tracing::debug!(id = %id, ?patch, "Achievement progress merged");
        Ok(())
    }
}

#[async_trait]
impl LessonStore for MongoStore {
    async fn lesson(&self, id: &str) -> Result<Lesson, StoreError> {
        let collection: Collection<Lesson> = self.mongo.collection(LESSONS_COLLECTION);
        let lesson = track_store_operation(
            "find_one",
            LESSONS_COLLECTION,
            async { collection.find_one(doc! { "_id": id }).await },
        )
        .await?
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
