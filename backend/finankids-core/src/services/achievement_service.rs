use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::metrics::{ACHIEVEMENTS_UNLOCKED_TOTAL, ACHIEVEMENT_REWARDS_CLAIMED_TOTAL};
use crate::models::{
    AchievementDefinition, AchievementEntry, AchievementNotification, NotificationKind,
    ProgressPatch, UserAchievementProgress,
};
use crate::services::notification_center::NotificationCenter;
use crate::stores::{AchievementStore, StoreError};

#[derive(Debug, Error)]
pub enum AchievementError {
    #[error("unknown achievement '{0}'")]
    UnknownAchievement(String),

    #[error("achievement '{0}' is not unlocked yet")]
    NotUnlocked(String),

    #[error("reward for achievement '{0}' was already claimed")]
    AlreadyClaimed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whether claiming checks the claimed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPolicy {
    /// Claim requires an unlocked, unclaimed achievement
    #[default]
    Strict,
    /// Claim is never refused; locked or already claimed rewards are paid out again
    Permissive,
}

/// Snapshot of the achievements screen for the loaded user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AchievementState {
    pub user_id: Option<String>,
    pub entries: Vec<AchievementEntry>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Result of an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub progress: u32,
    pub unlocked: bool,
    pub newly_unlocked: bool,
}

pub struct AchievementService {
    store: Arc<dyn AchievementStore>,
    notifications: NotificationCenter,
    claim_policy: ClaimPolicy,
    state: watch::Sender<AchievementState>,
}

impl AchievementService {
    pub fn new(
        store: Arc<dyn AchievementStore>,
        notifications: NotificationCenter,
        claim_policy: ClaimPolicy,
    ) -> Self {
        let (state, _) = watch::channel(AchievementState::default());
        Self {
            store,
            notifications,
            claim_policy,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AchievementState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AchievementState {
        self.state.borrow().clone()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Loads the catalog joined with the user's records and publishes it.
    pub async fn load(&self, user_id: &str) -> Result<AchievementState, AchievementError> {
        self.state.send_modify(|state| {
            if state.user_id.as_deref() != Some(user_id) {
                state.entries.clear();
            }
            state.user_id = Some(user_id.to_string());
            state.loading = true;
            state.error = None;
        });

        let loaded = self.fetch_entries(user_id).await;
        match loaded {
            Ok(entries) => {
                tracing::info!(user_id, count = entries.len(), "Achievements loaded");
                self.state.send_modify(|state| {
                    state.entries = entries;
                    state.loading = false;
                });
                Ok(self.state())
            }
            Err(err) => {
                self.state.send_modify(|state| state.loading = false);
                Err(self.fail(user_id, err))
            }
        }
    }

    async fn fetch_entries(&self, user_id: &str) -> Result<Vec<AchievementEntry>, AchievementError> {
        let definitions = self.store.definitions().await?;
        let records = self.store.list_progress(user_id).await?;

        Ok(definitions
            .into_iter()
            .map(|definition| {
                let record = records.iter().find(|r| r.achievement_id == definition.id);
                AchievementEntry::new(definition, record)
            })
            .collect())
    }

    /// Adds `amount` to the user's progress and unlocks once the threshold is met.
    pub async fn increment_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        amount: u32,
    ) -> Result<ProgressUpdate, AchievementError> {
        let result = self.try_increment(user_id, achievement_id, amount).await;
        result.map_err(|err| self.fail(user_id, err))
    }

    async fn try_increment(
        &self,
        user_id: &str,
        achievement_id: &str,
        amount: u32,
    ) -> Result<ProgressUpdate, AchievementError> {
        let definition = self.definition(achievement_id).await?;
        let current = self.current(user_id, achievement_id).await?;

        let progress = current.progress.saturating_add(amount);
        let unlocked = current.unlocked || progress >= definition.required;
        let newly_unlocked = unlocked && !current.unlocked;

        self.store
            .merge_progress(
                user_id,
                achievement_id,
                ProgressPatch {
                    progress: Some(progress),
                    unlocked: Some(unlocked),
                    claimed: None,
                    unlocked_at: newly_unlocked.then(|| Some(Utc::now())),
                },
            )
            .await?;

        tracing::debug!(
            user_id,
            achievement_id,
            amount,
            progress,
            required = definition.required,
            "Achievement progress incremented"
        );

        if newly_unlocked {
            self.announce_unlock(user_id, &definition);
        }
        self.refresh_entry(user_id, &definition, |entry| {
            entry.progress = progress;
            entry.unlocked = unlocked;
        });

        Ok(ProgressUpdate {
            progress,
            unlocked,
            newly_unlocked,
        })
    }

    /// Like [`increment_progress`](Self::increment_progress), but `Ok(None)` when the
    /// catalog has no such achievement.
    pub async fn increment_if_defined(
        &self,
        user_id: &str,
        achievement_id: &str,
        amount: u32,
    ) -> Result<Option<ProgressUpdate>, AchievementError> {
        match self.try_increment(user_id, achievement_id, amount).await {
            Ok(update) => Ok(Some(update)),
            Err(AchievementError::UnknownAchievement(_)) => {
                tracing::debug!(user_id, achievement_id, "No such achievement, increment skipped");
                Ok(None)
            }
            Err(err) => Err(self.fail(user_id, err)),
        }
    }

    /// Unlocks an achievement outright. Returns `false` when it was already unlocked.
    pub async fn unlock_instant(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<bool, AchievementError> {
        let result = self.try_unlock(user_id, achievement_id).await;
        result.map_err(|err| self.fail(user_id, err))
    }

    async fn try_unlock(&self, user_id: &str, achievement_id: &str) -> Result<bool, AchievementError> {
        let definition = self.definition(achievement_id).await?;
        let current = self.current(user_id, achievement_id).await?;

        if current.unlocked {
            tracing::debug!(user_id, achievement_id, "Achievement already unlocked");
            return Ok(false);
        }

        let progress = current.progress.max(1);
        self.store
            .merge_progress(
                user_id,
                achievement_id,
                ProgressPatch {
                    progress: Some(progress),
                    unlocked: Some(true),
                    claimed: Some(false),
                    unlocked_at: Some(Some(Utc::now())),
                },
            )
            .await?;

        self.announce_unlock(user_id, &definition);
        self.refresh_entry(user_id, &definition, |entry| {
            entry.progress = progress;
            entry.unlocked = true;
            entry.claimed = false;
        });
        Ok(true)
    }

    /// Marks the reward as claimed and returns its amount.
    pub async fn claim_reward(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<u32, AchievementError> {
        let result = self.try_claim(user_id, achievement_id).await;
        result.map_err(|err| self.fail(user_id, err))
    }

    async fn try_claim(&self, user_id: &str, achievement_id: &str) -> Result<u32, AchievementError> {
        let definition = self.definition(achievement_id).await?;
        let current = self.current(user_id, achievement_id).await?;

        match self.claim_policy {
            ClaimPolicy::Strict if !current.unlocked => {
                return Err(AchievementError::NotUnlocked(achievement_id.to_string()));
            }
            ClaimPolicy::Strict if current.claimed => {
                return Err(AchievementError::AlreadyClaimed(achievement_id.to_string()));
            }
            ClaimPolicy::Permissive if !current.unlocked || current.claimed => {
                tracing::warn!(
                    user_id,
                    achievement_id,
                    unlocked = current.unlocked,
                    claimed = current.claimed,
                    "Reward claimed without passing the claim checks"
                );
            }
            _ => {}
        }

        self.store
            .merge_progress(
                user_id,
                achievement_id,
                ProgressPatch {
                    claimed: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        ACHIEVEMENT_REWARDS_CLAIMED_TOTAL
            .with_label_values(&[achievement_id])
            .inc();
        tracing::info!(user_id, achievement_id, reward = definition.reward, "Achievement reward claimed");

        self.notifications.push(AchievementNotification::new(
            NotificationKind::RewardClaimed,
            user_id,
            &definition,
        ));
        self.refresh_entry(user_id, &definition, |entry| entry.claimed = true);

        Ok(definition.reward)
    }

    /// Explicit reset back to zero; the only way progress goes down.
    pub async fn reset_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<(), AchievementError> {
        let result = self.try_reset(user_id, achievement_id).await;
        result.map_err(|err| self.fail(user_id, err))
    }

    async fn try_reset(&self, user_id: &str, achievement_id: &str) -> Result<(), AchievementError> {
        let definition = self.definition(achievement_id).await?;
        self.store
            .merge_progress(
                user_id,
                achievement_id,
                ProgressPatch {
                    progress: Some(0),
                    unlocked: Some(false),
                    claimed: Some(false),
                    unlocked_at: Some(None),
                },
            )
            .await?;

        tracing::info!(user_id, achievement_id, "Achievement progress reset");
        self.refresh_entry(user_id, &definition, |entry| {
            entry.progress = 0;
            entry.unlocked = false;
            entry.claimed = false;
        });
        Ok(())
    }

    pub async fn definition(&self, achievement_id: &str) -> Result<AchievementDefinition, AchievementError> {
        self.store
            .definition(achievement_id)
            .await?
            .ok_or_else(|| AchievementError::UnknownAchievement(achievement_id.to_string()))
    }

    async fn current(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<UserAchievementProgress, AchievementError> {
        Ok(self
            .store
            .progress(user_id, achievement_id)
            .await?
            .unwrap_or_else(|| UserAchievementProgress::empty(user_id, achievement_id)))
    }

    fn announce_unlock(&self, user_id: &str, definition: &AchievementDefinition) {
        ACHIEVEMENTS_UNLOCKED_TOTAL
            .with_label_values(&[definition.id.as_str()])
            .inc();
        tracing::info!(user_id, achievement_id = %definition.id, "Achievement unlocked");
        self.notifications.push(AchievementNotification::new(
            NotificationKind::Unlocked,
            user_id,
            definition,
        ));
    }

    /// Mirrors a successful write into the published state when that user is loaded.
    fn refresh_entry<F>(&self, user_id: &str, definition: &AchievementDefinition, update: F)
    where
        F: FnOnce(&mut AchievementEntry),
    {
        self.state.send_if_modified(|state| {
            if state.user_id.as_deref() != Some(user_id) {
                return false;
            }
            match state
                .entries
                .iter_mut()
                .find(|e| e.definition.id == definition.id)
            {
                Some(entry) => update(entry),
                None => {
                    let mut entry = AchievementEntry::new(definition.clone(), None);
                    update(&mut entry);
                    state.entries.push(entry);
                }
            }
            true
        });
    }

    /// Records the failure as the state error string and hands the error back.
    fn fail(&self, user_id: &str, err: AchievementError) -> AchievementError {
        tracing::error!(user_id, error = %err, "Achievement update failed");
        let message = err.to_string();
        self.state.send_if_modified(|state| {
            if state.user_id.is_some() && state.user_id.as_deref() != Some(user_id) {
                return false;
            }
            state.error = Some(message);
            true
        });
        err
    }
}
