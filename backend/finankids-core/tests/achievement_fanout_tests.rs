mod common;

use std::sync::Arc;
use std::time::Duration;

use finankids_core::models::achievement::{default_catalog, ids};
use finankids_core::models::{
    AchievementDefinition, AchievementTrigger, NotificationKind, ProgressPatch,
    UserAchievementProgress,
};
use finankids_core::services::achievement_fanout::AchievementFanout;
use finankids_core::services::achievement_service::{AchievementService, ClaimPolicy};
use finankids_core::services::notification_center::NotificationCenter;
use finankids_core::stores::{AchievementStore, InMemoryStore, StoreError};
use tokio::sync::mpsc;

use common::{budgeting_lesson, create_test_app};

/// Catalog lookups for category achievements fail; everything else goes to memory.
struct CategoryLookupDown {
    inner: InMemoryStore,
}

#[async_trait::async_trait]
impl AchievementStore for CategoryLookupDown {
    async fn definitions(&self) -> Result<Vec<AchievementDefinition>, StoreError> {
        self.inner.definitions().await
    }

    async fn definition(&self, id: &str) -> Result<Option<AchievementDefinition>, StoreError> {
        if id.starts_with("category_") {
            return Err(StoreError::Unavailable("catalog lookup timed out".into()));
        }
        self.inner.definition(id).await
    }

    async fn progress(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<Option<UserAchievementProgress>, StoreError> {
        self.inner.progress(user_id, achievement_id).await
    }

    async fn list_progress(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserAchievementProgress>, StoreError> {
        self.inner.list_progress(user_id).await
    }

    async fn merge_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        patch: ProgressPatch,
    ) -> Result<(), StoreError> {
        self.inner.merge_progress(user_id, achievement_id, patch).await
    }
}

fn fanout_over(store: Arc<InMemoryStore>) -> (Arc<AchievementService>, AchievementFanout) {
    let service = Arc::new(AchievementService::new(
        store,
        NotificationCenter::new(Duration::ZERO),
        ClaimPolicy::Strict,
    ));
    (service.clone(), AchievementFanout::new(service))
}

#[tokio::test]
async fn first_perfect_lesson_unlocks_and_counts() {
    let store = Arc::new(InMemoryStore::with_default_catalog());
    let (service, fanout) = fanout_over(store.clone());

    let report = fanout
        .handle(&AchievementTrigger::LessonCompleted {
            user_id: "kid-1".into(),
            lesson_id: "budget-101".into(),
            category: "budgeting".into(),
            perfect: true,
            total_completed: 1,
        })
        .await;

    assert!(report.failed.is_empty());
    assert_eq!(report.applied, 5);

    let first = store.progress("kid-1", ids::FIRST_LESSON).await.unwrap().unwrap();
    assert!(first.unlocked);
    let lessons = store.progress("kid-1", ids::LESSONS_5).await.unwrap().unwrap();
    assert_eq!(lessons.progress, 1);
    assert!(!lessons.unlocked);

    let unlocked: Vec<String> = service
        .notifications()
        .current()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Unlocked)
        .map(|n| n.achievement_id)
        .collect();
    assert_eq!(unlocked, vec![ids::FIRST_LESSON, ids::PERFECT_LESSON]);
}

#[tokio::test]
async fn unknown_category_is_skipped() {
    let store = Arc::new(InMemoryStore::with_default_catalog());
    let (_, fanout) = fanout_over(store);

    let report = fanout
        .handle(&AchievementTrigger::LessonCompleted {
            user_id: "kid-1".into(),
            lesson_id: "crypto-1".into(),
            category: "crypto".into(),
            perfect: false,
            total_completed: 3,
        })
        .await;

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 1);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn failed_category_lookup_lands_in_state_error() {
    let store = Arc::new(CategoryLookupDown {
        inner: InMemoryStore::with_default_catalog(),
    });
    let service = Arc::new(AchievementService::new(
        store,
        NotificationCenter::new(Duration::ZERO),
        ClaimPolicy::Strict,
    ));
    let fanout = AchievementFanout::new(service.clone());
    service.load("kid-1").await.unwrap();
    assert_eq!(service.state().error, None);

    let report = fanout
        .handle(&AchievementTrigger::LessonCompleted {
            user_id: "kid-1".into(),
            lesson_id: "saving-101".into(),
            category: "saving".into(),
            perfect: false,
            total_completed: 2,
        })
        .await;

    assert_eq!(report.failed, vec![ids::category("saving")]);
    assert_eq!(report.applied, 2);
    let error = service.state().error.unwrap();
    assert!(error.contains("catalog lookup timed out"));
}

#[tokio::test]
async fn one_failing_operation_does_not_stop_the_rest() {
    let store = Arc::new(InMemoryStore::with_default_catalog());
    store.fail_merges_for(ids::FIRST_AVATAR).await;
    let (_, fanout) = fanout_over(store.clone());

    let report = fanout
        .handle(&AchievementTrigger::AvatarPurchased {
            user_id: "kid-1".into(),
            item_id: "hat".into(),
        })
        .await;

    assert_eq!(report.failed, vec![ids::FIRST_AVATAR.to_string()]);
    assert_eq!(report.applied, 1);
    let collector = store
        .progress("kid-1", ids::AVATAR_COLLECTOR)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(collector.progress, 1);
}

#[tokio::test]
async fn deposits_accumulate_towards_saver() {
    let store = Arc::new(InMemoryStore::with_default_catalog());
    let (service, fanout) = fanout_over(store.clone());

    for deposited in [600, 500] {
        fanout
            .handle(&AchievementTrigger::BankBalanceChanged {
                user_id: "kid-1".into(),
                balance: 0,
                deposited,
            })
            .await;
    }

    let saver = store.progress("kid-1", ids::SAVER_1000).await.unwrap().unwrap();
    assert_eq!(saver.progress, 1100);
    assert!(saver.unlocked);
    assert_eq!(service.claim_reward("kid-1", ids::SAVER_1000).await.unwrap(), 200);
}

#[tokio::test]
async fn repeated_milestones_do_not_notify_twice() {
    let store = Arc::new(InMemoryStore::with_catalog(default_catalog()));
    let (service, fanout) = fanout_over(store);

    for streak_days in [3, 4, 7] {
        fanout
            .handle(&AchievementTrigger::StreakChanged {
                user_id: "kid-1".into(),
                streak_days,
            })
            .await;
    }

    let unlocked: Vec<String> = service
        .notifications()
        .current()
        .into_iter()
        .map(|n| n.achievement_id)
        .collect();
    assert_eq!(unlocked, vec![ids::STREAK_3, ids::STREAK_7]);
}

#[tokio::test]
async fn lesson_completion_flows_through_the_bus() {
    let (state, store) = create_test_app();
    store.insert_lesson(budgeting_lesson()).await;
    let achievements = state.achievements().clone();
    let (sink, mut completions) = mpsc::unbounded_channel();

    let mut engine = state
        .lessons()
        .start("kid-1", "budget-101", 0, || {}, sink)
        .await
        .unwrap();

    // Teaching step, then answer everything right
    engine.continue_lesson();
    engine.select_answer("B");
    engine.submit();
    engine.continue_lesson();
    engine.select_answer("savings");
    engine.submit();
    engine.continue_lesson();
    engine.toggle_match("Bread", "Need");
    engine.toggle_match("Toy", "Want");
    engine.submit();
    engine.continue_lesson();
    engine.place_token(0, "Need");
    engine.place_token(1, "Want");
    engine.submit();
    engine.continue_lesson();
    for (slot, word) in ["Save", "first", "spend", "later"].iter().enumerate() {
        engine.place_word(slot, *word);
    }
    engine.submit();
    engine.continue_lesson();

    let completed = completions.recv().await.unwrap();
    assert!(completed.reward.perfect);

    state.emitter().emit(AchievementTrigger::ProfileOpenedFirstTime {
        user_id: "kid-1".into(),
    });

    drop(engine);
    state.shutdown().await.unwrap();

    for id in [ids::FIRST_LESSON, ids::PERFECT_LESSON, ids::WELCOME] {
        let record = store.progress("kid-1", id).await.unwrap().unwrap();
        assert!(record.unlocked, "{id} should be unlocked");
    }
    let budgeting = store
        .progress("kid-1", &ids::category("budgeting"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(budgeting.progress, 1);

    let state = achievements.load("kid-1").await.unwrap();
    assert_eq!(state.entries.len(), default_catalog().len());
    assert!(state.entries.iter().any(|e| e.claimable()));
}
