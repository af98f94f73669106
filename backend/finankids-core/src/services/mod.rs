use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::models::achievement::default_catalog;
use crate::stores::{AchievementStore, InMemoryStore, LessonStore, MongoStore};

pub mod achievement_fanout;
pub mod achievement_service;
pub mod event_bus;
pub mod lesson_engine;
pub mod lesson_service;
pub mod notification_center;
pub mod reward;

use achievement_fanout::AchievementFanout;
use achievement_service::AchievementService;
use event_bus::TriggerEmitter;
use lesson_service::LessonService;
use notification_center::NotificationCenter;

/// Composition root: owns the achievement bus and the services built around it.
pub struct AppState {
    pub config: Config,
    emitter: TriggerEmitter,
    achievements: Arc<AchievementService>,
    notifications: NotificationCenter,
    lessons: LessonService,
    fanout: JoinHandle<()>,
}

impl AppState {
    /// Wires the services and spawns the fan-out consumer. Must run inside a Tokio runtime.
    pub fn new(
        config: Config,
        achievement_store: Arc<dyn AchievementStore>,
        lesson_store: Arc<dyn LessonStore>,
    ) -> Self {
        let (emitter, receiver) = event_bus::channel(config.bus_capacity);
        let notifications = NotificationCenter::new(config.dismiss_after());
        let achievements = Arc::new(AchievementService::new(
            achievement_store,
            notifications.clone(),
            config.claim_policy,
        ));
        let lessons = LessonService::new(lesson_store, emitter.clone(), config.perfect_bonus());

        let fanout = tokio::spawn(AchievementFanout::new(achievements.clone()).run(receiver));

        tracing::info!(
            bus_capacity = ?config.bus_capacity,
            claim_policy = ?config.claim_policy,
            "Application state initialized"
        );

        Self {
            config,
            emitter,
            achievements,
            notifications,
            lessons,
            fanout,
        }
    }

    /// Connects to MongoDB and seeds the default catalog when configured to.
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        let client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
        let store = Arc::new(MongoStore::new(client.database(&config.mongo_database)));
        tracing::info!(database = %config.mongo_database, "MongoDB connected");

        if config.seed_catalog {
            store.seed_catalog(&default_catalog()).await?;
        }

        Ok(Self::new(config, store.clone(), store))
    }

    /// Runs on a process-local store seeded with the default catalog.
    pub fn in_memory(config: Config) -> (Self, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::with_default_catalog());
        let state = Self::new(config, store.clone(), store.clone());
        (state, store)
    }

    pub fn emitter(&self) -> TriggerEmitter {
        self.emitter.clone()
    }

    pub fn achievements(&self) -> &Arc<AchievementService> {
        &self.achievements
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn lessons(&self) -> &LessonService {
        &self.lessons
    }

    /// Closes the bus and waits until queued triggers are handled.
    ///
    /// Emitters cloned out of this state keep the bus open; drop them first.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let Self {
            emitter,
            lessons,
            fanout,
            ..
        } = self;
        drop(emitter);
        drop(lessons);
        fanout.await?;
        tracing::info!("Application state shut down");
        Ok(())
    }
}
