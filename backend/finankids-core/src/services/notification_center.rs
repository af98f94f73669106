use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::models::AchievementNotification;

pub const DEFAULT_DISMISS_AFTER: Duration = Duration::from_millis(3000);

/// Queue of toasts waiting to be shown, in append order.
#[derive(Clone)]
pub struct NotificationCenter {
    state: Arc<watch::Sender<Vec<AchievementNotification>>>,
    dismiss_after: Duration,
}

impl NotificationCenter {
    /// `Duration::ZERO` disables auto-dismissal.
    pub fn new(dismiss_after: Duration) -> Self {
        let (state, _) = watch::channel(Vec::new());
        Self {
            state: Arc::new(state),
            dismiss_after,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<AchievementNotification>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Vec<AchievementNotification> {
        self.state.borrow().clone()
    }

    pub fn push(&self, notification: AchievementNotification) -> Uuid {
        let id = notification.id;
        tracing::info!(
            id = %id,
            kind = ?notification.kind,
            achievement = %notification.achievement_id,
            "Achievement notification queued"
        );
        self.state.send_modify(|list| list.push(notification));

        if !self.dismiss_after.is_zero() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let center = self.clone();
                    handle.spawn(async move {
                        tokio::time::sleep(center.dismiss_after).await;
                        center.dismiss(id);
                    });
                }
                Err(_) => tracing::debug!(id = %id, "No runtime, notification stays until dismissed"),
            }
        }

        id
    }

    /// Removes one notification; returns `false` if it was already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.state.send_if_modified(|list| {
            let before = list.len();
            list.retain(|n| n.id != id);
            list.len() != before
        })
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_DISMISS_AFTER)
    }
}
