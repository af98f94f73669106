//! In-process achievement bus.
//!
//! Many producers (lesson screens, the bank, the avatar shop) hold a
//! [`TriggerEmitter`]; exactly one consumer owns the [`TriggerReceiver`].
//! The bus is built by the composition root and passed around explicitly.

use tokio::sync::mpsc;

use crate::metrics::ACHIEVEMENT_TRIGGERS_QUEUED;
use crate::models::AchievementTrigger;

/// Creates the bus. `None` gives an unbounded channel, `Some(n)` a buffer of `n` triggers.
pub fn channel(capacity: Option<usize>) -> (TriggerEmitter, TriggerReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (
                TriggerEmitter {
                    sender: Sender::Bounded(tx),
                },
                TriggerReceiver {
                    receiver: Receiver::Bounded(rx),
                },
            )
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                TriggerEmitter {
                    sender: Sender::Unbounded(tx),
                },
                TriggerReceiver {
                    receiver: Receiver::Unbounded(rx),
                },
            )
        }
    }
}

#[derive(Clone)]
enum Sender {
    Bounded(mpsc::Sender<AchievementTrigger>),
    Unbounded(mpsc::UnboundedSender<AchievementTrigger>),
}

enum Receiver {
    Bounded(mpsc::Receiver<AchievementTrigger>),
    Unbounded(mpsc::UnboundedReceiver<AchievementTrigger>),
}

/// Producer half of the bus; cheap to clone.
#[derive(Clone)]
pub struct TriggerEmitter {
    sender: Sender,
}

impl TriggerEmitter {
    /// Queues a trigger without waiting. Returns `false` when it was dropped
    /// because the buffer is full or the consumer has stopped.
    pub fn emit(&self, trigger: AchievementTrigger) -> bool {
        let name = trigger.name();
        let sent = match &self.sender {
            Sender::Bounded(tx) => tx.try_send(trigger).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            }),
            Sender::Unbounded(tx) => tx.send(trigger).map_err(|_| "closed"),
        };

        match sent {
            Ok(()) => {
                ACHIEVEMENT_TRIGGERS_QUEUED.inc();
                tracing::debug!(trigger = name, "Achievement trigger queued");
                true
            }
            Err(reason) => {
                tracing::warn!(trigger = name, reason, "Achievement trigger dropped");
                false
            }
        }
    }
}

/// Consumer half of the bus.
pub struct TriggerReceiver {
    receiver: Receiver,
}

impl TriggerReceiver {
    /// Next trigger in arrival order; `None` once every emitter is gone.
    pub async fn recv(&mut self) -> Option<AchievementTrigger> {
        let trigger = match &mut self.receiver {
            Receiver::Bounded(rx) => rx.recv().await,
            Receiver::Unbounded(rx) => rx.recv().await,
        };
        if trigger.is_some() {
            ACHIEVEMENT_TRIGGERS_QUEUED.dec();
        }
        trigger
    }
}
