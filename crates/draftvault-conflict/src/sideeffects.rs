use std::sync::Arc;

use draftvault_core::{AuditEvent, AuditSink, Notifier, RecentFiles, SaveFailedNotice};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// One outbound best-effort side effect.
#[derive(Debug)]
pub enum SideEffect {
    Audit(AuditEvent),
    Notify(SaveFailedNotice),
    MarkRecentInaccessible { user_id: String, file_id: String },
    /// Drain barrier: acknowledged once everything queued before it ran.
    Settle(oneshot::Sender<()>),
}

/// Outbound side-effect queue with a single worker task.
///
/// Audit records, notifications, and recent-files invalidation are delivered
/// off the save path. A failed delivery is logged and dropped; it must never
/// affect the save that already succeeded.
#[derive(Clone)]
pub struct SideEffects {
    tx: mpsc::UnboundedSender<SideEffect>,
}

impl SideEffects {
    /// Spawn the worker and return a handle for enqueueing effects.
    pub fn spawn(
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        recents: Arc<dyn RecentFiles>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SideEffect>();

        tokio::spawn(async move {
            while let Some(effect) = rx.recv().await {
                match effect {
                    SideEffect::Audit(event) => {
                        if let Err(e) = audit.record(event).await {
                            warn!("Dropped audit event: {}", e);
                        }
                    }
                    SideEffect::Notify(notice) => {
                        if let Err(e) = notifier.save_failed(notice).await {
                            warn!("Dropped save-failure notification: {}", e);
                        }
                    }
                    SideEffect::MarkRecentInaccessible { user_id, file_id } => {
                        if let Err(e) = recents.mark_inaccessible(&user_id, &file_id).await {
                            warn!(
                                "Failed to invalidate recent-files entry {} for {}: {}",
                                file_id, user_id, e
                            );
                        }
                    }
                    SideEffect::Settle(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("Side-effect worker stopped");
        });

        Self { tx }
    }

    /// Enqueue an effect. A closed queue is itself a swallowed failure.
    pub fn send(&self, effect: SideEffect) {
        if self.tx.send(effect).is_err() {
            warn!("Side-effect queue closed; effect dropped");
        }
    }

    /// Wait until every effect enqueued before this call has been delivered.
    /// Used for graceful shutdown and by tests asserting on sink contents.
    pub async fn settle(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(SideEffect::Settle(ack)).is_ok() {
            let _ = done.await;
        }
    }
}
