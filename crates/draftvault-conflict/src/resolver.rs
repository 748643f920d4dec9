use std::sync::Arc;

use chrono::Utc;
use draftvault_core::{
    AuditEvent, ClientKind, ConflictOutcome, ConflictReason, ContentRef, CopyWriter, EditSession,
    OriginalFile, SaveFailedNotice, SessionMode, SessionStore, StorageKind, StoreError,
    VersionStore,
};
use tracing::{debug, instrument, warn};

use crate::naming::conflict_name;
use crate::sideeffects::{SideEffect, SideEffects};

/// Inputs to one conflict probe at save time.
#[derive(Debug, Clone)]
pub struct SaveProbe {
    pub user_id: String,
    pub file_id: String,
    pub storage_kind: StorageKind,
    /// Version currently observed at the vendor.
    pub observed_version_id: String,
    /// Version the client saw when it began editing. Empty when the client
    /// did not supply one.
    pub base_change_id: String,
}

/// Session-side context for resolving a conflict.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: String,
    pub session_id: String,
    pub client_kind: ClientKind,
    /// The caller already knows the editing session is gone.
    pub caller_signals_expired: bool,
    /// Identity of the other editor, when known.
    pub modifier_name: Option<String>,
}

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// TTL for sessions the resolver creates on conflict copies.
    pub session_ttl_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 3_600,
        }
    }
}

/// Vendor-independent conflict detection and resolution.
pub struct ConflictResolver {
    versions: Arc<dyn VersionStore>,
    sessions: Arc<dyn SessionStore>,
    copy_writer: Arc<dyn CopyWriter>,
    side_effects: SideEffects,
    config: ResolverConfig,
}

impl ConflictResolver {
    pub fn new(
        versions: Arc<dyn VersionStore>,
        sessions: Arc<dyn SessionStore>,
        copy_writer: Arc<dyn CopyWriter>,
        side_effects: SideEffects,
        config: ResolverConfig,
    ) -> Self {
        Self {
            versions,
            sessions,
            copy_writer,
            side_effects,
            config,
        }
    }

    /// Decide whether a save diverged from the version its author based
    /// their edit on.
    ///
    /// A non-empty `base_change_id` is authoritative and compared exactly
    /// (case-sensitive) against the observed version. Otherwise the stored
    /// version marker decides; missing evidence means no conflict. Every
    /// branch emits one audit record, whose failure never changes the result.
    #[instrument(skip(self), level = "debug")]
    pub async fn detect_conflict(&self, probe: &SaveProbe) -> bool {
        let conflicted = if !probe.base_change_id.is_empty() {
            probe.base_change_id != probe.observed_version_id
        } else {
            self.detect_from_marker(probe).await
        };

        self.side_effects.send(SideEffect::Audit(AuditEvent::ConflictProbe {
            actor: probe.user_id.clone(),
            file_id: probe.file_id.clone(),
            storage_kind: probe.storage_kind,
            conflicted,
            at: Utc::now(),
        }));

        conflicted
    }

    async fn detect_from_marker(&self, probe: &SaveProbe) -> bool {
        let marker = match self
            .versions
            .last_version(&probe.file_id, probe.storage_kind)
            .await
        {
            Ok(marker) => marker,
            Err(e) => {
                // Indeterminate evidence is never surfaced as a conflict.
                warn!(
                    "Version store read failed for file {}: {}; treating as no conflict",
                    probe.file_id, e
                );
                return false;
            }
        };

        let stored = marker.and_then(|m| m.version_id);
        match stored {
            Some(stored) => stored != probe.observed_version_id,
            None => {
                if probe.storage_kind.exposes_version_ids() {
                    warn!(
                        "No stored version id for file {} on {:?}; unexpected for this storage kind",
                        probe.file_id, probe.storage_kind
                    );
                } else {
                    debug!(
                        "No stored version id for file {} on {:?}; expected for this storage kind",
                        probe.file_id, probe.storage_kind
                    );
                }
                false
            }
        }
    }

    /// Divert a conflicted save into a new copy beside the original.
    ///
    /// Only the vendor-delegated content write can fail the call; session
    /// reconciliation and notifications are best-effort because the user's
    /// data is already durable by then.
    #[instrument(skip(self, new_content), level = "debug", fields(file_id = %original.file_id))]
    pub async fn resolve(
        &self,
        original: &OriginalFile,
        new_content: &ContentRef,
        reason: ConflictReason,
        ctx: &SessionContext,
    ) -> Result<ConflictOutcome, StoreError> {
        let new_name = conflict_name(&original.name, Utc::now().timestamp_millis());

        let copy = self
            .copy_writer
            .persist_copy(original, &new_name, new_content)
            .await?;

        if let Err(e) = self
            .reconcile_sessions(original, &copy.new_file_id, ctx)
            .await
        {
            warn!(
                "Session reconciliation failed for file {} -> {}: {}; save already durable",
                original.file_id, copy.new_file_id, e
            );
        }

        let session_expired = ctx.caller_signals_expired || reason.implies_expired_session();
        let outcome = ConflictOutcome {
            original_file_id: original.file_id.clone(),
            new_file_id: copy.new_file_id.clone(),
            old_name: original.name.clone(),
            new_name: new_name.clone(),
            reason,
            modifier_name: ctx.modifier_name.clone(),
            session_expired,
            same_folder: copy.same_folder,
        };

        self.emit_outcome_effects(&outcome, ctx);
        Ok(outcome)
    }

    /// Session reconciliation, branching on whether the caller already saw
    /// the session expire and on the client's embedded-editor membership.
    async fn reconcile_sessions(
        &self,
        original: &OriginalFile,
        new_file_id: &str,
        ctx: &SessionContext,
    ) -> Result<(), StoreError> {
        if ctx.caller_signals_expired {
            // Native embedded editors re-open their own sessions.
            if !ctx.client_kind.is_native_embedded() {
                self.sessions
                    .create(EditSession {
                        file_id: new_file_id.to_string(),
                        session_id: ctx.session_id.clone(),
                        mode: Some(SessionMode::Edit),
                        ttl_secs: self.config.session_ttl_secs,
                    })
                    .await?;
            }

            // The stale session on the original is only removed when nobody
            // can still be editing through it.
            if let Some(old) = self.sessions.get(&original.file_id, &ctx.session_id).await? {
                match old.mode {
                    Some(SessionMode::View) | None => {
                        self.sessions
                            .delete(&original.file_id, &ctx.session_id)
                            .await?;
                    }
                    Some(SessionMode::Edit) => {}
                }
            }
        } else if ctx.client_kind.is_native_embedded() {
            self.sessions
                .downgrade(&original.file_id, &ctx.session_id)
                .await?;
        } else {
            self.sessions
                .transfer(&original.file_id, &ctx.session_id, new_file_id)
                .await?;
        }
        Ok(())
    }

    fn emit_outcome_effects(&self, outcome: &ConflictOutcome, ctx: &SessionContext) {
        self.side_effects
            .send(SideEffect::Audit(AuditEvent::ConflictResolved {
                actor: ctx.user_id.clone(),
                original_file_id: outcome.original_file_id.clone(),
                new_file_id: outcome.new_file_id.clone(),
                old_name: outcome.old_name.clone(),
                new_name: outcome.new_name.clone(),
                reason: outcome.reason,
                session_expired: outcome.session_expired,
                at: Utc::now(),
            }));

        if outcome.reason == ConflictReason::UnsharedOrDeleted {
            self.side_effects.send(SideEffect::MarkRecentInaccessible {
                user_id: ctx.user_id.clone(),
                file_id: outcome.original_file_id.clone(),
            });
        }

        self.side_effects.send(SideEffect::Notify(SaveFailedNotice {
            user_id: ctx.user_id.clone(),
            old_name: outcome.old_name.clone(),
            new_name: outcome.new_name.clone(),
            reason: outcome.reason,
            same_folder: outcome.same_folder,
            other_editor: outcome.modifier_name.clone(),
        }));
    }

    /// Drain the side-effect queue; see [`SideEffects::settle`].
    pub async fn settle_side_effects(&self) {
        self.side_effects.settle().await;
    }
}
