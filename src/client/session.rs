// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! One editor's wiring of lease, save pipeline, status, history and auto-save.
//!
//! A signed-in session claims the account's lease, saves locally and remotely, keeps version
//! history and auto-saves while it holds the lease. An anonymous session only saves locally.
//! [`EditorSession::sign_out`] tears everything down in order and waits for the status task.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::history::{NOTE_REMOTE_BEFORE_SIGN_IN, NOTE_SIGN_OUT};
use super::{
    AutoSaver, ClientError, Editor, LeaseManager, LeaseState, LocalStore, RemoteApi,
    SavePipeline, SaveStatusHandle, SaveStatusTracker, SnapshotApi, StatusSnapshot,
    VersionHistory,
};
use crate::clock::{SharedClock, SystemClock};
use crate::config::ClientTimings;
use crate::model::{AccountId, DiagramId, HolderId, LatestSnapshot, NewVersion};

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub timings: ClientTimings,
    /// Identity of this editor instance. Minted when absent.
    pub holder_id: Option<HolderId>,
    pub clock: SharedClock,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { timings: ClientTimings::default(), holder_id: None, clock: Arc::new(SystemClock) }
    }
}

/// What to do when both the editor and the server hold a scene at sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileChoice {
    /// Keep the editor's scene; the server's scene is kept as a version.
    KeepLocal,
    /// Replace the editor's scene with the server's.
    LoadRemote,
}

struct SignedIn {
    account_id: AccountId,
    remote: Arc<dyn SnapshotApi>,
    lease: Arc<LeaseManager>,
    history: Arc<VersionHistory>,
    auto_save: AutoSaver,
}

pub struct EditorSession {
    editor: Arc<dyn Editor>,
    local: Arc<dyn LocalStore>,
    pipeline: SavePipeline,
    status: SaveStatusHandle,
    signed_in: Option<SignedIn>,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("account_id", &self.account_id())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl EditorSession {
    /// Starts a signed-in session. The lease loop and auto-save start immediately, so this
    /// must run inside a tokio runtime.
    pub fn sign_in<R>(
        remote: Arc<R>,
        local: Arc<dyn LocalStore>,
        editor: Arc<dyn Editor>,
        account_id: AccountId,
        diagram_id: DiagramId,
        diagram_name: Option<String>,
        options: SessionOptions,
    ) -> Self
    where
        R: RemoteApi + 'static,
    {
        let timings = options.timings;
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let status =
            SaveStatusHandle::spawn(rx, SaveStatusTracker::from_timings(&timings), options.clock);

        let snapshots: Arc<dyn SnapshotApi> = remote.clone();
        let pipeline = SavePipeline::new(
            Arc::clone(&local),
            Arc::clone(&snapshots),
            account_id.clone(),
            events,
            timings.remote_debounce,
        );

        let holder_id = options.holder_id.unwrap_or_else(|| HolderId::mint("holder"));
        let lease = Arc::new(LeaseManager::new(
            remote.clone(),
            account_id.clone(),
            holder_id,
            diagram_id.clone(),
            diagram_name.clone(),
            timings.heartbeat_interval,
        ));
        lease.start();

        let history = Arc::new(
            VersionHistory::new(
                remote,
                account_id.clone(),
                Arc::clone(&editor),
                pipeline.clone(),
                diagram_id,
                diagram_name,
            )
            .with_lease(Arc::clone(&lease)),
        );
        let auto_save =
            AutoSaver::spawn(Arc::clone(&history), Arc::clone(&lease), timings.auto_save_interval);

        tracing::info!(account = %account_id, holder = %lease.holder_id(), "signed in");
        Self {
            editor,
            local,
            pipeline,
            status,
            signed_in: Some(SignedIn { account_id, remote: snapshots, lease, history, auto_save }),
        }
    }

    /// Starts a session without an account; scenes are saved locally only.
    pub fn anonymous(
        local: Arc<dyn LocalStore>,
        editor: Arc<dyn Editor>,
        options: SessionOptions,
    ) -> Self {
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let status = SaveStatusHandle::spawn(
            rx,
            SaveStatusTracker::from_timings(&options.timings),
            options.clock,
        );
        let pipeline = SavePipeline::local_only(Arc::clone(&local), events);
        Self { editor, local, pipeline, status, signed_in: None }
    }

    pub fn account_id(&self) -> Option<&AccountId> {
        self.signed_in.as_ref().map(|session| &session.account_id)
    }

    pub fn pipeline(&self) -> &SavePipeline {
        &self.pipeline
    }

    /// Version history; `None` for anonymous sessions.
    pub fn history(&self) -> Option<&Arc<VersionHistory>> {
        self.signed_in.as_ref().map(|session| &session.history)
    }

    pub fn lease(&self) -> Option<&Arc<LeaseManager>> {
        self.signed_in.as_ref().map(|session| &session.lease)
    }

    pub fn lease_state(&self) -> LeaseState {
        self.lease().map(|lease| lease.state()).unwrap_or_default()
    }

    /// Whether edits from this editor may be saved. Observers and previews are read-only.
    pub fn can_write(&self) -> bool {
        match &self.signed_in {
            Some(session) => session.history.can_write(),
            None => true,
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    /// Hands the editor's current scene to the save pipeline. Returns `false` without saving
    /// while the session is read-only.
    pub async fn changed(&self) -> bool {
        if !self.can_write() {
            tracing::debug!("change ignored while read-only");
            return false;
        }
        let diagram_name = self.history().and_then(|history| history.diagram_name());
        self.pipeline.submit(self.editor.scene(), diagram_name).await;
        true
    }

    pub async fn take_control(&self) -> bool {
        match self.lease() {
            Some(lease) => lease.take_control().await,
            None => false,
        }
    }

    /// Puts the locally saved scene back into the editor. `true` when there was one.
    pub async fn restore_local(&self) -> Result<bool, ClientError> {
        match self.local.load().await? {
            Some(scene) => {
                self.editor.apply_scene(scene);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Compares the editor with the server's latest scene after sign-in. An empty editor
    /// simply takes the server's scene. When both hold content the server's snapshot is
    /// returned and the caller decides through [`Self::reconcile`].
    pub async fn check_remote(&self) -> Result<Option<LatestSnapshot>, ClientError> {
        let Some(session) = &self.signed_in else {
            return Ok(None);
        };
        let Some(latest) = session.remote.load_latest(&session.account_id).await? else {
            return Ok(None);
        };
        if latest.scene.is_empty() {
            return Ok(None);
        }
        if self.editor.scene().is_empty() {
            tracing::info!(account = %session.account_id, "loaded remote scene");
            self.editor.apply_scene(latest.scene);
            return Ok(None);
        }
        Ok(Some(latest))
    }

    pub async fn reconcile(&self, remote: LatestSnapshot, choice: ReconcileChoice) {
        let Some(session) = &self.signed_in else {
            return;
        };
        match choice {
            ReconcileChoice::KeepLocal => {
                let meta =
                    NewVersion::manual(NOTE_REMOTE_BEFORE_SIGN_IN).named(remote.diagram_name);
                session.history.snapshot(&remote.scene, meta).await;
                self.pipeline.submit(self.editor.scene(), session.history.diagram_name()).await;
                self.pipeline.flush().await;
            }
            ReconcileChoice::LoadRemote => {
                self.editor.apply_scene(remote.scene.clone());
                self.pipeline.submit(remote.scene, remote.diagram_name).await;
            }
        }
        tracing::info!(account = %session.account_id, ?choice, "reconciled sign-in");
    }

    /// Ends the session. A lease holder stores a final version and flushes before releasing.
    pub async fn sign_out(self) {
        let Self { editor, local: _, pipeline, status, signed_in } = self;

        match signed_in {
            Some(session) => {
                session.auto_save.stop().await;
                if session.lease.is_held() && session.history.previewing().is_none() {
                    let scene = editor.scene();
                    if !scene.is_empty() {
                        session.history.snapshot(&scene, NewVersion::manual(NOTE_SIGN_OUT)).await;
                    }
                }
                let flushed = pipeline.shutdown().await;
                session.lease.stop().await;
                tracing::info!(account = %session.account_id, flushed, "signed out");
            }
            None => {
                pipeline.shutdown().await;
            }
        }

        drop(pipeline);
        status.join().await;
    }
}
