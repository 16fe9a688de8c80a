// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Dual-target saving: immediate local write-through plus a debounced remote write.
//!
//! Every submit bumps a generation counter and arms a debounce timer for that generation. A
//! timer only writes if its generation is still the newest when it fires, so rapid submits
//! collapse into one trailing write. Remote writes hold a FIFO lock and always take the newest
//! pending scene, so the server never sees an older scene after a newer one.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::save_status::{ChannelState, SaveChannel, SaveEvent};
use super::{LocalStore, SnapshotApi};
use crate::model::{AccountId, Scene};

#[derive(Debug, Default)]
struct Pending {
    generation: u64,
    write: Option<PendingWrite>,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct PendingWrite {
    scene: Scene,
    diagram_name: Option<String>,
}

struct RemoteTarget {
    api: Arc<dyn SnapshotApi>,
    account_id: AccountId,
}

struct PipelineInner {
    local: Arc<dyn LocalStore>,
    remote: Option<RemoteTarget>,
    events: mpsc::Sender<SaveEvent>,
    debounce: Duration,
    pending: Mutex<Pending>,
    local_lock: tokio::sync::Mutex<()>,
    remote_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct SavePipeline {
    inner: Arc<PipelineInner>,
}

impl std::fmt::Debug for SavePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavePipeline")
            .field("account_id", &self.inner.remote.as_ref().map(|remote| &remote.account_id))
            .field("debounce", &self.inner.debounce)
            .finish_non_exhaustive()
    }
}

impl SavePipeline {
    /// A pipeline for a signed-in account: local write-through plus remote writes.
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn SnapshotApi>,
        account_id: AccountId,
        events: mpsc::Sender<SaveEvent>,
        debounce: Duration,
    ) -> Self {
        Self::build(local, Some(RemoteTarget { api: remote, account_id }), events, debounce)
    }

    /// A pipeline for an anonymous editor; only the local target is written.
    pub fn local_only(local: Arc<dyn LocalStore>, events: mpsc::Sender<SaveEvent>) -> Self {
        Self::build(local, None, events, Duration::ZERO)
    }

    fn build(
        local: Arc<dyn LocalStore>,
        remote: Option<RemoteTarget>,
        events: mpsc::Sender<SaveEvent>,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                local,
                remote,
                events,
                debounce,
                pending: Mutex::new(Pending::default()),
                local_lock: tokio::sync::Mutex::new(()),
                remote_lock: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn is_local_only(&self) -> bool {
        self.inner.remote.is_none()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.pending().write.is_some()
    }

    /// Saves `scene` locally now and schedules the remote write.
    pub async fn submit(&self, scene: Scene, diagram_name: Option<String>) {
        self.inner.write_local(&scene).await;
        if self.inner.remote.is_some() && !self.inner.cancel.is_cancelled() {
            self.schedule(scene, diagram_name);
        }
    }

    fn schedule(&self, scene: Scene, diagram_name: Option<String>) {
        let mut pending = self.inner.pending();
        pending.generation += 1;
        pending.write = Some(PendingWrite { scene, diagram_name });
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let generation = pending.generation;
        let inner = Arc::clone(&self.inner);
        pending.timer = Some(tokio::spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {}
                _ = tokio::time::sleep(inner.debounce) => {
                    inner.disarm(generation);
                    inner.write_remote(Some(generation)).await;
                }
            }
        }));
    }

    /// Writes the pending scene, if any, without waiting for the debounce. Returns `false` only
    /// when a remote write was attempted and failed.
    pub async fn flush(&self) -> bool {
        {
            let mut pending = self.inner.pending();
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
        }
        self.inner.write_remote(None).await
    }

    /// Cancels any debounce timer and flushes what is pending. Later submits are local-only.
    pub async fn shutdown(&self) -> bool {
        self.inner.cancel.cancel();
        self.flush().await
    }
}

impl PipelineInner {
    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The timer for `generation` has fired; keep it from being aborted mid-write.
    fn disarm(&self, generation: u64) {
        let mut pending = self.pending();
        if pending.generation == generation {
            pending.timer = None;
        }
    }

    async fn emit(&self, channel: SaveChannel, state: ChannelState) {
        // The aggregator may be gone during shutdown.
        let _ = self.events.send(SaveEvent::new(channel, state)).await;
    }

    async fn write_local(&self, scene: &Scene) {
        let _order = self.local_lock.lock().await;
        self.emit(SaveChannel::Local, ChannelState::Saving).await;
        match self.local.save(scene).await {
            Ok(()) => self.emit(SaveChannel::Local, ChannelState::Saved).await,
            Err(err) => {
                tracing::warn!(error = %err, "local save failed");
                self.emit(SaveChannel::Local, ChannelState::Error).await;
            }
        }
    }

    /// Takes the pending write (only if it still belongs to `generation`, when given) and
    /// sends it.
    async fn write_remote(&self, generation: Option<u64>) -> bool {
        let Some(remote) = &self.remote else {
            return true;
        };
        let _order = self.remote_lock.lock().await;

        let write = {
            let mut pending = self.pending();
            match generation {
                Some(generation) if pending.generation != generation => None,
                _ => pending.write.take(),
            }
        };
        let Some(PendingWrite { mut scene, diagram_name }) = write else {
            return true;
        };

        self.emit(SaveChannel::Remote, ChannelState::Saving).await;
        if scene.files().is_empty() {
            match remote.api.load_latest(&remote.account_id).await {
                Ok(Some(stored)) => {
                    let kept = scene.preserve_attachments_from(&stored.scene);
                    if kept > 0 {
                        tracing::debug!(
                            account = %remote.account_id,
                            kept,
                            "kept stored attachments"
                        );
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        account = %remote.account_id,
                        error = %err,
                        "could not fetch stored attachments; saving without them"
                    );
                }
            }
        }

        match remote.api.save_latest(&remote.account_id, &scene, diagram_name.as_deref()).await {
            Ok(()) => {
                self.emit(SaveChannel::Remote, ChannelState::Saved).await;
                true
            }
            Err(err) => {
                tracing::warn!(account = %remote.account_id, error = %err, "remote save failed");
                self.emit(SaveChannel::Remote, ChannelState::Error).await;
                false
            }
        }
    }
}

impl Drop for PipelineInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
