// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Keeps this editor's claim on the account's write lease.
//!
//! One background loop per manager: claim until granted, then heartbeat every interval. Any
//! denial or failure drops the editor to [`LeaseState::Observing`], where the loop keeps
//! trying to claim. All lease round trips from one manager go through a single async mutex, so
//! they never overlap.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ClientError, LeaseApi};
use crate::model::{AccountId, DiagramId, HolderId, LeaseDecision, LeaseRequest};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LeaseState {
    /// Not started, or stopped.
    #[default]
    Inactive,
    /// This editor may write.
    Held,
    /// Another holder (if known) has the lease; this editor is read-only.
    Observing { current_holder: Option<HolderId> },
}

impl LeaseState {
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Held)
    }
}

#[derive(Debug, Clone)]
struct LeaseTarget {
    diagram_id: DiagramId,
    diagram_name: Option<String>,
}

struct ManagerInner {
    api: Arc<dyn LeaseApi>,
    account_id: AccountId,
    holder_id: HolderId,
    interval: Duration,
    target: Mutex<LeaseTarget>,
    state: watch::Sender<LeaseState>,
    round_trip: tokio::sync::Mutex<()>,
}

pub struct LeaseManager {
    inner: Arc<ManagerInner>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for LeaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseManager")
            .field("account_id", &self.inner.account_id)
            .field("holder_id", &self.inner.holder_id)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl LeaseManager {
    pub fn new(
        api: Arc<dyn LeaseApi>,
        account_id: AccountId,
        holder_id: HolderId,
        diagram_id: DiagramId,
        diagram_name: Option<String>,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(LeaseState::Inactive);
        Self {
            inner: Arc::new(ManagerInner {
                api,
                account_id,
                holder_id,
                interval,
                target: Mutex::new(LeaseTarget { diagram_id, diagram_name }),
                state,
                round_trip: tokio::sync::Mutex::new(()),
            }),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.inner.account_id
    }

    pub fn holder_id(&self) -> &HolderId {
        &self.inner.holder_id
    }

    pub fn state(&self) -> LeaseState {
        self.inner.state.borrow().clone()
    }

    pub fn is_held(&self) -> bool {
        self.inner.state.borrow().is_held()
    }

    pub fn subscribe(&self) -> watch::Receiver<LeaseState> {
        self.inner.state.subscribe()
    }

    pub fn diagram_id(&self) -> DiagramId {
        self.inner.target().diagram_id.clone()
    }

    /// Starts the claim/heartbeat loop. The first claim goes out immediately. Calling it
    /// again while running does nothing.
    pub fn start(&self) {
        let mut task = self.task_slot();
        if task.is_some() || self.cancel.is_cancelled() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(async move {
            loop {
                inner.tick().await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(inner.interval) => {}
                }
            }
        }));
    }

    /// Takes the lease from whoever holds it. `true` once this editor holds it.
    pub async fn take_control(&self) -> bool {
        let inner = &self.inner;
        let _serial = inner.round_trip.lock().await;
        let request = inner.request();
        match inner.api.transfer(&request).await {
            Ok(()) => {
                tracing::info!(
                    account = %inner.account_id,
                    holder = %inner.holder_id,
                    "took control"
                );
                inner.publish(LeaseState::Held);
                true
            }
            Err(err) => {
                tracing::warn!(account = %inner.account_id, error = %err, "transfer failed");
                false
            }
        }
    }

    /// Points the lease at another diagram. When held, the new target is sent right away.
    pub async fn retarget(&self, diagram_id: DiagramId, diagram_name: Option<String>) {
        *self.inner.target() = LeaseTarget { diagram_id, diagram_name };
        if self.is_held() {
            self.inner.tick().await;
        }
    }

    /// Updates only the diagram name carried by later round trips.
    pub fn set_diagram_name(&self, diagram_name: Option<String>) {
        self.inner.target().diagram_name = diagram_name;
    }

    /// Stops the loop and, when held, releases the lease. Release failures are logged only;
    /// the server sweep cleans up.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task_slot().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "lease loop ended abnormally");
            }
        }

        let inner = &self.inner;
        let _serial = inner.round_trip.lock().await;
        if inner.state.borrow().is_held() {
            match inner.api.release(&inner.account_id, &inner.holder_id).await {
                Ok(released) => {
                    tracing::info!(account = %inner.account_id, released, "released lease");
                }
                Err(err) => {
                    tracing::warn!(
                        account = %inner.account_id,
                        error = %err,
                        "lease release failed"
                    );
                }
            }
        }
        inner.publish(LeaseState::Inactive);
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for LeaseManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ManagerInner {
    fn target(&self) -> MutexGuard<'_, LeaseTarget> {
        self.target.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn request(&self) -> LeaseRequest {
        let target = self.target().clone();
        LeaseRequest::new(self.account_id.clone(), target.diagram_id, self.holder_id.clone())
            .with_diagram_name(target.diagram_name)
    }

    /// One round trip: heartbeat while held, claim otherwise.
    async fn tick(&self) {
        let _serial = self.round_trip.lock().await;
        let held = self.state.borrow().is_held();
        let request = self.request();
        let result: Result<LeaseDecision, ClientError> = if held {
            self.api.heartbeat(&request).await
        } else {
            self.api.claim(&request).await
        };

        let next = match result {
            Ok(LeaseDecision::Granted) => LeaseState::Held,
            Ok(LeaseDecision::Denied { current_holder }) => {
                if held {
                    tracing::warn!(
                        account = %self.account_id,
                        current = ?current_holder.as_ref().map(HolderId::as_str),
                        "lease lost"
                    );
                } else {
                    tracing::debug!(account = %self.account_id, "lease held elsewhere");
                }
                LeaseState::Observing { current_holder }
            }
            Err(err) => {
                tracing::warn!(account = %self.account_id, error = %err, "lease round trip failed");
                LeaseState::Observing { current_holder: None }
            }
        };
        self.publish(next);
    }

    fn publish(&self, next: LeaseState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}
