// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Test doubles shared by the client test suites.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use super::save_status::SaveEvent;
use super::{ClientError, LeaseApi, LocalStore, SnapshotApi, VersionApi};
use crate::clock::ManualClock;
use crate::config::ServerConfig;
use crate::model::{
    AccountId, BinaryFile, DiagramId, HolderId, LatestSnapshot, LeaseDecision, LeaseRequest,
    NewVersion, Scene, VersionId, VersionSnapshot, VersionSummary,
};
use crate::store::{Store, StoreError};

pub(crate) fn account(raw: &str) -> AccountId {
    AccountId::new(raw).unwrap()
}

pub(crate) fn diagram(raw: &str) -> DiagramId {
    DiagramId::new(raw).unwrap()
}

pub(crate) fn holder(raw: &str) -> HolderId {
    HolderId::new(raw).unwrap()
}

/// A scene with `n` elements and no attachments.
pub(crate) fn scene(n: usize) -> Scene {
    let elements = (0..n).map(|i| json!({ "id": format!("el-{i}") })).collect();
    let app_state = json!({ "viewBackgroundColor": "#ffffff" }).as_object().cloned().unwrap();
    Scene::new(elements, app_state)
}

pub(crate) fn scene_with_files(n: usize, files: usize) -> Scene {
    let mut scene = scene(n);
    for i in 0..files {
        let file = BinaryFile::new("image/png", "data:image/png;base64,AAAA");
        scene.files_mut().insert(format!("file-{i}"), file);
    }
    scene
}

pub(crate) fn drain(events: &mut mpsc::Receiver<SaveEvent>) -> Vec<SaveEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

fn unavailable() -> ClientError {
    ClientError::Status {
        url: "fake://remote".to_owned(),
        status: 503,
        message: "unavailable".to_owned(),
    }
}

/// An in-process [`Store`] behind the client traits, with failure switches and call records.
pub(crate) struct FakeRemote {
    pub(crate) store: Store,
    pub(crate) clock: ManualClock,
    fail_leases: AtomicBool,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    fail_versions: AtomicBool,
    lease_delay: Mutex<Duration>,
    lease_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    saves: Mutex<Vec<Scene>>,
}

impl FakeRemote {
    pub(crate) fn new() -> Arc<Self> {
        let clock = ManualClock::default();
        let store = Store::new(None, ServerConfig::default(), Arc::new(clock.clone())).unwrap();
        Arc::new(Self {
            store,
            clock,
            fail_leases: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            fail_versions: AtomicBool::new(false),
            lease_delay: Mutex::new(Duration::ZERO),
            lease_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            saves: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn fail_leases(&self, fail: bool) {
        self.fail_leases.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_versions(&self, fail: bool) {
        self.fail_versions.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_lease_delay(&self, delay: Duration) {
        *self.lease_delay.lock().unwrap() = delay;
    }

    pub(crate) fn lease_calls(&self) -> usize {
        self.lease_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_concurrent_lease_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Element counts of every successful remote save, in order.
    pub(crate) fn saved_element_counts(&self) -> Vec<usize> {
        self.saves.lock().unwrap().iter().map(Scene::element_count).collect()
    }

    pub(crate) fn last_saved(&self) -> Option<Scene> {
        self.saves.lock().unwrap().last().cloned()
    }

    async fn lease_call<T>(
        &self,
        call: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, ClientError> {
        self.lease_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.lease_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = if self.fail_leases.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            call().map_err(ClientError::from)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn check_versions(&self) -> Result<(), ClientError> {
        if self.fail_versions.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LeaseApi for FakeRemote {
    async fn claim(&self, request: &LeaseRequest) -> Result<LeaseDecision, ClientError> {
        self.lease_call(|| self.store.claim(request)).await
    }

    async fn heartbeat(&self, request: &LeaseRequest) -> Result<LeaseDecision, ClientError> {
        self.lease_call(|| self.store.heartbeat(request)).await
    }

    async fn transfer(&self, request: &LeaseRequest) -> Result<(), ClientError> {
        self.lease_call(|| self.store.transfer(request).map(|_| ())).await
    }

    async fn release(
        &self,
        account_id: &AccountId,
        holder_id: &HolderId,
    ) -> Result<bool, ClientError> {
        self.lease_call(|| self.store.release(account_id, holder_id)).await
    }
}

#[async_trait]
impl SnapshotApi for FakeRemote {
    async fn save_latest(
        &self,
        account_id: &AccountId,
        scene: &Scene,
        diagram_name: Option<&str>,
    ) -> Result<(), ClientError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.store.save_latest(account_id, scene.clone(), diagram_name.map(str::to_owned))?;
        self.saves.lock().unwrap().push(scene.clone());
        Ok(())
    }

    async fn load_latest(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<LatestSnapshot>, ClientError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.store.load_latest(account_id))
    }
}

#[async_trait]
impl VersionApi for FakeRemote {
    async fn create_version(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        scene: &Scene,
        meta: NewVersion,
    ) -> Result<VersionSummary, ClientError> {
        self.check_versions()?;
        let summary = self.store.create_version(account_id, diagram_id, scene.clone(), meta)?;
        self.clock.advance(chrono::Duration::seconds(1));
        Ok(summary)
    }

    async fn list_versions(
        &self,
        account_id: &AccountId,
        diagram_id: Option<&DiagramId>,
    ) -> Result<Vec<VersionSummary>, ClientError> {
        self.check_versions()?;
        VersionApi::list_versions(&self.store, account_id, diagram_id).await
    }

    async fn get_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<Option<VersionSnapshot>, ClientError> {
        self.check_versions()?;
        Ok(self.store.get_version(account_id, version_id))
    }

    async fn delete_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<bool, ClientError> {
        self.check_versions()?;
        Ok(self.store.delete_version(account_id, version_id)?)
    }

    async fn delete_versions(
        &self,
        account_id: &AccountId,
        diagram_id: Option<&DiagramId>,
    ) -> Result<usize, ClientError> {
        self.check_versions()?;
        VersionApi::delete_versions(&self.store, account_id, diagram_id).await
    }

    async fn rename_diagram(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        new_name: Option<&str>,
    ) -> Result<usize, ClientError> {
        self.check_versions()?;
        Ok(self.store.rename_diagram(account_id, diagram_id, new_name.map(str::to_owned))?)
    }

    async fn diagram_name(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
    ) -> Result<Option<String>, ClientError> {
        self.check_versions()?;
        Ok(self.store.diagram_name(account_id, diagram_id))
    }

    async fn migrate_legacy(
        &self,
        account_id: &AccountId,
        target: &DiagramId,
    ) -> Result<usize, ClientError> {
        self.check_versions()?;
        Ok(self.store.migrate_legacy(account_id, target)?)
    }
}

/// A local target whose disk is always full.
pub(crate) struct FailingLocal;

#[async_trait]
impl LocalStore for FailingLocal {
    async fn save(&self, _scene: &Scene) -> Result<(), ClientError> {
        Err(StoreError::Io {
            path: PathBuf::from("local/scene.json"),
            source: std::io::Error::other("disk full"),
        }
        .into())
    }

    async fn load(&self) -> Result<Option<Scene>, ClientError> {
        Ok(None)
    }
}
