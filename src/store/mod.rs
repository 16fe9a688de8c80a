// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Server-side persistence: accounts, leases, latest snapshots and version history.
//!
//! [`Store`] keeps every table in memory behind one mutex and, when opened on a [`DataDir`],
//! writes the touched table to disk before committing a change. Each call is atomic on its
//! own; nothing spans calls.

pub mod data_dir;
pub mod leases;
pub mod versions;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

pub use data_dir::{DataDir, LoadedTables, StoreError, WriteDurability};
pub use leases::LeaseTable;
pub use versions::{StoredVersion, VersionTable};

use crate::clock::{SharedClock, SystemClock};
use crate::config::ServerConfig;
use crate::model::{
    AccountId, ActiveLease, DiagramId, HolderId, LatestSnapshot, LeaseDecision, LeaseRequest,
    NewVersion, Scene, VersionId, VersionScope, VersionSnapshot, VersionSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRecord {
    pub first_seen_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, AccountRecord>,
    leases: LeaseTable,
    latest: BTreeMap<AccountId, LatestSnapshot>,
    versions: VersionTable,
}

#[derive(Debug)]
struct StoreInner {
    tables: Mutex<Tables>,
    data_dir: Option<DataDir>,
    clock: SharedClock,
    config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn new(
        data_dir: Option<DataDir>,
        config: ServerConfig,
        clock: SharedClock,
    ) -> Result<Self, StoreError> {
        let tables = match &data_dir {
            Some(dir) => {
                let loaded = dir.load()?;
                tracing::info!(
                    root = %dir.root().display(),
                    accounts = loaded.accounts.len(),
                    leases = loaded.leases.len(),
                    "loaded data directory"
                );
                Tables {
                    accounts: loaded.accounts,
                    leases: loaded.leases,
                    latest: loaded.latest,
                    versions: VersionTable::from_accounts(loaded.versions, loaded.next_version_id),
                }
            }
            None => Tables {
                versions: VersionTable::from_accounts(std::iter::empty(), 1),
                ..Tables::default()
            },
        };

        Ok(Self {
            inner: Arc::new(StoreInner { tables: Mutex::new(tables), data_dir, clock, config }),
        })
    }

    pub fn in_memory(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tables: Mutex::new(Tables {
                    versions: VersionTable::from_accounts(std::iter::empty(), 1),
                    ..Tables::default()
                }),
                data_dir: None,
                clock: Arc::new(SystemClock),
                config,
            }),
        }
    }

    pub fn open(data_dir: DataDir, config: ServerConfig) -> Result<Self, StoreError> {
        Self::new(Some(data_dir), config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn data_dir(&self) -> Option<&DataDir> {
        self.inner.data_dir.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Tables are only replaced after a successful write, so a panic mid-call cannot leave
        // them half-updated.
        self.inner.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(
        &self,
        write: impl FnOnce(&DataDir) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        match &self.inner.data_dir {
            Some(dir) => write(dir),
            None => Ok(()),
        }
    }

    /// Records the account on first sight. Returns `true` when it was new.
    pub fn touch_account(&self, account_id: &AccountId) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        if tables.accounts.contains_key(account_id) {
            return Ok(false);
        }

        let mut accounts = tables.accounts.clone();
        accounts.insert(account_id.clone(), AccountRecord { first_seen_at: self.now() });
        self.persist(|dir| dir.save_accounts(&accounts))?;
        tables.accounts = accounts;
        tracing::info!(account = %account_id, "registered account");
        Ok(true)
    }

    pub fn account(&self, account_id: &AccountId) -> Option<AccountRecord> {
        self.lock().accounts.get(account_id).copied()
    }

    pub fn active_lease(&self, account_id: &AccountId) -> Option<ActiveLease> {
        self.lock().leases.get(account_id).cloned()
    }

    pub fn claim(&self, request: &LeaseRequest) -> Result<LeaseDecision, StoreError> {
        self.update_lease(request, "claim", LeaseTable::claim)
    }

    pub fn heartbeat(&self, request: &LeaseRequest) -> Result<LeaseDecision, StoreError> {
        self.update_lease(request, "heartbeat", LeaseTable::heartbeat)
    }

    fn update_lease(
        &self,
        request: &LeaseRequest,
        op: &'static str,
        apply: fn(&mut LeaseTable, &LeaseRequest, DateTime<Utc>) -> LeaseDecision,
    ) -> Result<LeaseDecision, StoreError> {
        let mut tables = self.lock();
        let mut leases = tables.leases.clone();
        let decision = apply(&mut leases, request, self.now());

        match &decision {
            LeaseDecision::Granted => {
                self.persist(|dir| dir.save_leases(&leases))?;
                tables.leases = leases;
                tracing::debug!(
                    op,
                    account = %request.account_id,
                    holder = %request.holder_id,
                    diagram = %request.diagram_id,
                    "lease granted"
                );
            }
            LeaseDecision::Denied { current_holder } => {
                tracing::debug!(
                    op,
                    account = %request.account_id,
                    holder = %request.holder_id,
                    current = ?current_holder.as_ref().map(HolderId::as_str),
                    "lease denied"
                );
            }
        }
        Ok(decision)
    }

    /// Hands the lease to `request.holder_id` whoever holds it now.
    pub fn transfer(&self, request: &LeaseRequest) -> Result<ActiveLease, StoreError> {
        let mut tables = self.lock();
        let previous = tables.leases.get(&request.account_id).map(|row| row.holder_id.clone());
        let mut leases = tables.leases.clone();
        let row = leases.transfer(request, self.now());
        self.persist(|dir| dir.save_leases(&leases))?;
        tables.leases = leases;
        tracing::info!(
            account = %request.account_id,
            from = ?previous.as_ref().map(HolderId::as_str),
            to = %request.holder_id,
            "lease transferred"
        );
        Ok(row)
    }

    pub fn release(
        &self,
        account_id: &AccountId,
        holder_id: &HolderId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let mut leases = tables.leases.clone();
        if !leases.release(account_id, holder_id) {
            tracing::debug!(account = %account_id, holder = %holder_id, "nothing to release");
            return Ok(false);
        }
        self.persist(|dir| dir.save_leases(&leases))?;
        tables.leases = leases;
        tracing::info!(account = %account_id, holder = %holder_id, "lease released");
        Ok(true)
    }

    /// Removes leases whose holder stopped heartbeating more than the lease timeout ago.
    pub fn sweep_expired(&self) -> Result<Vec<ActiveLease>, StoreError> {
        let mut tables = self.lock();
        let mut leases = tables.leases.clone();
        let expired =
            leases.sweep_expired(self.now(), self.inner.config.lease.timeout_delta());
        if expired.is_empty() {
            return Ok(expired);
        }
        self.persist(|dir| dir.save_leases(&leases))?;
        tables.leases = leases;
        for row in &expired {
            tracing::info!(account = %row.account_id, holder = %row.holder_id, "lease expired");
        }
        Ok(expired)
    }

    pub fn save_latest(
        &self,
        account_id: &AccountId,
        scene: Scene,
        diagram_name: Option<String>,
    ) -> Result<LatestSnapshot, StoreError> {
        let mut tables = self.lock();
        let snapshot = LatestSnapshot {
            scene,
            diagram_name: diagram_name.filter(|name| !name.trim().is_empty()),
            updated_at: self.now(),
        };
        self.persist(|dir| dir.save_latest(account_id, &snapshot))?;
        tables.latest.insert(account_id.clone(), snapshot.clone());
        tracing::debug!(
            account = %account_id,
            elements = snapshot.scene.element_count(),
            files = snapshot.scene.files().len(),
            "saved latest snapshot"
        );
        Ok(snapshot)
    }

    /// The latest snapshot; an unnamed one borrows the name of the newest named version.
    pub fn load_latest(&self, account_id: &AccountId) -> Option<LatestSnapshot> {
        let tables = self.lock();
        let mut snapshot = tables.latest.get(account_id).cloned()?;
        if snapshot.diagram_name.is_none() {
            snapshot.diagram_name = tables.versions.latest_named(account_id);
        }
        Some(snapshot)
    }

    pub fn create_version(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        scene: Scene,
        meta: NewVersion,
    ) -> Result<VersionSummary, StoreError> {
        let mut tables = self.lock();
        let id = VersionId::new(tables.versions.next_id());
        let mut rows = tables.versions.detached_rows(account_id);
        let summary = versions::append(&mut rows, id, diagram_id, scene, meta, self.now());

        self.persist(|dir| {
            dir.save_counters(id.get() + 1)?;
            dir.save_versions(account_id, &rows)
        })?;
        tables.versions.replace(account_id, rows);

        tracing::info!(
            account = %account_id,
            diagram = %diagram_id,
            version = summary.version_number,
            auto = summary.is_auto_save,
            "created version"
        );
        Ok(summary)
    }

    pub fn list_versions(
        &self,
        account_id: &AccountId,
        scope: VersionScope<'_>,
    ) -> Vec<VersionSummary> {
        self.lock().versions.list(account_id, scope, self.inner.config.version_page_size)
    }

    pub fn get_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Option<VersionSnapshot> {
        self.lock().versions.get(account_id, version_id).map(StoredVersion::snapshot)
    }

    pub fn delete_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let mut rows = tables.versions.detached_rows(account_id);
        if !versions::remove(&mut rows, version_id) {
            return Ok(false);
        }
        self.persist(|dir| dir.save_versions(account_id, &rows))?;
        tables.versions.replace(account_id, rows);
        tracing::info!(account = %account_id, version = %version_id, "deleted version");
        Ok(true)
    }

    pub fn delete_versions(
        &self,
        account_id: &AccountId,
        scope: VersionScope<'_>,
    ) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        let mut rows = tables.versions.detached_rows(account_id);
        let removed = versions::remove_scope(&mut rows, scope);
        if removed == 0 {
            return Ok(0);
        }
        self.persist(|dir| dir.save_versions(account_id, &rows))?;
        tables.versions.replace(account_id, rows);
        tracing::info!(
            account = %account_id,
            diagram = ?scope.diagram_id().map(DiagramId::as_str),
            removed,
            "deleted versions"
        );
        Ok(removed)
    }

    /// Back-fills `new_name` onto every version of the diagram. Blank names clear it.
    pub fn rename_diagram(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        new_name: Option<String>,
    ) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        let mut rows = tables.versions.detached_rows(account_id);
        let updated = versions::rename(&mut rows, diagram_id, new_name);
        if updated > 0 {
            self.persist(|dir| dir.save_versions(account_id, &rows))?;
            tables.versions.replace(account_id, rows);
        }
        tracing::info!(account = %account_id, diagram = %diagram_id, updated, "renamed diagram");
        Ok(updated)
    }

    pub fn diagram_name(&self, account_id: &AccountId, diagram_id: &DiagramId) -> Option<String> {
        self.lock().versions.diagram_name(account_id, diagram_id)
    }

    /// Moves versions recorded without a diagram id under `target`.
    pub fn migrate_legacy(
        &self,
        account_id: &AccountId,
        target: &DiagramId,
    ) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        let mut rows = tables.versions.detached_rows(account_id);
        let migrated = versions::migrate_legacy(&mut rows, target);
        if migrated > 0 {
            self.persist(|dir| dir.save_versions(account_id, &rows))?;
            tables.versions.replace(account_id, rows);
            tracing::info!(
                account = %account_id,
                diagram = %target,
                migrated,
                "migrated legacy versions"
            );
        }
        Ok(migrated)
    }
}
