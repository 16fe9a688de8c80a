// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Version history rows, grouped per account.
//!
//! Mutating helpers operate on a detached copy of one account's rows (`&mut Vec<StoredVersion>`)
//! so the store can persist the result before committing it with [`VersionTable::replace`].
//! Scenes sit behind `Arc` so those copies stay cheap.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{
    AccountId, DiagramId, NewVersion, Scene, VersionId, VersionScope, VersionSnapshot,
    VersionSummary,
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredVersion {
    pub summary: VersionSummary,
    pub scene: Arc<Scene>,
}

impl StoredVersion {
    pub fn snapshot(&self) -> VersionSnapshot {
        VersionSnapshot { summary: self.summary.clone(), scene: (*self.scene).clone() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VersionTable {
    by_account: BTreeMap<AccountId, Vec<StoredVersion>>,
    next_id: u64,
}

impl VersionTable {
    /// Rebuilds the table from persisted rows. `next_id` never goes below `max(id) + 1`.
    pub fn from_accounts(
        accounts: impl IntoIterator<Item = (AccountId, Vec<StoredVersion>)>,
        persisted_next_id: u64,
    ) -> Self {
        let mut table = Self { by_account: BTreeMap::new(), next_id: persisted_next_id.max(1) };
        for (account_id, rows) in accounts {
            if let Some(max) = rows.iter().map(|row| row.summary.id.get()).max() {
                table.next_id = table.next_id.max(max + 1);
            }
            table.by_account.insert(account_id, rows);
        }
        table
    }

    pub fn rows(&self, account_id: &AccountId) -> &[StoredVersion] {
        self.by_account.get(account_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn detached_rows(&self, account_id: &AccountId) -> Vec<StoredVersion> {
        self.rows(account_id).to_vec()
    }

    pub fn replace(&mut self, account_id: &AccountId, rows: Vec<StoredVersion>) {
        if let Some(max) = rows.iter().map(|row| row.summary.id.get()).max() {
            self.next_id = self.next_id.max(max + 1);
        }
        if rows.is_empty() {
            self.by_account.remove(account_id);
        } else {
            self.by_account.insert(account_id.clone(), rows);
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn list(
        &self,
        account_id: &AccountId,
        scope: VersionScope<'_>,
        limit: usize,
    ) -> Vec<VersionSummary> {
        let mut rows = self
            .rows(account_id)
            .iter()
            .filter(|row| scope.matches(row.summary.diagram_id.as_ref()))
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| newest_first(&a.summary, &b.summary));
        rows.into_iter().take(limit).map(|row| row.summary.clone()).collect()
    }

    pub fn get(&self, account_id: &AccountId, version_id: VersionId) -> Option<&StoredVersion> {
        self.rows(account_id).iter().find(|row| row.summary.id == version_id)
    }

    /// Name carried by the newest version of `diagram_id`.
    pub fn diagram_name(&self, account_id: &AccountId, diagram_id: &DiagramId) -> Option<String> {
        self.rows(account_id)
            .iter()
            .filter(|row| row.summary.diagram_id.as_ref() == Some(diagram_id))
            .max_by(|a, b| newest_first(&b.summary, &a.summary))
            .and_then(|row| row.summary.diagram_name.clone())
    }

    /// Name of the account's newest named version, regardless of diagram.
    pub fn latest_named(&self, account_id: &AccountId) -> Option<String> {
        self.rows(account_id)
            .iter()
            .filter(|row| row.summary.diagram_name.is_some())
            .max_by(|a, b| newest_first(&b.summary, &a.summary))
            .and_then(|row| row.summary.diagram_name.clone())
    }
}

/// Orders by `created_at` descending, then by id descending.
fn newest_first(a: &VersionSummary, b: &VersionSummary) -> Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

pub fn next_version_number(rows: &[StoredVersion], diagram_id: &DiagramId) -> u32 {
    rows.iter()
        .filter(|row| row.summary.diagram_id.as_ref() == Some(diagram_id))
        .map(|row| row.summary.version_number)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

pub fn append(
    rows: &mut Vec<StoredVersion>,
    id: VersionId,
    diagram_id: &DiagramId,
    scene: Scene,
    meta: NewVersion,
    now: DateTime<Utc>,
) -> VersionSummary {
    let summary = VersionSummary {
        id,
        diagram_id: Some(diagram_id.clone()),
        version_number: next_version_number(rows, diagram_id),
        element_count: scene.element_count(),
        diagram_name: normalize_name(meta.diagram_name),
        note: meta.note.filter(|note| !note.trim().is_empty()),
        is_auto_save: meta.is_auto_save,
        created_at: now,
    };
    rows.push(StoredVersion { summary: summary.clone(), scene: Arc::new(scene) });
    summary
}

pub fn remove(rows: &mut Vec<StoredVersion>, version_id: VersionId) -> bool {
    let before = rows.len();
    rows.retain(|row| row.summary.id != version_id);
    rows.len() != before
}

pub fn remove_scope(rows: &mut Vec<StoredVersion>, scope: VersionScope<'_>) -> usize {
    let before = rows.len();
    rows.retain(|row| !scope.matches(row.summary.diagram_id.as_ref()));
    before - rows.len()
}

pub fn rename(
    rows: &mut [StoredVersion],
    diagram_id: &DiagramId,
    new_name: Option<String>,
) -> usize {
    let new_name = normalize_name(new_name);
    let mut updated = 0;
    for row in rows.iter_mut().filter(|row| row.summary.diagram_id.as_ref() == Some(diagram_id)) {
        row.summary.diagram_name = new_name.clone();
        updated += 1;
    }
    updated
}

/// Assigns `target` to every row that predates diagram ids.
pub fn migrate_legacy(rows: &mut [StoredVersion], target: &DiagramId) -> usize {
    let mut migrated = 0;
    for row in rows.iter_mut().filter(|row| row.summary.diagram_id.is_none()) {
        row.summary.diagram_id = Some(target.clone());
        migrated += 1;
    }
    migrated
}

fn normalize_name(name: Option<String>) -> Option<String> {
    name.map(|name| name.trim().to_owned()).filter(|name| !name.is_empty())
}
