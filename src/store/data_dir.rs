// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::leases::LeaseTable;
use super::versions::StoredVersion;
use super::AccountRecord;
use crate::model::{AccountId, ActiveLease, LatestSnapshot, Scene, VersionSnapshot, VersionSummary};

const TMP_PREFIX: &str = ".easel.tmp.";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("json error at {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path:?} holds records of account {account_id:?} under the wrong file name")]
    AccountMismatch { path: PathBuf, account_id: String },
    #[error("invalid relative path for {field}: {value:?}")]
    InvalidRelativePath { field: &'static str, value: PathBuf },
    #[error("path {path:?} is outside the data directory {root:?}")]
    PathOutsideDataDir { root: PathBuf, path: PathBuf },
    #[error("refusing to follow symlink at {path:?}")]
    SymlinkRefused { path: PathBuf },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteDurability {
    /// Temp file plus atomic rename, no fsync.
    #[default]
    BestEffort,

    /// Also fsyncs the written file and its directory. Exact guarantees depend on the
    /// platform and filesystem.
    Durable,
}

/// Everything read back from a data directory at startup.
#[derive(Debug, Default)]
pub struct LoadedTables {
    pub accounts: BTreeMap<AccountId, AccountRecord>,
    pub leases: LeaseTable,
    pub latest: BTreeMap<AccountId, LatestSnapshot>,
    pub versions: Vec<(AccountId, Vec<StoredVersion>)>,
    pub next_version_id: u64,
}

/// On-disk home of the server tables.
///
/// ```text
/// <root>/accounts.json
/// <root>/leases.json
/// <root>/counters.json
/// <root>/latest/<account>.json
/// <root>/versions/<account>.json
/// ```
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    durability: WriteDurability,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), durability: WriteDurability::default() }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.root.join("accounts.json")
    }

    pub fn leases_path(&self) -> PathBuf {
        self.root.join("leases.json")
    }

    pub fn counters_path(&self) -> PathBuf {
        self.root.join("counters.json")
    }

    pub fn latest_path(&self, account_id: &AccountId) -> PathBuf {
        self.root
            .join("latest")
            .join(format!("{}.json", encode_persisted_id_segment(account_id.as_str())))
    }

    pub fn versions_path(&self, account_id: &AccountId) -> PathBuf {
        self.root
            .join("versions")
            .join(format!("{}.json", encode_persisted_id_segment(account_id.as_str())))
    }

    /// Editor-side copy of the working scene. Not part of the server tables.
    pub fn local_scene_path(&self) -> PathBuf {
        self.root.join("local").join("scene.json")
    }

    /// Reads every table. A missing directory or file loads as empty.
    pub fn load(&self) -> Result<LoadedTables, StoreError> {
        let mut loaded = LoadedTables::default();

        if let Some(file) = read_json_if_exists::<AccountsFileJson>(&self.accounts_path())? {
            loaded.accounts = file
                .accounts
                .into_iter()
                .map(|account| {
                    let record = AccountRecord { first_seen_at: account.first_seen_at };
                    (account.account_id, record)
                })
                .collect();
        }

        if let Some(file) = read_json_if_exists::<LeasesFileJson>(&self.leases_path())? {
            loaded.leases = LeaseTable::from_rows(file.leases);
        }

        if let Some(file) = read_json_if_exists::<CountersJson>(&self.counters_path())? {
            loaded.next_version_id = file.next_version_id;
        }

        for path in list_json_files(&self.root.join("latest"))? {
            let Some(file) = read_json_if_exists::<LatestFileJson>(&path)? else {
                continue;
            };
            self.check_owner(&path, &file.account_id, self.latest_path(&file.account_id))?;
            let snapshot = LatestSnapshot {
                scene: file.scene,
                diagram_name: file.diagram_name,
                updated_at: file.updated_at,
            };
            loaded.latest.insert(file.account_id, snapshot);
        }

        for path in list_json_files(&self.root.join("versions"))? {
            let Some(file) = read_json_if_exists::<VersionsFileJson>(&path)? else {
                continue;
            };
            self.check_owner(&path, &file.account_id, self.versions_path(&file.account_id))?;
            let rows = file
                .versions
                .into_iter()
                .map(|row| StoredVersion { summary: row.summary, scene: Arc::new(row.scene) })
                .collect();
            loaded.versions.push((file.account_id, rows));
        }

        Ok(loaded)
    }

    pub fn save_accounts(
        &self,
        accounts: &BTreeMap<AccountId, AccountRecord>,
    ) -> Result<(), StoreError> {
        let file = AccountsFileRef {
            accounts: accounts
                .iter()
                .map(|(account_id, record)| AccountRef {
                    account_id,
                    first_seen_at: record.first_seen_at,
                })
                .collect(),
        };
        self.write_json(&self.accounts_path(), &file)
    }

    pub fn save_leases(&self, leases: &LeaseTable) -> Result<(), StoreError> {
        let file = LeasesFileRef { leases: leases.rows().collect() };
        self.write_json(&self.leases_path(), &file)
    }

    pub fn save_counters(&self, next_version_id: u64) -> Result<(), StoreError> {
        self.write_json(&self.counters_path(), &CountersJson { next_version_id })
    }

    pub fn save_latest(
        &self,
        account_id: &AccountId,
        snapshot: &LatestSnapshot,
    ) -> Result<(), StoreError> {
        let file = LatestFileRef {
            account_id,
            scene: &snapshot.scene,
            diagram_name: snapshot.diagram_name.as_deref(),
            updated_at: snapshot.updated_at,
        };
        self.write_json(&self.latest_path(account_id), &file)
    }

    pub fn save_local_scene(&self, scene: &Scene) -> Result<(), StoreError> {
        self.write_json(&self.local_scene_path(), scene)
    }

    pub fn load_local_scene(&self) -> Result<Option<Scene>, StoreError> {
        read_json_if_exists(&self.local_scene_path())
    }

    /// Writes one account's version rows in `(diagram, created)` order; an empty set removes
    /// the file.
    pub fn save_versions(
        &self,
        account_id: &AccountId,
        rows: &[StoredVersion],
    ) -> Result<(), StoreError> {
        let path = self.versions_path(account_id);
        if rows.is_empty() {
            return remove_file_if_exists(&path);
        }

        let mut ordered = rows.iter().collect::<Vec<_>>();
        ordered.sort_by(|a, b| {
            a.summary
                .diagram_id
                .cmp(&b.summary.diagram_id)
                .then_with(|| a.summary.created_at.cmp(&b.summary.created_at))
                .then_with(|| a.summary.id.cmp(&b.summary.id))
        });

        let file = VersionsFileRef {
            account_id,
            versions: ordered
                .into_iter()
                .map(|row| VersionRowRef { summary: &row.summary, scene: &row.scene })
                .collect(),
        };
        self.write_json_compact(&path, &file)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let mut json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        json.push(b'\n');
        write_atomic_in_data_dir(&self.root, path, &json, self.durability)
    }

    // Version files carry whole scenes and are rewritten on every append.
    fn write_json_compact<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let mut json = serde_json::to_vec(value).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        json.push(b'\n');
        write_atomic_in_data_dir(&self.root, path, &json, self.durability)
    }

    fn check_owner(
        &self,
        path: &Path,
        account_id: &AccountId,
        expected_path: PathBuf,
    ) -> Result<(), StoreError> {
        if expected_path.file_name() == path.file_name() {
            return Ok(());
        }
        Err(StoreError::AccountMismatch {
            path: path.to_path_buf(),
            account_id: account_id.to_string(),
        })
    }
}

/// Makes an id safe to use as a file name on every platform.
///
/// Ids that are already safe pass through unchanged; anything else becomes `~` followed by the
/// lowercase hex of its UTF-8 bytes.
pub(crate) fn encode_persisted_id_segment(segment: &str) -> String {
    if !needs_safe_filename_encoding(segment) {
        return segment.to_owned();
    }

    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(1 + segment.len().saturating_mul(2));
    out.push('~');
    for &b in segment.as_bytes() {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

fn needs_safe_filename_encoding(segment: &str) -> bool {
    if segment.starts_with('~') || segment.starts_with('.') {
        return true;
    }
    if segment.ends_with(' ') || segment.ends_with('.') {
        return true;
    }

    let base = segment.split('.').next().unwrap_or(segment);
    if is_windows_device_name(base) {
        return true;
    }

    segment.chars().any(|ch| {
        matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
            || ch <= '\u{1f}'
            || ch == '\u{7f}'
    })
}

fn is_windows_device_name(base: &str) -> bool {
    let base = base.to_ascii_uppercase();
    match base.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => base
            .strip_prefix("COM")
            .or_else(|| base.strip_prefix("LPT"))
            .is_some_and(|num| num.len() == 1 && matches!(num.as_bytes()[0], b'1'..=b'9')),
    }
}

// On-disk record shapes and safe filesystem writes.
include!("data_dir/helpers.rs");
