// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The lease table: at most one [`ActiveLease`] per account.
//!
//! Keying rows by account makes the one-row invariant structural. Every operation here is a
//! pure state transition; persistence and locking live in [`super::Store`].

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::model::{AccountId, ActiveLease, HolderId, LeaseDecision, LeaseRequest};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseTable {
    rows: BTreeMap<AccountId, ActiveLease>,
}

impl LeaseTable {
    pub fn from_rows(rows: impl IntoIterator<Item = ActiveLease>) -> Self {
        let mut table = Self::default();
        for row in rows {
            // Last row for an account wins if a hand-edited file carries duplicates.
            table.rows.insert(row.account_id.clone(), row);
        }
        table
    }

    pub fn get(&self, account_id: &AccountId) -> Option<&ActiveLease> {
        self.rows.get(account_id)
    }

    pub fn rows(&self) -> impl Iterator<Item = &ActiveLease> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Grants when the account has no lease or `request.holder_id` already holds it.
    pub fn claim(&mut self, request: &LeaseRequest, now: DateTime<Utc>) -> LeaseDecision {
        match self.rows.get_mut(&request.account_id) {
            None => {
                self.rows.insert(request.account_id.clone(), lease_from_request(request, now));
                LeaseDecision::Granted
            }
            Some(row) if row.is_held_by(&request.holder_id) => {
                refresh(row, request, now);
                LeaseDecision::Granted
            }
            Some(row) => LeaseDecision::Denied { current_holder: Some(row.holder_id.clone()) },
        }
    }

    /// Like [`Self::claim`] but never creates a row.
    pub fn heartbeat(&mut self, request: &LeaseRequest, now: DateTime<Utc>) -> LeaseDecision {
        match self.rows.get_mut(&request.account_id) {
            None => LeaseDecision::Denied { current_holder: None },
            Some(row) if row.is_held_by(&request.holder_id) => {
                refresh(row, request, now);
                LeaseDecision::Granted
            }
            Some(row) => LeaseDecision::Denied { current_holder: Some(row.holder_id.clone()) },
        }
    }

    /// Unconditional upsert. Two racing transfers both succeed; the later write wins.
    pub fn transfer(&mut self, request: &LeaseRequest, now: DateTime<Utc>) -> ActiveLease {
        let row = lease_from_request(request, now);
        self.rows.insert(request.account_id.clone(), row.clone());
        row
    }

    /// Removes the account's lease only when `holder_id` holds it.
    pub fn release(&mut self, account_id: &AccountId, holder_id: &HolderId) -> bool {
        match self.rows.get(account_id) {
            Some(row) if row.is_held_by(holder_id) => {
                self.rows.remove(account_id);
                true
            }
            _ => false,
        }
    }

    /// Drops every row whose last heartbeat is older than `now - timeout`.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<ActiveLease> {
        let expired = self
            .rows
            .values()
            .filter(|row| row.is_expired(now, timeout))
            .map(|row| row.account_id.clone())
            .collect::<Vec<_>>();

        expired.into_iter().filter_map(|account_id| self.rows.remove(&account_id)).collect()
    }
}

fn lease_from_request(request: &LeaseRequest, now: DateTime<Utc>) -> ActiveLease {
    ActiveLease {
        account_id: request.account_id.clone(),
        diagram_id: request.diagram_id.clone(),
        diagram_name: request.diagram_name.clone(),
        holder_id: request.holder_id.clone(),
        last_heartbeat_at: now,
    }
}

fn refresh(row: &mut ActiveLease, request: &LeaseRequest, now: DateTime<Utc>) {
    row.last_heartbeat_at = now;
    row.diagram_id = request.diagram_id.clone();
    row.diagram_name = request.diagram_name.clone();
}
