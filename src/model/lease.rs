// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, DiagramId, HolderId};

/// The single write-control row an account may have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLease {
    pub account_id: AccountId,
    pub diagram_id: DiagramId,
    #[serde(default)]
    pub diagram_name: Option<String>,
    pub holder_id: HolderId,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl ActiveLease {
    pub fn is_held_by(&self, holder_id: &HolderId) -> bool {
        &self.holder_id == holder_id
    }

    /// `true` once `now - last_heartbeat_at` exceeds `timeout`.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_heartbeat_at > timeout
    }
}

/// Parameters shared by claim, heartbeat and transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRequest {
    pub account_id: AccountId,
    pub diagram_id: DiagramId,
    pub holder_id: HolderId,
    pub diagram_name: Option<String>,
}

impl LeaseRequest {
    pub fn new(account_id: AccountId, diagram_id: DiagramId, holder_id: HolderId) -> Self {
        Self { account_id, diagram_id, holder_id, diagram_name: None }
    }

    pub fn with_diagram_name(mut self, diagram_name: Option<String>) -> Self {
        self.diagram_name = diagram_name;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseDecision {
    Granted,
    /// Another holder owns the lease, or (for heartbeats) no lease exists at all.
    Denied { current_holder: Option<HolderId> },
}

impl LeaseDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn current_holder(&self) -> Option<&HolderId> {
        match self {
            Self::Granted => None,
            Self::Denied { current_holder } => current_holder.as_ref(),
        }
    }
}
