// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! JSON bodies exchanged over HTTP. Shared by the server handlers and the HTTP client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::SceneRecord;
use crate::model::{AccountId, DiagramId, HolderId, VersionId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseBody {
    pub account_id: Option<AccountId>,
    pub diagram_id: Option<DiagramId>,
    pub holder_id: Option<HolderId>,
    #[serde(default)]
    pub diagram_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    pub account_id: Option<AccountId>,
    pub diagram_id: Option<DiagramId>,
    pub new_holder_id: Option<HolderId>,
    #[serde(default)]
    pub diagram_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseBody {
    pub account_id: Option<AccountId>,
    pub holder_id: Option<HolderId>,
}

/// Claim and heartbeat answer. Contention is a normal `200` with `isActive: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseResponse {
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_holder_id: Option<HolderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub is_active: bool,
    pub holder_id: HolderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub success: bool,
    pub released: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLatestBody {
    #[serde(flatten)]
    pub scene: SceneRecord,
    #[serde(default)]
    pub diagram_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestResponse {
    #[serde(flatten)]
    pub scene: SceneRecord,
    #[serde(default)]
    pub diagram_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionBody {
    #[serde(flatten)]
    pub scene: SceneRecord,
    pub diagram_id: Option<DiagramId>,
    #[serde(default)]
    pub is_auto_save: bool,
    #[serde(default)]
    pub diagram_name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramQuery {
    #[serde(default)]
    pub diagram_id: Option<DiagramId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVersionResponse {
    pub success: bool,
    pub id: VersionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVersionsResponse {
    pub success: bool,
    pub count: usize,
    pub diagram_id: Option<DiagramId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameBody {
    pub diagram_id: Option<DiagramId>,
    #[serde(default)]
    pub new_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResponse {
    pub success: bool,
    pub updated: usize,
    pub diagram_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramNameResponse {
    pub diagram_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateBody {
    pub diagram_id: Option<DiagramId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateResponse {
    pub count: usize,
    pub diagram_id: DiagramId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
