// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DiagramId, Scene, VersionId};

/// Version metadata as shown in a history list (no scene body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub id: VersionId,
    /// `None` only for rows written before diagrams had ids.
    #[serde(default)]
    pub diagram_id: Option<DiagramId>,
    pub version_number: u32,
    pub element_count: usize,
    #[serde(default)]
    pub diagram_name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub is_auto_save: bool,
    pub created_at: DateTime<Utc>,
}

/// A full, restorable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    #[serde(flatten)]
    pub summary: VersionSummary,
    #[serde(flatten)]
    pub scene: Scene,
}

impl VersionSnapshot {
    pub fn id(&self) -> VersionId {
        self.summary.id
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }
}

/// Optional metadata attached when a version is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewVersion {
    pub is_auto_save: bool,
    pub diagram_name: Option<String>,
    pub note: Option<String>,
}

impl NewVersion {
    pub fn manual(note: impl Into<String>) -> Self {
        Self { note: Some(note.into()), ..Self::default() }
    }

    pub fn auto_save() -> Self {
        Self { is_auto_save: true, ..Self::default() }
    }

    pub fn named(mut self, diagram_name: Option<String>) -> Self {
        self.diagram_name = diagram_name;
        self
    }
}

/// Scope selector for list/delete-all: one diagram or the whole account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionScope<'a> {
    Account,
    Diagram(&'a DiagramId),
}

impl<'a> VersionScope<'a> {
    pub fn from_option(diagram_id: Option<&'a DiagramId>) -> Self {
        match diagram_id {
            Some(diagram_id) => Self::Diagram(diagram_id),
            None => Self::Account,
        }
    }

    pub fn matches(&self, diagram_id: Option<&DiagramId>) -> bool {
        match self {
            Self::Account => true,
            Self::Diagram(wanted) => diagram_id == Some(*wanted),
        }
    }

    pub fn diagram_id(&self) -> Option<&'a DiagramId> {
        match self {
            Self::Account => None,
            Self::Diagram(diagram_id) => Some(diagram_id),
        }
    }
}
