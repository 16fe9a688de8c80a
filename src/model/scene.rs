// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A binary attachment referenced by scene elements (usually an embedded image).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryFile {
    pub mime_type: String,
    #[serde(rename = "dataURL")]
    pub data_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

impl BinaryFile {
    pub fn new(mime_type: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self { mime_type: mime_type.into(), data_url: data_url.into(), created: None }
    }
}

/// The editor payload: an element list, application state and keyed attachments.
///
/// Elements and app state are opaque JSON; only the element count and the attachment keys are
/// ever inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    elements: Vec<Value>,
    #[serde(default)]
    app_state: Map<String, Value>,
    #[serde(default)]
    files: BTreeMap<String, BinaryFile>,
}

impl Scene {
    pub fn new(elements: Vec<Value>, app_state: Map<String, Value>) -> Self {
        Self { elements, app_state, files: BTreeMap::new() }
    }

    pub fn with_files(mut self, files: BTreeMap<String, BinaryFile>) -> Self {
        self.files = files;
        self
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn app_state(&self) -> &Map<String, Value> {
        &self.app_state
    }

    pub fn files(&self) -> &BTreeMap<String, BinaryFile> {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut BTreeMap<String, BinaryFile> {
        &mut self.files
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// A scene with no elements. Attachments alone do not make a scene worth snapshotting.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Unions `stored` attachments into this scene when it carries none of its own.
    ///
    /// Returns the number of attachments carried over. A scene that already has attachments
    /// is left untouched.
    pub fn preserve_attachments_from(&mut self, stored: &Scene) -> usize {
        if !self.files.is_empty() {
            return 0;
        }
        let mut carried = 0;
        for (file_id, file) in &stored.files {
            if file.data_url.is_empty() {
                continue;
            }
            self.files.insert(file_id.clone(), file.clone());
            carried += 1;
        }
        carried
    }
}

/// The most recent remotely saved scene of an account.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestSnapshot {
    pub scene: Scene,
    pub diagram_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}
