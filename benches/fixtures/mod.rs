// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

#![allow(dead_code)]

// Shared deterministic benchmark fixtures (no RNG).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};

use easel::clock::ManualClock;
use easel::config::ServerConfig;
use easel::model::{AccountId, BinaryFile, DiagramId, NewVersion, Scene};
use easel::store::{DataDir, Store};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(prefix: &str) -> Self {
        let pid = std::process::id();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut path = std::env::temp_dir();
        path.push(format!("easel_bench_{prefix}_{pid}_{nanos}_{counter}"));
        std::fs::create_dir_all(&path).expect("create temp dir");

        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Case {
    /// 4 diagrams x 25 versions of 40 elements.
    Small,
    /// 10 diagrams x 100 versions of 200 elements, one attachment each.
    Medium,
}

impl Case {
    fn shape(self) -> (usize, usize, usize, usize) {
        match self {
            Self::Small => (4, 25, 40, 0),
            Self::Medium => (10, 100, 200, 1),
        }
    }
}

pub fn account() -> AccountId {
    AccountId::new("bench-account").expect("valid account id")
}

pub fn diagram(index: usize) -> DiagramId {
    DiagramId::new(format!("diagram-{index:03}")).expect("valid diagram id")
}

pub fn scene(elements: usize, attachments: usize) -> Scene {
    let elements = (0..elements)
        .map(|i| {
            json!({
                "id": format!("el-{i:05}"),
                "type": "rectangle",
                "x": (i * 13) % 997,
                "y": (i * 7) % 613,
                "width": 120,
                "height": 80,
            })
        })
        .collect::<Vec<Value>>();
    let mut app_state = Map::new();
    app_state.insert("viewBackgroundColor".to_owned(), Value::from("#ffffff"));
    let mut scene = Scene::new(elements, app_state);
    for i in 0..attachments {
        scene.files_mut().insert(
            format!("file-{i:03}"),
            BinaryFile::new("image/png", "data:image/png;base64,iVBORw0KGgo="),
        );
    }
    scene
}

/// A store filled according to `case`. Every version gets its own second on the manual clock
/// so listing order is fully determined by `created_at`.
pub fn populated_store(case: Case, data_dir: Option<DataDir>) -> Store {
    let (diagrams, versions, elements, attachments) = case.shape();
    let clock = ManualClock::default();
    let store = Store::new(data_dir, ServerConfig::default(), Arc::new(clock.clone()))
        .expect("open bench store");
    let account = account();
    for d in 0..diagrams {
        let diagram_id = diagram(d);
        for v in 0..versions {
            let meta = NewVersion::manual(format!("v{v}")).named(Some(format!("Diagram {d}")));
            store
                .create_version(&account, &diagram_id, scene(elements, attachments), meta)
                .expect("create version");
            clock.advance(chrono::Duration::seconds(1));
        }
    }
    store
}
