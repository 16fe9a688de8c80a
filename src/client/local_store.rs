// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The editor's local save target.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::ClientError;
use crate::model::Scene;
use crate::store::DataDir;

#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn save(&self, scene: &Scene) -> Result<(), ClientError>;

    async fn load(&self) -> Result<Option<Scene>, ClientError>;
}

/// Keeps the working scene as `local/scene.json` inside a data directory.
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    dir: DataDir,
}

impl FileLocalStore {
    pub fn new(dir: DataDir) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &DataDir {
        &self.dir
    }
}

#[async_trait]
impl LocalStore for FileLocalStore {
    async fn save(&self, scene: &Scene) -> Result<(), ClientError> {
        let dir = self.dir.clone();
        let scene = scene.clone();
        tokio::task::spawn_blocking(move || dir.save_local_scene(&scene)).await??;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Scene>, ClientError> {
        let dir = self.dir.clone();
        Ok(tokio::task::spawn_blocking(move || dir.load_local_scene()).await??)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLocalStore {
    scene: Arc<Mutex<Option<Scene>>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Scene> {
        self.scene.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn save(&self, scene: &Scene) -> Result<(), ClientError> {
        *self.scene.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(scene.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Scene>, ClientError> {
        Ok(self.snapshot())
    }
}
