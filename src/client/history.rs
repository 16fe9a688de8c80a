// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Version history as the editor sees it: snapshots, preview, restore, rename and fork.
//!
//! Every operation that replaces the live scene fetches its target first, so a failed fetch
//! leaves the editor exactly as it was. Snapshot failures are logged and reported as `None`;
//! they never abort the surrounding operation.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{ClientError, LeaseManager, SavePipeline, VersionApi};
use crate::model::{
    AccountId, DiagramId, NewVersion, Scene, VersionId, VersionSnapshot, VersionSummary,
};

pub const NOTE_BEFORE_RENAME: &str = "Version before renaming diagram";
pub const NOTE_SIGN_OUT: &str = "Automatic save on sign-out";
pub const NOTE_NEW_DIAGRAM: &str = "Automatic save before new diagram";
pub const NOTE_REMOTE_BEFORE_SIGN_IN: &str = "Remote version kept at sign-in";

/// The live drawing surface.
pub trait Editor: Send + Sync {
    fn scene(&self) -> Scene;

    fn apply_scene(&self, scene: Scene);
}

/// An editor that is just a scene in memory. Useful headless and in tests.
#[derive(Debug, Default)]
pub struct MemoryEditor {
    scene: Mutex<Scene>,
}

impl MemoryEditor {
    pub fn new(scene: Scene) -> Self {
        Self { scene: Mutex::new(scene) }
    }
}

impl Editor for MemoryEditor {
    fn scene(&self) -> Scene {
        self.scene.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn apply_scene(&self, scene: Scene) {
        *self.scene.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = scene;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("version {0} not found")]
    NotFound(VersionId),
    #[error("read-only: another editor holds the lease or a version is being previewed")]
    ReadOnly,
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone)]
struct DiagramState {
    diagram_id: DiagramId,
    diagram_name: Option<String>,
}

#[derive(Debug)]
struct Preview {
    original: Scene,
    version_id: VersionId,
}

pub struct VersionHistory {
    api: Arc<dyn VersionApi>,
    account_id: AccountId,
    editor: Arc<dyn Editor>,
    pipeline: SavePipeline,
    lease: Option<Arc<LeaseManager>>,
    diagram: Mutex<DiagramState>,
    preview: Mutex<Option<Preview>>,
}

impl std::fmt::Debug for VersionHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionHistory")
            .field("account_id", &self.account_id)
            .field("diagram", &*self.diagram())
            .finish_non_exhaustive()
    }
}

impl VersionHistory {
    pub fn new(
        api: Arc<dyn VersionApi>,
        account_id: AccountId,
        editor: Arc<dyn Editor>,
        pipeline: SavePipeline,
        diagram_id: DiagramId,
        diagram_name: Option<String>,
    ) -> Self {
        Self {
            api,
            account_id,
            editor,
            pipeline,
            lease: None,
            diagram: Mutex::new(DiagramState { diagram_id, diagram_name }),
            preview: Mutex::new(None),
        }
    }

    /// Keeps `lease` pointed at the current diagram across forks and new diagrams.
    pub fn with_lease(mut self, lease: Arc<LeaseManager>) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn diagram_id(&self) -> DiagramId {
        self.diagram().diagram_id.clone()
    }

    pub fn diagram_name(&self) -> Option<String> {
        self.diagram().diagram_name.clone()
    }

    pub fn previewing(&self) -> Option<VersionId> {
        self.preview_slot().as_ref().map(|preview| preview.version_id)
    }

    /// Whether this editor may change the diagram: the lease, if any, is held and no version
    /// is being previewed.
    pub fn can_write(&self) -> bool {
        self.holds_lease() && self.previewing().is_none()
    }

    fn holds_lease(&self) -> bool {
        self.lease.as_ref().map_or(true, |lease| lease.is_held())
    }

    fn diagram(&self) -> MutexGuard<'_, DiagramState> {
        self.diagram.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn preview_slot(&self) -> MutexGuard<'_, Option<Preview>> {
        self.preview.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Versions of the current diagram, newest first. Empty when the server is unreachable.
    pub async fn list(&self) -> Vec<VersionSummary> {
        let diagram_id = self.diagram_id();
        match self.api.list_versions(&self.account_id, Some(&diagram_id)).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(account = %self.account_id, error = %err, "listing versions failed");
                Vec::new()
            }
        }
    }

    pub async fn create_version(&self, note: Option<String>) -> Option<VersionSummary> {
        let scene = self.editor.scene();
        self.snapshot(&scene, NewVersion { note, ..NewVersion::default() }).await
    }

    /// Auto-save snapshot; skipped for an empty scene.
    pub async fn create_auto_save(&self) -> Option<VersionSummary> {
        let scene = self.editor.scene();
        if scene.is_empty() {
            return None;
        }
        self.snapshot(&scene, NewVersion::auto_save()).await
    }

    /// Stores `scene` as a version of the current diagram under its current name.
    pub(crate) async fn snapshot(&self, scene: &Scene, meta: NewVersion) -> Option<VersionSummary> {
        let state = self.diagram().clone();
        let meta = NewVersion { diagram_name: meta.diagram_name.or(state.diagram_name), ..meta };
        match self.api.create_version(&self.account_id, &state.diagram_id, scene, meta).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                tracing::warn!(
                    account = %self.account_id,
                    diagram = %state.diagram_id,
                    error = %err,
                    "creating version failed"
                );
                None
            }
        }
    }

    async fn fetch(&self, version_id: VersionId) -> Result<VersionSnapshot, HistoryError> {
        self.api
            .get_version(&self.account_id, version_id)
            .await?
            .ok_or(HistoryError::NotFound(version_id))
    }

    /// Shows a version without touching history. The scene from before the first preview is
    /// kept so [`Self::cancel_preview`] can put it back.
    pub async fn preview(&self, version_id: VersionId) -> Result<(), HistoryError> {
        let version = self.fetch(version_id).await?;
        {
            let mut preview = self.preview_slot();
            let original = match preview.take() {
                Some(previous) => previous.original,
                None => self.editor.scene(),
            };
            *preview = Some(Preview { original, version_id });
        }
        self.editor.apply_scene(version.into_scene());
        tracing::debug!(account = %self.account_id, version = %version_id, "previewing version");
        Ok(())
    }

    /// Leaves preview and restores the live scene. `false` when nothing was previewed.
    pub fn cancel_preview(&self) -> bool {
        let Some(preview) = self.preview_slot().take() else {
            return false;
        };
        self.editor.apply_scene(preview.original);
        true
    }

    /// Replaces the live scene with a version. With `backup_current`, a non-empty live scene
    /// is first stored as a version of its own (skipped while previewing, since the editor is
    /// then showing a version rather than live work). Fails with [`HistoryError::ReadOnly`]
    /// unless the lease is held.
    pub async fn restore(
        &self,
        version_id: VersionId,
        backup_current: bool,
    ) -> Result<(), HistoryError> {
        if !self.holds_lease() {
            return Err(HistoryError::ReadOnly);
        }
        let version = self.fetch(version_id).await?;
        let was_previewing = self.preview_slot().take().is_some();

        if backup_current && !was_previewing {
            let current = self.editor.scene();
            if !current.is_empty() {
                self.snapshot(&current, NewVersion::default()).await;
            }
        }

        let scene = version.into_scene();
        self.editor.apply_scene(scene.clone());
        self.pipeline.submit(scene, self.diagram_name()).await;
        tracing::info!(account = %self.account_id, version = %version_id, "restored version");
        Ok(())
    }

    /// Starts a new diagram id under `new_name`, keeping the old history untouched. The scene
    /// is first stored under the old diagram and name.
    pub async fn fork_diagram(&self, new_name: &str) -> Result<DiagramId, HistoryError> {
        if !self.can_write() {
            return Err(HistoryError::ReadOnly);
        }
        let scene = self.editor.scene();
        if !scene.is_empty() {
            self.snapshot(&scene, NewVersion::manual(NOTE_BEFORE_RENAME)).await;
        }

        let new_name = normalize_name(Some(new_name));
        let diagram_id = DiagramId::mint("diagram");
        let previous = {
            let mut state = self.diagram();
            let previous = state.diagram_id.clone();
            state.diagram_id = diagram_id.clone();
            state.diagram_name = new_name.clone();
            previous
        };
        if let Some(lease) = &self.lease {
            lease.retarget(diagram_id.clone(), new_name.clone()).await;
        }

        tracing::info!(
            account = %self.account_id,
            from = %previous,
            to = %diagram_id,
            "forked diagram"
        );
        Ok(diagram_id)
    }

    /// Names the diagram. Renaming an already named diagram forks it, leaving the new
    /// diagram's history empty. Naming an unnamed one back-fills the name onto its history and
    /// stores a version carrying the name and `note`. Returns the new diagram id when a fork
    /// happened.
    pub async fn rename(
        &self,
        new_name: &str,
        note: Option<String>,
    ) -> Result<Option<DiagramId>, HistoryError> {
        if !self.can_write() {
            return Err(HistoryError::ReadOnly);
        }
        let name = normalize_name(Some(new_name));
        let current = self.diagram().clone();
        let scene = self.editor.scene();

        let forked = match (&current.diagram_name, &name) {
            (Some(old), Some(new)) if old != new => Some(self.fork_diagram(new).await?),
            _ => {
                self.api
                    .rename_diagram(&self.account_id, &current.diagram_id, name.as_deref())
                    .await?;
                self.diagram().diagram_name = name.clone();
                if let Some(lease) = &self.lease {
                    lease.set_diagram_name(name.clone());
                }
                let meta = NewVersion { note, ..NewVersion::default() }.named(name.clone());
                self.snapshot(&scene, meta).await;
                None
            }
        };

        self.pipeline.submit(scene, name).await;
        Ok(forked)
    }

    /// Saves what is there, then starts over with an empty unnamed diagram.
    pub async fn new_diagram(&self) -> Result<DiagramId, HistoryError> {
        if !self.holds_lease() {
            return Err(HistoryError::ReadOnly);
        }
        self.pipeline.flush().await;
        self.cancel_preview();

        let scene = self.editor.scene();
        if !scene.is_empty() {
            self.snapshot(&scene, NewVersion::manual(NOTE_NEW_DIAGRAM)).await;
        }

        let diagram_id = DiagramId::mint("diagram");
        *self.diagram() = DiagramState { diagram_id: diagram_id.clone(), diagram_name: None };
        self.editor.apply_scene(Scene::default());
        if let Some(lease) = &self.lease {
            lease.retarget(diagram_id.clone(), None).await;
        }
        self.pipeline.submit(Scene::default(), None).await;

        tracing::info!(account = %self.account_id, diagram = %diagram_id, "started new diagram");
        Ok(diagram_id)
    }

    /// Picks up the name stored with the newest version of the current diagram, if any.
    pub async fn refresh_name(&self) -> Option<String> {
        let diagram_id = self.diagram_id();
        match self.api.diagram_name(&self.account_id, &diagram_id).await {
            Ok(Some(name)) => {
                self.diagram().diagram_name = Some(name.clone());
                if let Some(lease) = &self.lease {
                    lease.set_diagram_name(Some(name.clone()));
                }
                Some(name)
            }
            Ok(None) => self.diagram_name(),
            Err(err) => {
                tracing::debug!(
                    account = %self.account_id,
                    error = %err,
                    "diagram name lookup failed"
                );
                self.diagram_name()
            }
        }
    }

    pub async fn delete_version(&self, version_id: VersionId) -> bool {
        match self.api.delete_version(&self.account_id, version_id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(account = %self.account_id, error = %err, "deleting version failed");
                false
            }
        }
    }

    /// Deletes every version of the current diagram.
    pub async fn delete_all(&self) -> usize {
        let diagram_id = self.diagram_id();
        match self.api.delete_versions(&self.account_id, Some(&diagram_id)).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(
                    account = %self.account_id,
                    error = %err,
                    "deleting versions failed"
                );
                0
            }
        }
    }

    /// Files versions saved before diagram ids existed under the current diagram.
    pub async fn adopt_legacy(&self) -> usize {
        let diagram_id = self.diagram_id();
        match self.api.migrate_legacy(&self.account_id, &diagram_id).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(account = %self.account_id, error = %err, "legacy migration failed");
                0
            }
        }
    }
}

fn normalize_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim).filter(|name| !name.is_empty()).map(str::to_owned)
}
