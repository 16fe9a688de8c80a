// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Editor-side components.
//!
//! The remote surface is split into three object-safe traits ([`LeaseApi`], [`SnapshotApi`],
//! [`VersionApi`]) implemented both by [`http::HttpClient`] and directly by
//! [`Store`](crate::store::Store) for in-process use. Everything above them (lease manager,
//! save pipeline, history) only sees `Arc<dyn …>` handles.

pub mod auto_save;
pub mod history;
pub mod http;
pub mod in_process;
pub mod lease_manager;
pub mod local_store;
pub mod save_pipeline;
pub mod save_status;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;

use crate::codec::CodecError;
use crate::model::{
    AccountId, DiagramId, HolderId, LatestSnapshot, LeaseDecision, LeaseRequest, NewVersion,
    Scene, VersionId, VersionSnapshot, VersionSummary,
};
use crate::store::StoreError;

pub use auto_save::AutoSaver;
pub use history::{Editor, HistoryError, MemoryEditor, VersionHistory};
pub use http::HttpClient;
pub use lease_manager::{LeaseManager, LeaseState};
pub use local_store::{FileLocalStore, LocalStore, MemoryLocalStore};
pub use save_pipeline::SavePipeline;
pub use save_status::{
    ChannelState, SaveChannel, SaveEvent, SaveStatus, SaveStatusHandle, SaveStatusTracker,
    StatusSnapshot,
};
pub use session::{EditorSession, ReconcileChoice, SessionOptions};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid server URL `{url}`")]
    InvalidBaseUrl { url: String },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}: {message}")]
    Status { url: String, status: u16, message: String },
    #[error("unreadable response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[async_trait]
pub trait LeaseApi: Send + Sync {
    async fn claim(&self, request: &LeaseRequest) -> Result<LeaseDecision, ClientError>;

    async fn heartbeat(&self, request: &LeaseRequest) -> Result<LeaseDecision, ClientError>;

    /// Unconditionally hands the lease to `request.holder_id`.
    async fn transfer(&self, request: &LeaseRequest) -> Result<(), ClientError>;

    async fn release(&self, account_id: &AccountId, holder_id: &HolderId)
        -> Result<bool, ClientError>;
}

#[async_trait]
pub trait SnapshotApi: Send + Sync {
    async fn save_latest(
        &self,
        account_id: &AccountId,
        scene: &Scene,
        diagram_name: Option<&str>,
    ) -> Result<(), ClientError>;

    /// `Ok(None)` when the account has never saved.
    async fn load_latest(&self, account_id: &AccountId)
        -> Result<Option<LatestSnapshot>, ClientError>;
}

#[async_trait]
pub trait VersionApi: Send + Sync {
    async fn create_version(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        scene: &Scene,
        meta: NewVersion,
    ) -> Result<VersionSummary, ClientError>;

    async fn list_versions(
        &self,
        account_id: &AccountId,
        diagram_id: Option<&DiagramId>,
    ) -> Result<Vec<VersionSummary>, ClientError>;

    async fn get_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<Option<VersionSnapshot>, ClientError>;

    async fn delete_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<bool, ClientError>;

    async fn delete_versions(
        &self,
        account_id: &AccountId,
        diagram_id: Option<&DiagramId>,
    ) -> Result<usize, ClientError>;

    async fn rename_diagram(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        new_name: Option<&str>,
    ) -> Result<usize, ClientError>;

    async fn diagram_name(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
    ) -> Result<Option<String>, ClientError>;

    async fn migrate_legacy(
        &self,
        account_id: &AccountId,
        target: &DiagramId,
    ) -> Result<usize, ClientError>;
}

/// Everything a signed-in editor talks to.
pub trait RemoteApi: LeaseApi + SnapshotApi + VersionApi {}

impl<T: LeaseApi + SnapshotApi + VersionApi> RemoteApi for T {}
