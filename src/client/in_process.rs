// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Client traits served straight from a [`Store`] living in the same process.
//!
//! Skips auth and the wire codec; scenes handed in are trusted as already validated.

use async_trait::async_trait;

use super::{ClientError, LeaseApi, SnapshotApi, VersionApi};
use crate::model::{
    AccountId, DiagramId, HolderId, LatestSnapshot, LeaseDecision, LeaseRequest, NewVersion,
    Scene, VersionId, VersionScope, VersionSnapshot, VersionSummary,
};
use crate::store::Store;

#[async_trait]
impl LeaseApi for Store {
    async fn claim(&self, request: &LeaseRequest) -> Result<LeaseDecision, ClientError> {
        Ok(Store::claim(self, request)?)
    }

    async fn heartbeat(&self, request: &LeaseRequest) -> Result<LeaseDecision, ClientError> {
        Ok(Store::heartbeat(self, request)?)
    }

    async fn transfer(&self, request: &LeaseRequest) -> Result<(), ClientError> {
        Store::transfer(self, request)?;
        Ok(())
    }

    async fn release(
        &self,
        account_id: &AccountId,
        holder_id: &HolderId,
    ) -> Result<bool, ClientError> {
        Ok(Store::release(self, account_id, holder_id)?)
    }
}

#[async_trait]
impl SnapshotApi for Store {
    async fn save_latest(
        &self,
        account_id: &AccountId,
        scene: &Scene,
        diagram_name: Option<&str>,
    ) -> Result<(), ClientError> {
        Store::save_latest(self, account_id, scene.clone(), diagram_name.map(str::to_owned))?;
        Ok(())
    }

    async fn load_latest(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<LatestSnapshot>, ClientError> {
        Ok(Store::load_latest(self, account_id))
    }
}

#[async_trait]
impl VersionApi for Store {
    async fn create_version(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        scene: &Scene,
        meta: NewVersion,
    ) -> Result<VersionSummary, ClientError> {
        Ok(Store::create_version(self, account_id, diagram_id, scene.clone(), meta)?)
    }

    async fn list_versions(
        &self,
        account_id: &AccountId,
        diagram_id: Option<&DiagramId>,
    ) -> Result<Vec<VersionSummary>, ClientError> {
        Ok(Store::list_versions(self, account_id, VersionScope::from_option(diagram_id)))
    }

    async fn get_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<Option<VersionSnapshot>, ClientError> {
        Ok(Store::get_version(self, account_id, version_id))
    }

    async fn delete_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<bool, ClientError> {
        Ok(Store::delete_version(self, account_id, version_id)?)
    }

    async fn delete_versions(
        &self,
        account_id: &AccountId,
        diagram_id: Option<&DiagramId>,
    ) -> Result<usize, ClientError> {
        Ok(Store::delete_versions(self, account_id, VersionScope::from_option(diagram_id))?)
    }

    async fn rename_diagram(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        new_name: Option<&str>,
    ) -> Result<usize, ClientError> {
        Ok(Store::rename_diagram(self, account_id, diagram_id, new_name.map(str::to_owned))?)
    }

    async fn diagram_name(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
    ) -> Result<Option<String>, ClientError> {
        Ok(Store::diagram_name(self, account_id, diagram_id))
    }

    async fn migrate_legacy(
        &self,
        account_id: &AccountId,
        target: &DiagramId,
    ) -> Result<usize, ClientError> {
        Ok(Store::migrate_legacy(self, account_id, target)?)
    }
}
