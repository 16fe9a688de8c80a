// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! reqwest client for the HTTP surface in [`crate::server`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::{ClientError, LeaseApi, SnapshotApi, VersionApi};
use crate::codec::{decode_scene, encode_scene};
use crate::model::{
    AccountId, DiagramId, HolderId, LatestSnapshot, LeaseDecision, LeaseRequest, NewVersion,
    Scene, VersionId, VersionSnapshot, VersionSummary,
};
use crate::server::types::{
    CreateVersionBody, DeleteVersionsResponse, DiagramNameResponse, ErrorBody, LatestResponse,
    LeaseBody, LeaseResponse, MigrateBody, MigrateResponse, ReleaseBody, ReleaseResponse,
    RenameBody, RenameResponse, SaveLatestBody, TransferBody, TransferResponse,
};

#[derive(Debug, Clone)]
pub struct HttpClient {
    base: Url,
    http: Client,
    token: Option<String>,
}

impl HttpClient {
    /// `token` is sent as a bearer token on every request; the server treats it as the account
    /// identity.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientError::InvalidBaseUrl { url: base_url.to_owned() })?;
        let http = Client::builder().timeout(request_timeout).build().map_err(ClientError::Build)?;
        Ok(Self { base, http, token })
    }

    /// A client whose token is the account id itself.
    pub fn for_account(
        base_url: &str,
        account_id: &AccountId,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        Self::new(base_url, Some(account_id.to_string()), request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `true` when `/health` answers with a success status.
    pub async fn is_available(&self) -> bool {
        match self.request(Method::GET, &["health"]).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "health check failed");
                false
            }
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.http.request(method, self.url(segments));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send_raw(builder).await?;
        let url = response.url().to_string();
        response.json::<T>().await.map_err(|source| ClientError::Decode { url, source })
    }

    /// Like [`Self::send`], mapping `404` to `Ok(None)`.
    async fn send_optional<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>, ClientError> {
        match self.send(builder).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn send_raw(&self, builder: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let (client, request) = builder.build_split();
        let request = request.map_err(|source| ClientError::Transport {
            url: self.base.to_string(),
            source,
        })?;
        let url = request.url().to_string();

        let response = client
            .execute(request)
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_owned(),
        };
        Err(ClientError::Status { url, status: status.as_u16(), message })
    }
}

fn lease_body(request: &LeaseRequest) -> LeaseBody {
    LeaseBody {
        account_id: Some(request.account_id.clone()),
        diagram_id: Some(request.diagram_id.clone()),
        holder_id: Some(request.holder_id.clone()),
        diagram_name: request.diagram_name.clone(),
    }
}

fn lease_decision(response: LeaseResponse) -> LeaseDecision {
    if response.is_active {
        LeaseDecision::Granted
    } else {
        LeaseDecision::Denied { current_holder: response.active_holder_id }
    }
}

#[async_trait]
impl LeaseApi for HttpClient {
    async fn claim(&self, request: &LeaseRequest) -> Result<LeaseDecision, ClientError> {
        let builder = self.request(Method::POST, &["sessions", "claim"]).json(&lease_body(request));
        self.send::<LeaseResponse>(builder).await.map(lease_decision)
    }

    async fn heartbeat(&self, request: &LeaseRequest) -> Result<LeaseDecision, ClientError> {
        let builder =
            self.request(Method::POST, &["sessions", "heartbeat"]).json(&lease_body(request));
        self.send::<LeaseResponse>(builder).await.map(lease_decision)
    }

    async fn transfer(&self, request: &LeaseRequest) -> Result<(), ClientError> {
        let body = TransferBody {
            account_id: Some(request.account_id.clone()),
            diagram_id: Some(request.diagram_id.clone()),
            new_holder_id: Some(request.holder_id.clone()),
            diagram_name: request.diagram_name.clone(),
        };
        let builder = self.request(Method::POST, &["sessions", "transfer"]).json(&body);
        self.send::<TransferResponse>(builder).await.map(|_| ())
    }

    async fn release(
        &self,
        account_id: &AccountId,
        holder_id: &HolderId,
    ) -> Result<bool, ClientError> {
        let body = ReleaseBody {
            account_id: Some(account_id.clone()),
            holder_id: Some(holder_id.clone()),
        };
        let builder = self.request(Method::POST, &["sessions", "release"]).json(&body);
        self.send::<ReleaseResponse>(builder).await.map(|response| response.released)
    }
}

#[async_trait]
impl SnapshotApi for HttpClient {
    async fn save_latest(
        &self,
        account_id: &AccountId,
        scene: &Scene,
        diagram_name: Option<&str>,
    ) -> Result<(), ClientError> {
        let body = SaveLatestBody {
            scene: encode_scene(scene),
            diagram_name: diagram_name.map(str::to_owned),
        };
        let builder = self.request(Method::PUT, &["diagrams", account_id.as_str()]).json(&body);
        self.send::<LatestResponse>(builder).await.map(|_| ())
    }

    async fn load_latest(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<LatestSnapshot>, ClientError> {
        let builder = self.request(Method::GET, &["diagrams", account_id.as_str()]);
        let Some(response) = self.send_optional::<LatestResponse>(builder).await? else {
            return Ok(None);
        };
        Ok(Some(LatestSnapshot {
            scene: decode_scene(response.scene)?,
            diagram_name: response.diagram_name,
            updated_at: response.updated_at,
        }))
    }
}

#[async_trait]
impl VersionApi for HttpClient {
    async fn create_version(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        scene: &Scene,
        meta: NewVersion,
    ) -> Result<VersionSummary, ClientError> {
        let body = CreateVersionBody {
            scene: encode_scene(scene),
            diagram_id: Some(diagram_id.clone()),
            is_auto_save: meta.is_auto_save,
            diagram_name: meta.diagram_name,
            note: meta.note,
        };
        let builder =
            self.request(Method::POST, &["diagrams", account_id.as_str(), "versions"]).json(&body);
        self.send(builder).await
    }

    async fn list_versions(
        &self,
        account_id: &AccountId,
        diagram_id: Option<&DiagramId>,
    ) -> Result<Vec<VersionSummary>, ClientError> {
        let mut builder = self.request(Method::GET, &["diagrams", account_id.as_str(), "versions"]);
        if let Some(diagram_id) = diagram_id {
            builder = builder.query(&[("diagramId", diagram_id.as_str())]);
        }
        self.send(builder).await
    }

    async fn get_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<Option<VersionSnapshot>, ClientError> {
        let id = version_id.to_string();
        let builder =
            self.request(Method::GET, &["diagrams", account_id.as_str(), "versions", &id]);
        self.send_optional(builder).await
    }

    async fn delete_version(
        &self,
        account_id: &AccountId,
        version_id: VersionId,
    ) -> Result<bool, ClientError> {
        let id = version_id.to_string();
        let builder =
            self.request(Method::DELETE, &["diagrams", account_id.as_str(), "versions", &id]);
        match self.send_raw(builder).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn delete_versions(
        &self,
        account_id: &AccountId,
        diagram_id: Option<&DiagramId>,
    ) -> Result<usize, ClientError> {
        let mut builder =
            self.request(Method::DELETE, &["diagrams", account_id.as_str(), "versions"]);
        if let Some(diagram_id) = diagram_id {
            builder = builder.query(&[("diagramId", diagram_id.as_str())]);
        }
        self.send::<DeleteVersionsResponse>(builder).await.map(|response| response.count)
    }

    async fn rename_diagram(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
        new_name: Option<&str>,
    ) -> Result<usize, ClientError> {
        let body = RenameBody {
            diagram_id: Some(diagram_id.clone()),
            new_name: new_name.map(str::to_owned),
        };
        let builder =
            self.request(Method::PUT, &["diagrams", account_id.as_str(), "name"]).json(&body);
        self.send::<RenameResponse>(builder).await.map(|response| response.updated)
    }

    async fn diagram_name(
        &self,
        account_id: &AccountId,
        diagram_id: &DiagramId,
    ) -> Result<Option<String>, ClientError> {
        let builder = self
            .request(Method::GET, &["diagrams", account_id.as_str(), "name"])
            .query(&[("diagramId", diagram_id.as_str())]);
        self.send::<DiagramNameResponse>(builder).await.map(|response| response.diagram_name)
    }

    async fn migrate_legacy(
        &self,
        account_id: &AccountId,
        target: &DiagramId,
    ) -> Result<usize, ClientError> {
        let body = MigrateBody { diagram_id: Some(target.clone()) };
        let builder = self
            .request(Method::POST, &["diagrams", account_id.as_str(), "versions", "migrate"])
            .json(&body);
        self.send::<MigrateResponse>(builder).await.map(|response| response.count)
    }
}
