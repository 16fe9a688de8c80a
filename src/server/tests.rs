// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{serve, spawn_expiry_sweep};
use crate::clock::ManualClock;
use crate::config::{AuthMode, ServerConfig};
use crate::model::{AccountId, DiagramId, HolderId, LeaseRequest};
use crate::store::Store;

struct ServerCtx {
    base: String,
    http: reqwest::Client,
    clock: ManualClock,
    store: Store,
    shutdown: CancellationToken,
    handle: JoinHandle<std::io::Result<()>>,
}

impl ServerCtx {
    async fn start(config: ServerConfig) -> Self {
        let clock = ManualClock::default();
        let store = Store::new(None, config, Arc::new(clock.clone())).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, store.clone(), shutdown.clone()));
        Self { base, http: reqwest::Client::new(), clock, store, shutdown, handle }
    }

    async fn bearer() -> Self {
        Self::start(ServerConfig::default()).await
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let response = builder.send().await.unwrap();
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.request(reqwest::Method::POST, path, Some(token)).json(&body)).await
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.request(reqwest::Method::PUT, path, Some(token)).json(&body)).await
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(self.request(reqwest::Method::GET, path, Some(token))).await
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(self.request(reqwest::Method::DELETE, path, Some(token))).await
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

fn lease_body(holder: &str) -> Value {
    json!({ "accountId": "alice", "diagramId": "d1", "holderId": holder, "diagramName": "Plan" })
}

fn scene_body() -> Value {
    json!({
        "elements": [{ "id": "e1" }, { "id": "e2" }],
        "appState": { "viewBackgroundColor": "#fff" },
        "files": {
            "f1": { "mimeType": "image/png", "dataURL": "data:image/png;base64,aGVsbG8=" }
        }
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let ctx = ServerCtx::bearer().await;
    let response = ctx.request(reqwest::Method::GET, "/health", None).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].is_string());
    ctx.stop().await;
}

#[tokio::test]
async fn lease_contention_and_handover() {
    let ctx = ServerCtx::bearer().await;

    let (status, body) = ctx.post("/sessions/claim", "alice", lease_body("h1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isActive": true }));

    let (status, body) = ctx.post("/sessions/claim", "alice", lease_body("h2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isActive": false, "activeHolderId": "h1" }));

    let transfer = json!({ "accountId": "alice", "diagramId": "d1", "newHolderId": "h2" });
    let (_, body) = ctx.post("/sessions/transfer", "alice", transfer).await;
    assert_eq!(body, json!({ "isActive": true, "holderId": "h2" }));

    let (_, body) = ctx.post("/sessions/heartbeat", "alice", lease_body("h1")).await;
    assert_eq!(body, json!({ "isActive": false, "activeHolderId": "h2" }));

    let release = json!({ "accountId": "alice", "holderId": "h1" });
    let (status, body) = ctx.post("/sessions/release", "alice", release).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "released": false }));

    let release = json!({ "accountId": "alice", "holderId": "h2" });
    let (_, body) = ctx.post("/sessions/release", "alice", release).await;
    assert_eq!(body, json!({ "success": true, "released": true }));
    assert!(ctx.store.active_lease(&AccountId::new("alice").unwrap()).is_none());

    ctx.stop().await;
}

#[tokio::test]
async fn heartbeat_without_a_lease_is_denied_without_holder() {
    let ctx = ServerCtx::bearer().await;
    let (_, body) = ctx.post("/sessions/heartbeat", "alice", lease_body("h1")).await;
    assert_eq!(body, json!({ "isActive": false }));
    assert!(ctx.store.active_lease(&AccountId::new("alice").unwrap()).is_none());
    ctx.stop().await;
}

#[tokio::test]
async fn missing_lease_fields_are_rejected() {
    let ctx = ServerCtx::bearer().await;
    let (status, body) =
        ctx.post("/sessions/claim", "alice", json!({ "accountId": "alice" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("holderId"));
    ctx.stop().await;
}

#[tokio::test]
async fn bearer_token_must_match_account() {
    let ctx = ServerCtx::bearer().await;

    let anonymous = ctx.request(reqwest::Method::GET, "/diagrams/alice", None);
    let (status, body) = ctx.send(anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = ctx.get("/diagrams/alice", "bob").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.post("/sessions/claim", "bob", lease_body("h1")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(ctx.store.active_lease(&AccountId::new("alice").unwrap()).is_none());
    assert!(ctx.store.account(&AccountId::new("alice").unwrap()).is_none());

    ctx.stop().await;
}

#[tokio::test]
async fn disabled_auth_accepts_any_caller() {
    let config = ServerConfig { auth: AuthMode::Disabled, ..ServerConfig::default() };
    let ctx = ServerCtx::start(config).await;
    let (status, _) = ctx.send(ctx.request(reqwest::Method::GET, "/diagrams/alice", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(ctx.store.account(&AccountId::new("alice").unwrap()).is_some());
    ctx.stop().await;
}

#[tokio::test]
async fn latest_snapshot_round_trip() {
    let ctx = ServerCtx::bearer().await;

    let (status, _) = ctx.get("/diagrams/alice", "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut body = scene_body();
    body["diagramName"] = json!("Plan");
    let (status, saved) = ctx.put("/diagrams/alice", "alice", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["diagramName"], "Plan");

    let (status, loaded) = ctx.get("/diagrams/alice", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["elements"].as_array().unwrap().len(), 2);
    assert_eq!(loaded["appState"]["viewBackgroundColor"], "#fff");
    assert_eq!(loaded["files"]["f1"]["dataURL"], "data:image/png;base64,aGVsbG8=");
    assert_eq!(loaded["updatedAt"], saved["updatedAt"]);

    ctx.stop().await;
}

#[tokio::test]
async fn malformed_scenes_are_rejected_and_not_stored() {
    let ctx = ServerCtx::bearer().await;

    let (status, body) =
        ctx.put("/diagrams/alice", "alice", json!({ "elements": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("appState"));

    let (status, _) =
        ctx.put("/diagrams/alice", "alice", json!({ "elements": {}, "appState": {} })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_file = scene_body();
    bad_file["files"]["f1"]["dataURL"] = json!("data:image/png;base64,@@@");
    let (status, _) = ctx.put("/diagrams/alice", "alice", bad_file).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx.get("/diagrams/alice", "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.stop().await;
}

#[tokio::test]
async fn version_lifecycle() {
    let ctx = ServerCtx::bearer().await;

    for note in ["a", "b", "c"] {
        let mut body = scene_body();
        body["diagramId"] = json!("d1");
        body["note"] = json!(note);
        let (status, summary) = ctx.post("/diagrams/alice/versions", "alice", body).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(summary["elementCount"], 2);
        ctx.clock.advance(chrono::Duration::seconds(1));
    }

    let (_, list) = ctx.get("/diagrams/alice/versions?diagramId=d1", "alice").await;
    let numbers = list
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["versionNumber"].as_u64().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(numbers, vec![3, 2, 1]);
    assert!(list[0].get("elements").is_none());

    let (_, other) = ctx.get("/diagrams/alice/versions?diagramId=d2", "alice").await;
    assert_eq!(other, json!([]));

    let id = list[0]["id"].as_u64().unwrap();
    let (status, full) = ctx.get(&format!("/diagrams/alice/versions/{id}"), "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(full["note"], "c");
    assert_eq!(full["elements"].as_array().unwrap().len(), 2);

    let (status, _) = ctx.get(&format!("/diagrams/bob/versions/{id}"), "bob").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.get("/diagrams/alice/versions/not-a-number", "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx.delete(&format!("/diagrams/alice/versions/{id}"), "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "id": id }));
    let (status, _) = ctx.delete(&format!("/diagrams/alice/versions/{id}"), "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = ctx.delete("/diagrams/alice/versions?diagramId=d1", "alice").await;
    assert_eq!(body, json!({ "success": true, "count": 2, "diagramId": "d1" }));

    ctx.stop().await;
}

#[tokio::test]
async fn create_version_requires_a_diagram_id() {
    let ctx = ServerCtx::bearer().await;
    let (status, body) = ctx.post("/diagrams/alice/versions", "alice", scene_body()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("diagramId"));
    ctx.stop().await;
}

#[tokio::test]
async fn rename_back_fills_and_name_lookup_follows() {
    let ctx = ServerCtx::bearer().await;

    let mut body = scene_body();
    body["diagramId"] = json!("d1");
    ctx.post("/diagrams/alice/versions", "alice", body.clone()).await;
    ctx.post("/diagrams/alice/versions", "alice", body).await;

    let rename = json!({ "diagramId": "d1", "newName": "  Roadmap " });
    let (_, body) = ctx.put("/diagrams/alice/name", "alice", rename).await;
    assert_eq!(body, json!({ "success": true, "updated": 2, "diagramName": "Roadmap" }));

    let (_, body) = ctx.get("/diagrams/alice/name?diagramId=d1", "alice").await;
    assert_eq!(body, json!({ "diagramName": "Roadmap" }));

    let (_, body) = ctx.get("/diagrams/alice/name?diagramId=unknown", "alice").await;
    assert_eq!(body, json!({ "diagramName": null }));

    let (status, _) = ctx.get("/diagrams/alice/name", "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ctx.stop().await;
}

#[tokio::test]
async fn migrate_endpoint_reports_zero_without_legacy_rows() {
    let ctx = ServerCtx::bearer().await;
    let (status, body) =
        ctx.post("/diagrams/alice/versions/migrate", "alice", json!({ "diagramId": "d9" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "count": 0, "diagramId": "d9" }));
    ctx.stop().await;
}

#[tokio::test(start_paused = true)]
async fn sweep_task_expires_stale_leases() {
    let clock = ManualClock::default();
    let store = Store::new(None, ServerConfig::default(), Arc::new(clock.clone())).unwrap();
    let account = AccountId::new("alice").unwrap();
    let request = LeaseRequest::new(
        account.clone(),
        DiagramId::new("d1").unwrap(),
        HolderId::new("h1").unwrap(),
    );
    assert!(store.claim(&request).unwrap().is_granted());

    let cancel = CancellationToken::new();
    let handle = spawn_expiry_sweep(store.clone(), cancel.clone());

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(store.active_lease(&account).is_some());

    clock.advance(chrono::Duration::seconds(31));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(store.active_lease(&account).is_none());

    cancel.cancel();
    handle.await.unwrap();
}
