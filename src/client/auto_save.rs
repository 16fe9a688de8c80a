// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Periodic auto-save snapshots while this editor holds the lease.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{LeaseManager, VersionHistory};

#[derive(Debug)]
pub struct AutoSaver {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSaver {
    /// First snapshot goes out one `interval` after spawning, never immediately.
    pub fn spawn(
        history: Arc<VersionHistory>,
        lease: Arc<LeaseManager>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if !lease.is_held() || history.previewing().is_some() {
                    tracing::trace!("auto-save skipped");
                    continue;
                }
                if let Some(summary) = history.create_auto_save().await {
                    tracing::debug!(version = %summary.id, "auto-saved");
                }
            }
        });
        Self { cancel, task: Mutex::new(Some(task)) }
    }

    /// Stops the loop and waits for an in-flight snapshot to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "auto-save loop ended abnormally");
            }
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
