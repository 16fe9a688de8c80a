// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Folds local and remote save events into the one status the editor shows.
//!
//! [`SaveStatusTracker`] is the pure state machine; [`SaveStatusHandle::spawn`] runs it on a
//! task that owns the event receiver, schedules the cool-down reverts, and publishes
//! [`StatusSnapshot`]s on a watch channel.
//!
//! A remote `saved` counts as saved even while the local channel is still `idle`: once the
//! server has the scene, a signed-in user has nothing to lose.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::clock::SharedClock;
use crate::config::ClientTimings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveChannel {
    Local,
    Remote,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveEvent {
    pub channel: SaveChannel,
    pub state: ChannelState,
}

impl SaveEvent {
    pub fn new(channel: SaveChannel, state: ChannelState) -> Self {
        Self { channel, state }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: SaveStatus,
    pub last_saved: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SaveStatusTracker {
    local: ChannelState,
    remote: ChannelState,
    status: SaveStatus,
    last_saved: Option<DateTime<Utc>>,
    saved_cooldown: Duration,
    error_cooldown: Duration,
}

impl SaveStatusTracker {
    pub fn new(saved_cooldown: Duration, error_cooldown: Duration) -> Self {
        Self {
            local: ChannelState::Idle,
            remote: ChannelState::Idle,
            status: SaveStatus::Idle,
            last_saved: None,
            saved_cooldown,
            error_cooldown,
        }
    }

    pub fn from_timings(timings: &ClientTimings) -> Self {
        Self::new(timings.saved_cooldown, timings.error_cooldown)
    }

    /// Applies one event and returns how long until the status should revert to idle, if it
    /// should at all.
    pub fn apply(&mut self, event: SaveEvent, now: DateTime<Utc>) -> Option<Duration> {
        match event.channel {
            SaveChannel::Local => self.local = event.state,
            SaveChannel::Remote => self.remote = event.state,
        }
        self.status = self.derive();

        match self.status {
            SaveStatus::Saved => {
                self.last_saved = Some(now);
                Some(self.saved_cooldown)
            }
            SaveStatus::Error => Some(self.error_cooldown),
            SaveStatus::Saving | SaveStatus::Idle => None,
        }
    }

    /// Cool-down elapsed: both channels go back to idle. `last_saved` is kept.
    pub fn revert(&mut self) {
        self.local = ChannelState::Idle;
        self.remote = ChannelState::Idle;
        self.status = SaveStatus::Idle;
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn channel(&self, channel: SaveChannel) -> ChannelState {
        match channel {
            SaveChannel::Local => self.local,
            SaveChannel::Remote => self.remote,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot { status: self.status, last_saved: self.last_saved }
    }

    fn derive(&self) -> SaveStatus {
        use ChannelState::{Error, Saved, Saving};

        if self.local == Saving || self.remote == Saving {
            SaveStatus::Saving
        } else if self.local == Error || self.remote == Error {
            SaveStatus::Error
        } else if self.remote == Saved || self.local == Saved {
            SaveStatus::Saved
        } else {
            SaveStatus::Idle
        }
    }
}

/// Running aggregator: the published status plus the task driving it.
#[derive(Debug)]
pub struct SaveStatusHandle {
    status: watch::Receiver<StatusSnapshot>,
    task: JoinHandle<()>,
}

impl SaveStatusHandle {
    /// The task ends once every event sender is dropped.
    pub fn spawn(
        events: mpsc::Receiver<SaveEvent>,
        tracker: SaveStatusTracker,
        clock: SharedClock,
    ) -> Self {
        let (tx, status) = watch::channel(tracker.snapshot());
        let task = tokio::spawn(run(events, tracker, clock, tx));
        Self { status, task }
    }

    pub fn current(&self) -> StatusSnapshot {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Waits for the task to drain; call after the senders are gone.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "save status task ended abnormally");
        }
    }
}

async fn run(
    mut events: mpsc::Receiver<SaveEvent>,
    mut tracker: SaveStatusTracker,
    clock: SharedClock,
    tx: watch::Sender<StatusSnapshot>,
) {
    let mut revert_at: Option<Instant> = None;

    loop {
        let revert = async move {
            match revert_at {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                revert_at = tracker.apply(event, clock.now()).map(|after| Instant::now() + after);
                tx.send_replace(tracker.snapshot());
            }
            () = revert => {
                revert_at = None;
                tracker.revert();
                tx.send_replace(tracker.snapshot());
            }
        }
    }
}
