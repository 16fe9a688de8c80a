// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Server command line / environment configuration and client timing defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::store::WriteDurability;

pub const DEFAULT_BIND: &str = "127.0.0.1:4001";
pub const DEFAULT_LEASE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_VERSION_PAGE_SIZE: usize = 50;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// How requests prove which account they act for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    /// The bearer token is the account identity and must match the addressed account.
    #[default]
    Bearer,
    /// No checks; any caller may act for any account.
    Disabled,
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "easel")]
#[command(about = "Session lease, snapshot and version history server for the drawing editor")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "EASEL_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Directory for persisted tables (in-memory when omitted)
    #[arg(long, env = "EASEL_DATA_DIR", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Fsync files and directories after every write
    #[arg(long, env = "EASEL_DURABLE_WRITES")]
    pub durable_writes: bool,

    /// Seconds without a heartbeat before a lease is swept
    #[arg(long, env = "EASEL_LEASE_TIMEOUT_SECS", default_value_t = DEFAULT_LEASE_TIMEOUT_SECS)]
    pub lease_timeout_secs: u64,

    /// Seconds between expiry sweeps
    #[arg(long, env = "EASEL_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Maximum versions returned by one list call
    #[arg(long, env = "EASEL_VERSION_PAGE_SIZE", default_value_t = DEFAULT_VERSION_PAGE_SIZE)]
    pub version_page_size: usize,

    #[arg(long, env = "EASEL_AUTH", value_enum, default_value_t = AuthMode::Bearer)]
    pub auth: AuthMode,

    /// Tracing filter directive, e.g. `easel=debug`
    #[arg(long, env = "EASEL_LOG", default_value = "easel=info")]
    pub log: String,
}

impl ServerArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            lease: LeaseTimings {
                timeout: Duration::from_secs(self.lease_timeout_secs.max(1)),
                sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            },
            version_page_size: self.version_page_size.max(1),
            auth: self.auth,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }

    pub fn durability(&self) -> WriteDurability {
        if self.durable_writes {
            WriteDurability::Durable
        } else {
            WriteDurability::BestEffort
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseTimings {
    pub timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for LeaseTimings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_LEASE_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl LeaseTimings {
    /// The lease timeout as a wall-clock delta, saturating on absurd values.
    pub fn timeout_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub lease: LeaseTimings,
    pub version_page_size: usize,
    pub auth: AuthMode,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            lease: LeaseTimings::default(),
            version_page_size: DEFAULT_VERSION_PAGE_SIZE,
            auth: AuthMode::default(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

/// Editor-side timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimings {
    /// Lease heartbeat (and observer re-claim) period. Must stay well below the lease timeout.
    pub heartbeat_interval: Duration,
    pub remote_debounce: Duration,
    pub saved_cooldown: Duration,
    pub error_cooldown: Duration,
    pub auto_save_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientTimings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            remote_debounce: Duration::from_secs(2),
            saved_cooldown: Duration::from_secs(3),
            error_cooldown: Duration::from_secs(5),
            auto_save_interval: Duration::from_secs(10 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::{AuthMode, ClientTimings, ServerArgs};
    use crate::store::WriteDurability;

    #[test]
    fn parses_defaults() {
        let args = ServerArgs::try_parse_from(["easel"]).expect("parse args");
        assert_eq!(args.bind.to_string(), "127.0.0.1:4001");
        assert!(args.data_dir.is_none());
        assert_eq!(args.auth, AuthMode::Bearer);

        let config = args.server_config();
        assert_eq!(config.lease.timeout, Duration::from_secs(30));
        assert_eq!(config.lease.sweep_interval, Duration::from_secs(10));
        assert_eq!(config.version_page_size, 50);
        assert_eq!(args.durability(), WriteDurability::BestEffort);
    }

    #[test]
    fn parses_overrides() {
        let args = ServerArgs::try_parse_from([
            "easel",
            "--bind",
            "0.0.0.0:9000",
            "--data-dir",
            "/tmp/easel",
            "--durable-writes",
            "--lease-timeout-secs",
            "12",
            "--auth",
            "disabled",
        ])
        .expect("parse args");

        assert_eq!(args.bind.port(), 9000);
        assert_eq!(args.data_dir.as_deref(), Some(std::path::Path::new("/tmp/easel")));
        assert_eq!(args.durability(), WriteDurability::Durable);
        assert_eq!(args.server_config().lease.timeout, Duration::from_secs(12));
        assert_eq!(args.auth, AuthMode::Disabled);
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let args = ServerArgs::try_parse_from(["easel", "--sweep-interval-secs", "0"]).unwrap();
        assert_eq!(args.server_config().lease.sweep_interval, Duration::from_secs(1));
    }

    #[test]
    fn rejects_unknown_args() {
        ServerArgs::try_parse_from(["easel", "--nope"]).unwrap_err();
    }

    #[test]
    fn heartbeat_is_a_sixth_of_the_lease_timeout() {
        let timings = ClientTimings::default();
        assert_eq!(timings.heartbeat_interval * 6, super::LeaseTimings::default().timeout);
    }
}
