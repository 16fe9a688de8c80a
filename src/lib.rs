// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Easel: single-writer session leases, dual-target saving and version history for a drawing
//! editor.
//!
//! The server side is [`store`] plus the HTTP surface in [`server`]. The editor side lives in
//! [`client`] and talks to either through the same traits.

pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub mod model;
pub mod server;
pub mod store;
