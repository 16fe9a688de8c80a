// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model.
//!
//! Accounts own at most one active lease, one latest snapshot and a history of versions grouped
//! by diagram id. The scene payload itself stays opaque.

pub mod ids;
pub mod lease;
pub mod scene;
pub mod version;

pub use ids::{AccountId, DiagramId, HolderId, Id, IdError, VersionId};
pub use lease::{ActiveLease, LeaseDecision, LeaseRequest};
pub use scene::{BinaryFile, LatestSnapshot, Scene};
pub use version::{NewVersion, VersionScope, VersionSnapshot, VersionSummary};
