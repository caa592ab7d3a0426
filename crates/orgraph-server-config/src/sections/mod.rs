// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each section has a partial `*ConfigLayer` for
//! merging and a resolved `*Config`.

mod authz;
mod database;
mod logging;
mod reconcile;

pub use authz::{AuthzBackend, AuthzConfig, AuthzConfigLayer, OpenFgaSettings};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use reconcile::{ReconcileConfig, ReconcileConfigLayer};
