// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # orgraph-server-db
//!
//! Relational persistence for orgraph using SQLite via sqlx.
//!
//! ## Repository Pattern
//!
//! Each `*Repository` exposes associated functions taking a
//! `&mut SqliteConnection`. A caller passes a pooled connection for plain
//! reads, or `&mut *tx` to compose several repositories inside one
//! transaction:
//!
//! ```rust,ignore
//! let mut tx = pool.begin().await?;
//! OrgRepository::create_org(&mut tx, &org).await?;
//! MembershipRepository::create_membership(&mut tx, &owner).await?;
//! tx.commit().await?;
//! ```
//!
//! ## Soft Deletes
//!
//! Deletes set `deleted_at`. Reads take a [`SoftDeleteMode`] and return
//! deleted rows only under `SoftDeleteMode::Include`. Uniqueness indexes
//! cover active rows only, so a deleted name can be reused.
//!
//! ## Error Handling
//!
//! | Variant | When to use |
//! |---------|-------------|
//! | `NotFound` | An update targeted a row that is missing or soft-deleted |
//! | `Conflict` | Unique index violation on an active row |
//! | `Sqlx` | Unexpected database errors |
//! | `Internal` | Invalid stored data (e.g., unparseable UUID) |
//!
//! [`SoftDeleteMode`]: orgraph_server_auth::SoftDeleteMode

pub mod error;
pub mod group;
pub mod history;
pub mod membership;
pub mod migrations;
pub mod org;
pub mod pool;
pub mod reconcile;
mod rows;
pub mod setting;
pub mod testing;
pub mod user;

pub use error::{DbError, Result};
pub use group::GroupRepository;
pub use history::{HistoryEntry, HistoryOperation, HistoryRepository};
pub use membership::MembershipRepository;
pub use migrations::run_migrations;
pub use org::OrgRepository;
pub use pool::create_pool;
pub use reconcile::{PendingTupleDeletion, ReconciliationRepository, TupleKey};
pub use setting::OrgSettingRepository;
pub use user::UserRepository;
