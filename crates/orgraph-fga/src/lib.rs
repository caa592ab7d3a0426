// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Relationship store client.
//!
//! The [`RelationshipStore`] trait is the capability interface to a
//! tuple-based authorization service. Implementations:
//!
//! - [`MemoryRelationshipStore`]: evaluates an [`AuthorizationModel`] in process
//! - [`OpenFgaClient`]: talks to an OpenFGA server over HTTP
//! - [`MockRelationshipStore`]: memory store with per-call fault injection

pub mod error;
pub mod http;
pub mod memory;
pub mod mock;
pub mod model;
pub mod store;
pub mod tuple;

pub use error::{FgaError, FgaResult};
pub use http::{OpenFgaClient, OpenFgaConfig};
pub use memory::{MemoryRelationshipStore, MAX_RESOLUTION_DEPTH};
pub use mock::{HeldCall, MockRelationshipStore, StoreCall, StoreOp};
pub use model::{AuthorizationModel, TypeDefinition, Userset};
pub use store::{RelationshipStore, MAX_TUPLES_PER_WRITE};
pub use tuple::{ObjectRef, Subject, Tuple};
