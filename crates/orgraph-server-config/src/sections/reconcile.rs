// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciliation sweep configuration.

use serde::Deserialize;

const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
	/// Ledger rows processed per sweep batch.
	pub batch_size: usize,
}

impl Default for ReconcileConfig {
	fn default() -> Self {
		ReconcileConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileConfigLayer {
	#[serde(default)]
	pub batch_size: Option<usize>,
}

impl ReconcileConfigLayer {
	pub fn merge(&mut self, other: ReconcileConfigLayer) {
		if other.batch_size.is_some() {
			self.batch_size = other.batch_size;
		}
	}

	pub fn finalize(self) -> ReconcileConfig {
		ReconcileConfig {
			batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
		}
	}
}
