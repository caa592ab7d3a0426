// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	AuthzConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, ReconcileConfigLayer,
};

/// Partial server configuration as produced by a single source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub authz: Option<AuthzConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub reconcile: Option<ReconcileConfigLayer>,
}

fn merge_section<T: Default>(target: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	if let Some(other) = other {
		merge(target.get_or_insert_with(T::default), other);
	}
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.authz, other.authz, AuthzConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.reconcile, other.reconcile, ReconcileConfigLayer::merge);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_overlays_sections() {
		let mut base: ServerConfigLayer = toml::from_str(
			r#"
			[database]
			url = "sqlite:/tmp/a.db"
			max_connections = 3

			[logging]
			level = "debug"
			"#,
		)
		.unwrap();
		let top: ServerConfigLayer = toml::from_str(
			r#"
			[database]
			url = "sqlite:/tmp/b.db"

			[reconcile]
			batch_size = 10
			"#,
		)
		.unwrap();

		base.merge(top);
		let database = base.database.unwrap();
		assert_eq!(database.url.as_deref(), Some("sqlite:/tmp/b.db"));
		assert_eq!(database.max_connections, Some(3));
		assert_eq!(base.logging.unwrap().level.as_deref(), Some("debug"));
		assert_eq!(base.reconcile.unwrap().batch_size, Some(10));
		assert!(base.authz.is_none());
	}
}
