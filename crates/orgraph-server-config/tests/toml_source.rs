// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;
use std::time::Duration;

use orgraph_server_config::{
	finalize, load_sources, AuthzBackend, ConfigError, ConfigSource, DefaultsSource, LogFormat,
	TomlSource,
};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(contents.as_bytes()).unwrap();
	file
}

#[test]
fn toml_file_configures_openfga() {
	let file = write_config(
		r#"
		[database]
		url = "sqlite:/var/lib/orgraph/orgraph.db"

		[authz]
		backend = "openfga"
		api_url = "http://openfga:8080"
		store_id = "01HSTORE"
		authorization_model_id = "01HMODEL"
		request_timeout_ms = 1500
		max_tuples_per_write = 50

		[logging]
		level = "orgraph=debug,info"
		format = "json"

		[reconcile]
		batch_size = 100
		"#,
	);

	let config = finalize(TomlSource::new(file.path()).load().unwrap()).unwrap();
	assert_eq!(config.database.url, "sqlite:/var/lib/orgraph/orgraph.db");
	assert_eq!(config.authz.backend, AuthzBackend::OpenFga);
	let openfga = config.authz.openfga.unwrap();
	assert_eq!(openfga.api_url, "http://openfga:8080");
	assert_eq!(openfga.authorization_model_id.as_deref(), Some("01HMODEL"));
	assert_eq!(config.authz.request_timeout, Duration::from_millis(1500));
	assert_eq!(config.authz.max_tuples_per_write, 50);
	assert_eq!(config.logging.format, LogFormat::Json);
	assert_eq!(config.reconcile.batch_size, 100);
}

#[test]
fn file_overrides_defaults_only_where_set() {
	let file = write_config("[logging]\nlevel = \"warn\"\n");
	let config = load_sources(vec![
		Box::new(TomlSource::new(file.path())),
		Box::new(DefaultsSource),
	])
	.unwrap();
	assert_eq!(config.logging.level, "warn");
	assert_eq!(config.logging.format, LogFormat::Text);
	assert_eq!(config.database.url, "sqlite:./orgraph.db");
}

#[test]
fn malformed_file_reports_path() {
	let file = write_config("[authz\nbackend = ");
	let err = TomlSource::new(file.path()).load().unwrap_err();
	assert!(matches!(err, ConfigError::TomlParse { .. }));
	assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn unknown_backend_is_rejected() {
	let file = write_config("[authz]\nbackend = \"ldap\"\n");
	assert!(TomlSource::new(file.path()).load().is_err());
}
