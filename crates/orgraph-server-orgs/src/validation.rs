// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field-level input validation.

use crate::error::{OrgError, Result, TOO_LONG, TOO_SHORT};

pub const NAME_MAX_LEN: usize = 160;
pub const DISPLAY_NAME_MAX_LEN: usize = 64;
pub const GROUP_NAME_MAX_LEN: usize = 160;
const DOMAIN_MAX_LEN: usize = 253;
const DOMAIN_LABEL_MAX_LEN: usize = 63;

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
	let len = value.chars().count();
	if len < min {
		return Err(OrgError::validation(field, TOO_SHORT));
	}
	if len > max {
		return Err(OrgError::validation(field, TOO_LONG));
	}
	Ok(())
}

pub fn validate_name(name: &str) -> Result<()> {
	check_length("name", name, 1, NAME_MAX_LEN)
}

pub fn validate_group_name(name: &str) -> Result<()> {
	check_length("name", name, 1, GROUP_NAME_MAX_LEN)
}

/// Resolve the display name, falling back to `name` when absent or blank.
pub fn resolve_display_name(display_name: Option<&str>, name: &str) -> Result<String> {
	let resolved = match display_name {
		Some(d) if !d.trim().is_empty() => d,
		_ => name,
	};
	check_length("display_name", resolved, 1, DISPLAY_NAME_MAX_LEN)?;
	Ok(resolved.to_string())
}

pub fn validate_domains(domains: &[String]) -> Result<()> {
	for domain in domains {
		if !is_valid_domain(domain) {
			return Err(OrgError::validation(
				"domains",
				format!("'{domain}' is not a valid domain"),
			));
		}
	}
	Ok(())
}

fn is_valid_domain(domain: &str) -> bool {
	if domain.is_empty() || domain.len() > DOMAIN_MAX_LEN {
		return false;
	}
	let labels: Vec<&str> = domain.split('.').collect();
	if labels.len() < 2 {
		return false;
	}
	labels.iter().all(|label| {
		!label.is_empty()
			&& label.len() <= DOMAIN_LABEL_MAX_LEN
			&& !label.starts_with('-')
			&& !label.ends_with('-')
			&& label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;

	#[test]
	fn empty_name_is_too_short() {
		let err = validate_name("").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Validation);
		assert!(err.to_string().contains(TOO_SHORT));
	}

	#[test]
	fn long_name_is_too_long() {
		assert!(validate_name(&"a".repeat(NAME_MAX_LEN)).is_ok());
		let err = validate_name(&"a".repeat(NAME_MAX_LEN + 1)).unwrap_err();
		assert!(err.to_string().contains(TOO_LONG));
	}

	#[test]
	fn display_name_defaults_to_name() {
		assert_eq!(resolve_display_name(None, "acme").unwrap(), "acme");
		assert_eq!(resolve_display_name(Some("  "), "acme").unwrap(), "acme");
		assert_eq!(resolve_display_name(Some("Acme Inc"), "acme").unwrap(), "Acme Inc");
	}

	#[test]
	fn display_name_longer_than_limit_is_rejected() {
		let err = resolve_display_name(Some(&"d".repeat(DISPLAY_NAME_MAX_LEN + 1)), "acme").unwrap_err();
		assert!(err.to_string().contains("display_name"));
	}

	#[test]
	fn domains_must_be_host_names() {
		assert!(validate_domains(&["beta.io".into(), "mail.example.com".into()]).is_ok());
		assert!(validate_domains(&["localhost".into()]).is_err());
		assert!(validate_domains(&["-bad.io".into()]).is_err());
		assert!(validate_domains(&["bad..io".into()]).is_err());
		assert!(validate_domains(&["sp ace.io".into()]).is_err());
	}
}
