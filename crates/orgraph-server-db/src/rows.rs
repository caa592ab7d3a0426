// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column decoding shared by the repositories.

use chrono::{DateTime, Utc};
use orgraph_server_auth::SoftDeleteMode;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{DbError, Result};

pub(crate) fn parse_id<T>(value: &str, what: &str) -> Result<T>
where
	T: FromStr,
	T::Err: Display,
{
	value
		.parse()
		.map_err(|e| DbError::Internal(format!("Invalid {what}: {e}")))
}

pub(crate) fn parse_opt_id<T>(value: Option<String>, what: &str) -> Result<Option<T>>
where
	T: FromStr,
	T::Err: Display,
{
	value.map(|v| parse_id(&v, what)).transpose()
}

pub(crate) fn parse_ts(value: &str, what: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {what}: {e}")))
}

pub(crate) fn parse_opt_ts(value: Option<String>, what: &str) -> Result<Option<DateTime<Utc>>> {
	value.map(|v| parse_ts(&v, what)).transpose()
}

/// SQL fragment appended to a `WHERE` clause for the given mode.
pub(crate) fn soft_delete_clause(mode: SoftDeleteMode) -> &'static str {
	if mode.includes_deleted() {
		""
	} else {
		" AND deleted_at IS NULL"
	}
}
