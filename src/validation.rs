// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Input validation for request bodies and path parameters.
//!
//! Metadata fields are checked after the session, CSRF and rate-limit gates
//! and before the ownership read. Every failure is a 400 [`ApiError`] naming
//! the offending field.

use url::Url;

use crate::auth::address::normalize_address;
use crate::blockchain::parse_project_id;
use crate::error::ApiError;
use crate::models::{LoginRequest, MetadataUpdateRequest};
use crate::storage::MetadataFields;

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 5_000;
pub const MAX_CATEGORY_CHARS: usize = 64;
pub const MAX_URL_CHARS: usize = 2_048;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_CHARS: usize = 32;

const MAX_MESSAGE_CHARS: usize = 2_048;
const MAX_SIGNATURE_CHARS: usize = 200;

/// Login inputs that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInput {
    pub address: String,
    pub signature: String,
    pub message: String,
}

pub fn validate_login(req: LoginRequest) -> Result<LoginInput, ApiError> {
    let address = required("address", req.address)?;
    let signature = required("signature", req.signature)?;
    // The signed text is compared byte-for-byte; only presence is checked.
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| field_error("message", "is required"))?;

    if normalize_address(&address).is_none() {
        return Err(field_error("address", "must be a 0x-prefixed 20-byte hex address"));
    }
    if signature.chars().count() > MAX_SIGNATURE_CHARS {
        return Err(field_error("signature", "is too long"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(field_error("message", "is too long"));
    }

    Ok(LoginInput {
        address,
        signature,
        message,
    })
}

/// Canonical decimal form of a project id path parameter.
pub fn canonical_project_id(raw: &str) -> Result<String, ApiError> {
    parse_project_id(raw)
        .map(|id| id.to_string())
        .ok_or_else(|| field_error("projectId", "must be an unsigned 256-bit decimal integer"))
}

pub fn validate_metadata(req: MetadataUpdateRequest) -> Result<MetadataFields, ApiError> {
    let title = required("title", req.title)?;
    check_text("title", &title, MAX_TITLE_CHARS, false)?;

    let description = optional(req.description);
    if let Some(description) = &description {
        check_text("description", description, MAX_DESCRIPTION_CHARS, true)?;
    }

    let category = optional(req.category);
    if let Some(category) = &category {
        check_text("category", category, MAX_CATEGORY_CHARS, false)?;
    }

    let image_url = optional(req.image_url)
        .map(|url| check_url("imageUrl", url))
        .transpose()?;
    let website_url = optional(req.website_url)
        .map(|url| check_url("websiteUrl", url))
        .transpose()?;

    let tags = req.tags.unwrap_or_default();
    if tags.len() > MAX_TAGS {
        return Err(field_error("tags", &format!("at most {MAX_TAGS} entries")));
    }
    let tags = tags
        .into_iter()
        .map(|tag| {
            let tag = tag.trim().to_string();
            if tag.is_empty() {
                return Err(field_error("tags", "entries must not be empty"));
            }
            check_text("tags", &tag, MAX_TAG_CHARS, false)?;
            Ok(tag)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MetadataFields {
        title,
        description,
        category,
        image_url,
        website_url,
        tags,
    })
}

fn field_error(field: &str, reason: &str) -> ApiError {
    ApiError::validation(format!("{field} {reason}"))
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    optional(value).ok_or_else(|| field_error(field, "is required"))
}

/// Trim; blank becomes `None`.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// With `allow_multiline`, newlines and tabs pass; other control characters
/// never do.
fn check_text(
    field: &str,
    value: &str,
    max_chars: usize,
    allow_multiline: bool,
) -> Result<(), ApiError> {
    if value.chars().count() > max_chars {
        return Err(field_error(field, &format!("must be at most {max_chars} characters")));
    }
    if value
        .chars()
        .any(|c| c.is_control() && !(allow_multiline && matches!(c, '\n' | '\r' | '\t')))
    {
        return Err(field_error(field, "must not contain control characters"));
    }
    Ok(())
}

fn check_url(field: &str, value: String) -> Result<String, ApiError> {
    if value.chars().count() > MAX_URL_CHARS {
        return Err(field_error(field, &format!("must be at most {MAX_URL_CHARS} characters")));
    }
    let parsed = Url::parse(&value).map_err(|_| field_error(field, "must be an absolute URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(field_error(field, "must be an http or https URL"));
    }
    Ok(value)
}
