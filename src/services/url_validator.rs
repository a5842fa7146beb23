//! Validation and canonicalization of add-bookmark input.

use url::Url;

use crate::types::errors::ValidationError;

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

/// Trims the title and rejects it if nothing is left.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

/// Parses `input` as an absolute http(s) URL with a host and returns its
/// canonical serialization, so `HTTPS://Example.com` and
/// `https://example.com/` are stored identically.
pub fn normalize_url(input: &str) -> Result<String, ValidationError> {
    let parsed = Url::parse(input.trim())
        .map_err(|e| ValidationError::MalformedUrl(format!("{} ({})", input.trim(), e)))?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(ValidationError::MissingHost),
    }

    Ok(String::from(parsed))
}

/// Validates both form fields. The title is checked first.
pub fn validate_new_bookmark(title: &str, url: &str) -> Result<(String, String), ValidationError> {
    let title = validate_title(title)?;
    let url = normalize_url(url)?;
    Ok((title, url))
}

/// Whether a stored URL may be shown in the list.
pub fn is_displayable(url: &str) -> bool {
    normalize_url(url).is_ok()
}
