//! Effective URL resolution.

/// Check whether `location` already names its own origin.
///
/// True for `scheme://...` and protocol-relative `//...` locations.
pub fn has_origin(location: &str) -> bool {
    if location.starts_with("//") {
        return true;
    }
    let Some((scheme, _)) = location.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Build the URL a request is actually sent to.
///
/// Locations that carry an origin are used as-is; anything else is prefixed
/// with `origin` when one is configured.
pub fn resolve_url(location: &str, origin: Option<&str>) -> String {
    match origin {
        Some(origin) if !has_origin(location) => {
            if location.starts_with('/') {
                format!("{}{}", origin.trim_end_matches('/'), location)
            } else {
                format!("{}{}", origin, location)
            }
        }
        _ => location.to_string(),
    }
}
