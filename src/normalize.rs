//! URL canonicalisation for equality checks.
//!
//! Normalised URLs are only ever compared, never displayed or saved verbatim
//! by callers that care about the original spelling.

use url::Url;

/// Strip query and fragment, and collapse a trailing slash on non-root paths.
///
/// Inputs that do not parse as URLs are returned unchanged.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    url.set_query(None);
    url.set_fragment(None);

    let path = url.path().to_string();
    if path != "/" && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    url.to_string()
}

/// Compare two URLs after normalisation.
pub fn same_url(a: &str, b: &str) -> bool {
    a == b || normalize_url(a) == normalize_url(b)
}
