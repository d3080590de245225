//! URL helpers shared by the request, response and router layers.

use crate::error::VisitError;
use url::{Position, Url};

/// Resolve `href` against `base`, accepting absolute and relative forms.
///
/// # Errors
/// Returns [`VisitError::InvalidUrl`] when `href` cannot be parsed.
pub fn href_to_url(href: &str, base: &Url) -> Result<Url, VisitError> {
    base.join(href).map_err(|source| VisitError::InvalidUrl {
        href: href.to_owned(),
        source,
    })
}

/// Everything up to, but excluding, the fragment.
pub fn url_without_hash(url: &Url) -> &str {
    &url[..Position::AfterQuery]
}

/// Origin, path and query match.
pub fn is_same_url_without_hash(left: &Url, right: &Url) -> bool {
    url_without_hash(left) == url_without_hash(right)
}

/// Carry the fragment of `original` over to `target` when both point at the
/// same document.
pub fn set_hash_if_same_url(original: &Url, target: &mut Url) {
    if is_same_url_without_hash(original, target) {
        target.set_fragment(original.fragment());
    }
}

/// The fragment including its leading `#`, or an empty string.
pub fn hash_of(url: &Url) -> String {
    url.fragment()
        .map(|fragment| format!("#{fragment}"))
        .unwrap_or_default()
}
