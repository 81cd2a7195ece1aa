//! Canonical identifiers from create-call references.
//!
//! A reference such as `https://{host}/v1/secrets/{uuid}` carries the
//! resource's identifier as its last path segment.

/// Return the last non-empty `/`-separated segment of `reference`.
///
/// Input without any non-empty segment is returned unchanged; resolution
/// never fails.
pub fn resolve(reference: &str) -> &str {
    reference
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(reference)
}
