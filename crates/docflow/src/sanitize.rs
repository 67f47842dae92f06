//! Helpers for turning untrusted input names (upload names, archive entry
//! paths) into values that are safe to use on disk and in log fields.

/// Returns only the final component of a `/` or `\` separated name.
pub fn file_component(name: &str) -> &str {
    name.rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or("")
}

/// Produces a file name that cannot escape its directory: the final path
/// component with anything outside `[A-Za-z0-9._-]` replaced by `_` and
/// leading dots stripped.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = file_component(name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Strips the final extension from a sanitized file name.
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(pos) => &name[..pos],
    }
}
