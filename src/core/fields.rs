//! Field authorization and projection
//!
//! A service may declare an allow-list of dotted paths that bounds what it
//! ever exposes. Requested fields are intersected with that list before
//! documents are projected, so a caller can narrow the surface but never
//! widen it.

use crate::core::document::{Document, get_path, set_path};

/// Compute the effective field list
///
/// Without an allow-list the request passes through unchanged (`None` meaning
/// "all fields"). With an allow-list, each requested field is:
/// - kept if it is allow-listed verbatim,
/// - kept if one of its dotted parents is allow-listed (`address.city` when
///   `address` is allowed),
/// - otherwise replaced by the allow-listed sub-paths it covers (`address`
///   becomes `address.city` when only that is allowed).
///
/// Anything else is dropped silently. A missing or empty request resolves to
/// the whole allow-list.
pub fn authorize_fields(
    requested: Option<&[String]>,
    allowed: Option<&[String]>,
) -> Option<Vec<String>> {
    let requested = requested.filter(|fields| !fields.is_empty());
    let allowed = match allowed.filter(|fields| !fields.is_empty()) {
        Some(allowed) => allowed,
        None => return requested.map(<[String]>::to_vec),
    };
    let Some(requested) = requested else {
        return Some(allowed.to_vec());
    };

    let mut effective: Vec<String> = Vec::new();
    let mut push = |field: &str| {
        if !effective.iter().any(|f| f == field) {
            effective.push(field.to_string());
        }
    };

    for field in requested {
        if allowed.contains(field) || has_allowed_parent(field, allowed) {
            push(field.as_str());
            continue;
        }
        let prefix = format!("{field}.");
        for nested in allowed.iter().filter(|a| a.starts_with(&prefix)) {
            push(nested.as_str());
        }
    }

    Some(effective)
}

fn has_allowed_parent(field: &str, allowed: &[String]) -> bool {
    let mut path = field;
    while let Some((parent, _)) = path.rsplit_once('.') {
        if allowed.iter().any(|a| a == parent) {
            return true;
        }
        path = parent;
    }
    false
}

/// Project a document onto a field list
///
/// Paths missing from the document are skipped; nested paths rebuild the
/// intermediate objects.
pub fn filter_fields(doc: &Document, fields: &[String]) -> Document {
    let mut projected = Document::new();
    for field in fields {
        if let Some(value) = get_path(doc, field) {
            set_path(&mut projected, field, value.clone());
        }
    }
    projected
}
