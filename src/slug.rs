//! URL slugs for photos.
//!
//! A slug is the photo's media-relative path, lower-cased and reduced to
//! URL-safe characters:
//! - `Trips/2024 Paris/IMG_0001.JPG` → `trips/2024-paris/img_0001.jpg`
//! - `Trips/Été (1)/a.jpg` → `trips/t-1/a.jpg`
//!
//! Collisions are resolved by a numeric disambiguator before the extension
//! (`img_0001-1.jpg`, `img_0001-2.jpg`, ...). The check-then-insert here is
//! not atomic; the unique index on `url_path` is the backstop and the scanner
//! retries with a higher disambiguator when it loses that race.

use crate::catalog::{Catalog, Result};
use chrono::Utc;

/// Disambiguators tried before falling back to a timestamp suffix.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 10_000;

/// Slug used when nothing of the path survives sanitizing.
const EMPTY_SLUG: &str = "photo";

fn is_allowed(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '/' | '-')
}

/// Reduce a relative path to its slug base.
///
/// Every character outside `[a-z0-9._/-]` (after lower-casing) becomes a
/// hyphen, hyphen runs collapse to one, and each segment is trimmed of
/// hyphens. Empty segments are dropped.
pub fn sanitize_url_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    for c in path.chars().flat_map(char::to_lowercase) {
        let c = if is_allowed(c) { c } else { '-' };
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed
        .split('/')
        .map(|segment| segment.trim_matches('-'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Insert `-{suffix}` before the extension of the last path segment.
pub fn with_suffix(base: &str, suffix: impl std::fmt::Display) -> String {
    let segment_start = base.rfind('/').map_or(0, |i| i + 1);
    match base[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = segment_start + dot;
            format!("{}-{}{}", &base[..dot], suffix, &base[dot..])
        }
        _ => format!("{base}-{suffix}"),
    }
}

/// Find a slug for `path` not yet present in the catalog.
///
/// `start` is the first disambiguator to consider; `0` means the bare base
/// is tried first. The scanner passes a higher `start` after losing a
/// unique-index race.
pub fn unique_url_path(catalog: &dyn Catalog, path: &str, start: u32) -> Result<String> {
    let mut base = sanitize_url_path(path);
    if base.is_empty() {
        base = EMPTY_SLUG.to_string();
    }

    if start == 0 && !catalog.url_path_exists(&base)? {
        return Ok(base);
    }

    for n in start.max(1)..MAX_SUFFIX_ATTEMPTS {
        let candidate = with_suffix(&base, n);
        if !catalog.url_path_exists(&candidate)? {
            return Ok(candidate);
        }
    }

    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    Ok(with_suffix(&base, nanos))
}
