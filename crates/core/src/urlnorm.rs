//! URL canonicalization for deduplication.
//!
//! Submitted links to the same media routinely differ only in tracking
//! parameters bolted on by share sheets. The canonical form produced here is
//! the deduplication key for the whole acquisition engine, so it must be
//! deterministic for any input, including garbage.

use url::Url;

/// Exact-match query parameters stripped during canonicalization.
const TRACKING_PARAMS: &[&str] = &[
    "si",
    "igshid",
    "igsh",
    "fbclid",
    "ref",
    "ref_src",
    "ref_url",
    "s",
    "context",
    "share_id",
    "t",
];

/// Whether a query parameter is a known tracking parameter.
fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}

/// Canonicalize a source URL into a stable dedup key.
///
/// Strips the known tracking parameters and reassembles
/// `origin + path [+ remaining query]`, preserving the order of the
/// remaining parameters. The fragment is dropped.
///
/// Unparsable input (or input without a host) is returned unchanged so the
/// dedup key stays deterministic for malformed submissions. Idempotent:
/// `normalize(normalize(u)) == normalize(u)`.
pub fn normalize(raw: &str) -> String {
    let parsed = match Url::parse(raw) {
        Ok(parsed) => parsed,
        Err(_) => return raw.to_string(),
    };

    if !parsed.has_host() {
        return raw.to_string();
    }

    let mut kept = url::form_urlencoded::Serializer::new(String::new());
    let mut any_kept = false;
    for (name, value) in parsed.query_pairs() {
        if is_tracking_param(&name) {
            continue;
        }
        kept.append_pair(&name, &value);
        any_kept = true;
    }

    let mut canonical = format!(
        "{}{}",
        parsed.origin().ascii_serialization(),
        parsed.path()
    );
    if any_kept {
        canonical.push('?');
        canonical.push_str(&kept.finish());
    }
    canonical
}
