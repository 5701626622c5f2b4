//! OSC address normalization
//!
//! Maps raw OSC addresses to stable value-store keys. Distinct addresses
//! may collide on the same key (`/Foo/Bar` and `/foo_bar`); the store
//! treats them as one value.

use once_cell::sync::Lazy;
use regex::Regex;

/// Namespace every normalized key starts with
pub const KEY_PREFIX: &str = "osc_";

/// Fallback used when nothing usable is left of the address
const EMPTY_ADDRESS_KEY: &str = "message";

static NON_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9A-Za-z_]+").expect("static regex"));

/// Normalize an OSC address into a store key
///
/// Never fails: `None`, empty and punctuation-only inputs map to
/// `osc_message`.
pub fn normalize(address: Option<&str>) -> String {
    let text = address.unwrap_or_default().trim();
    let text = text.strip_prefix('/').unwrap_or(text);

    let mut key = NON_KEY_CHARS.replace_all(text, "_").into_owned();
    if key.is_empty() {
        key = EMPTY_ADDRESS_KEY.to_string();
    }
    key.make_ascii_lowercase();

    if key == KEY_PREFIX {
        // Bare prefix: keep at least one character after the namespace
        return format!("{}{}", KEY_PREFIX, EMPTY_ADDRESS_KEY);
    }
    if key.starts_with(KEY_PREFIX) {
        key
    } else {
        format!("{}{}", KEY_PREFIX, key)
    }
}

/// Shorthand for `normalize(Some(address))`
pub fn normalize_str(address: &str) -> String {
    normalize(Some(address))
}
