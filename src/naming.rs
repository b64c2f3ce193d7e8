//! Field-name conversion between storage style (`week_id`) and display style
//! (`weekId`).
//!
//! Both directions rewrite object keys only and recurse through nested objects
//! and arrays. They are applied at the HTTP boundaries; query and bind code only
//! ever sees storage-style names.
//!
//! Keys with a capital directly after an underscore (`a_B`) or acronyms
//! (`HTTPStatus`) do not survive a round trip unchanged.

use serde_json::{Map, Value as JsonValue};

pub fn to_display_form(value: JsonValue) -> JsonValue {
    rewrite_keys(value, &display_key)
}

pub fn to_storage_form(value: JsonValue) -> JsonValue {
    rewrite_keys(value, &storage_key)
}

fn rewrite_keys(value: JsonValue, rename: &dyn Fn(&str) -> String) -> JsonValue {
    match value {
        JsonValue::Object(obj) => {
            let mut out = Map::with_capacity(obj.len());
            for (k, v) in obj {
                out.insert(rename(&k), rewrite_keys(v, rename));
            }
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => {
            JsonValue::Array(items.into_iter().map(|v| rewrite_keys(v, rename)).collect())
        }
        scalar => scalar,
    }
}

/// `_` followed by a lowercase letter becomes that letter uppercased.
pub fn display_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_lowercase() {
                    out.push(next.to_ascii_uppercase());
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Each uppercase letter becomes `_` plus its lowercase form.
pub fn storage_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
