//! Primer: the hidden first turn that gives the completion endpoint its context.
//!
//! The text is opaque to the session; it is sent with every request and never rendered.

use std::fs;
use std::path::Path;

/// Built-in primer compiled into the library.
pub static BUILTIN_PRIMER: &str = include_str!("../config/primer.md");

/// Load the primer from `path` when it exists and is non-empty; otherwise the built-in text.
pub fn load_primer(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return BUILTIN_PRIMER.to_string();
    };
    match fs::read_to_string(path) {
        Ok(s) if !s.trim().is_empty() => s,
        Ok(_) => {
            log::warn!("primer file {} is empty, using built-in primer", path.display());
            BUILTIN_PRIMER.to_string()
        }
        Err(e) => {
            log::warn!("reading primer {}: {}; using built-in primer", path.display(), e);
            BUILTIN_PRIMER.to_string()
        }
    }
}
