#![deny(clippy::unwrap_used)]

use anyhow::Context;
use log_error::LogError;
use once_cell::sync::Lazy;

pub mod catalog;
pub mod controllers;
pub mod grid;
pub mod header_map;
pub mod import;
pub mod plan;
pub mod row;
pub mod subgroup;
pub mod validate;

pub static SELF_ADDR: Lazy<String> = Lazy::new(|| {
    envmnt::get_parse("SELF_ADDR")
        .context("SELF_ADDR not set")
        .log_error("Unable to get SELF_ADDR")
        .unwrap_or("0.0.0.0".to_string())
});

/// NFD decomposition with combining marks removed, so "Código" and "Codigo"
/// compare equal after lowercasing.
pub fn strip_diacritics(s: &str) -> String {
    use unicode_normalization::char::is_combining_mark;
    use unicode_normalization::UnicodeNormalization;
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}
