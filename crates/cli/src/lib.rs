//! Library side of the `ferry` command
//!
//! Kept separate from `main.rs` so integration tests can drive the locale
//! sync and changelog logic without spawning the binary.

pub mod changelog;
pub mod locales;
pub mod util;
