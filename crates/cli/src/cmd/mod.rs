//! CLI command implementations

pub mod changelog;
pub mod config;
pub mod locales;
pub mod replicate;
pub mod status;
