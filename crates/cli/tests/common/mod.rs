//! Helpers shared by the `ferry` end-to-end tests

pub mod cli;
pub mod repos;
