//! CLI command modules

pub mod config;
pub mod problems;
pub mod run;
