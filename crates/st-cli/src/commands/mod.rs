//! CLI subcommand implementations.

pub mod clear;
pub mod export;
pub mod import;
pub mod report;
pub mod run;
pub mod status;
