//! CLI subcommand implementations for the Vigil binary.

pub mod check_cmd;
pub mod output;
pub mod repair_cmd;
pub mod run_cmd;
pub mod status_cmd;
