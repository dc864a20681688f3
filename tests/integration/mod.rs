//! Integration tests for the Loom process and project state core

mod cli_batch;
mod config_loading;
mod plugin_registration;
mod process_scenarios;
mod tree_serialization;
mod undo_redo;
mod workspace_store;

pub mod test_utils;
