//! Loom: process execution and undoable project state
//!
//! The execution and state-management core of an engineering design platform.
//! Plugins register node and calculator types in a [`registry::TypeRegistry`];
//! projects are typed trees whose every mutation is recorded by a
//! [`history::CommandHistory`]; the [`process::ProcessExecutor`] runs queued
//! processes against a project, each inside one undoable transaction; and
//! workspaces keep the set of open projects between sessions.

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod plugin;
pub mod process;
pub mod project;
pub mod registry;
pub mod tree;
pub mod types;
pub mod workspace;
