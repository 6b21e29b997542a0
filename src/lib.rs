// ABOUTME: Library crate for gwt exposing the orchestration engine for the binary and integration tests

#![allow(missing_docs)]

pub mod app;
pub mod cli;
pub mod config;
pub mod launch;
pub mod logging;
pub mod notifier;
pub mod panes;
pub mod tmux;
