//! CLI module for wkbar - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
